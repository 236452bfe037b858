//! Narrative retrieval collaborator.
//!
//! Knowledge records only carry a `content_ref`; the text behind it lives in
//! an external retrieval store. The engine reads content from it and tells it
//! which tags an entity has been granted. Nothing else is written there.

use crate::world::EntityKey;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait NarrativeStore: Send + Sync {
    /// Text behind a content reference, if the store knows it.
    async fn fetch_content(&self, content_ref: &str) -> Result<Option<String>, NarrativeError>;

    /// Record that `entity` was granted `tags`.
    async fn grant_tags(&self, entity: &EntityKey, tags: &[String]) -> Result<(), NarrativeError>;
}

/// In-memory store for tests and demos.
#[derive(Debug, Default)]
pub struct InMemoryNarrativeStore {
    contents: RwLock<HashMap<String, String>>,
    grants: Mutex<Vec<(EntityKey, Vec<String>)>>,
}

impl InMemoryNarrativeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content(mut self, content_ref: impl Into<String>, text: impl Into<String>) -> Self {
        self.contents.get_mut().insert(content_ref.into(), text.into());
        self
    }

    pub async fn insert_content(&self, content_ref: impl Into<String>, text: impl Into<String>) {
        self.contents.write().await.insert(content_ref.into(), text.into());
    }

    /// Every grant received so far, in order.
    pub async fn grants(&self) -> Vec<(EntityKey, Vec<String>)> {
        self.grants.lock().await.clone()
    }
}

#[async_trait]
impl NarrativeStore for InMemoryNarrativeStore {
    async fn fetch_content(&self, content_ref: &str) -> Result<Option<String>, NarrativeError> {
        Ok(self.contents.read().await.get(content_ref).cloned())
    }

    async fn grant_tags(&self, entity: &EntityKey, tags: &[String]) -> Result<(), NarrativeError> {
        self.grants.lock().await.push((entity.clone(), tags.to_vec()));
        Ok(())
    }
}
