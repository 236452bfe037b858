//! Shared, transactional access to a [`World`].

use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::rules::{apply_effects, Intent, Resolution, RulesEngine};
use crate::world::{IntegrityError, World};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Handle to the authoritative world of one campaign.
///
/// Cloning is cheap; all clones share the same world. Writes resolve the
/// intent and apply its effects under one write guard without awaiting in
/// between, so readers never observe a partially applied operation.
#[derive(Clone)]
pub struct WorldStore {
    world: Arc<RwLock<World>>,
    rules: Arc<RulesEngine>,
}

impl WorldStore {
    pub fn new(world: World, config: EngineConfig) -> Self {
        Self {
            world: Arc::new(RwLock::new(world)),
            rules: Arc::new(RulesEngine::new(config)),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        self.rules.config()
    }

    /// Run a read-only query against the current world.
    pub async fn read<R>(&self, query: impl FnOnce(&World) -> R) -> R {
        let world = self.world.read().await;
        query(&world)
    }

    /// Resolve and commit one intent, returning the full resolution.
    pub async fn commit(&self, intent: Intent) -> EngineResult<Resolution> {
        let mut world = self.world.write().await;
        let resolution = self.rules.resolve(&world, intent)?;
        apply_effects(&mut world, &resolution.effects);
        debug!(effects = ?resolution.effects, "Committed intent");
        Ok(resolution)
    }

    /// Resolve an intent without committing it.
    pub async fn preview(&self, intent: Intent) -> EngineResult<Resolution> {
        let world = self.world.read().await;
        self.rules.resolve(&world, intent)
    }

    pub async fn snapshot(&self) -> World {
        self.world.read().await.clone()
    }

    /// Swap in a different world after validating it.
    pub async fn replace(&self, world: World) -> Result<(), IntegrityError> {
        world.validate()?;
        *self.world.write().await = world;
        Ok(())
    }
}

impl std::fmt::Debug for WorldStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldStore")
            .field("config", self.rules.config())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::testing::sample_world;

    #[tokio::test]
    async fn test_failed_commit_changes_nothing() {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let before = store.snapshot().await;

        let err = store
            .commit(Intent::ApplyResourceDelta {
                entity: "ada".into(),
                resource: "mana".into(),
                delta: -3,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::NotFound { .. }));
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_preview_does_not_commit() {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let resolution = store
            .preview(Intent::MoveEntity {
                entity: "ada".into(),
                direction: "north".into(),
            })
            .await
            .unwrap();
        assert_eq!(resolution.effects.len(), 1);

        let location = store
            .read(|w| w.entity("ada").map(|e| e.location.clone()))
            .await
            .unwrap();
        assert_eq!(location.unwrap().as_str(), "foyer");
    }

    #[tokio::test]
    async fn test_concurrent_deltas_all_land() {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .commit(Intent::ApplyResourceDelta {
                        entity: "ada".into(),
                        resource: "hp".into(),
                        delta: -1,
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        let hp = store
            .read(|w| w.entity("ada").map(|e| e.resources["hp"].current))
            .await
            .unwrap();
        assert_eq!(hp, 2);
    }

    #[tokio::test]
    async fn test_replace_validates() {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let mut broken = sample_world();
        broken.session.participants.push("ghost".into());
        assert!(store.replace(broken).await.is_err());
    }
}
