//! The reasoning step the loop drives.

use super::TurnContext;
use crate::tools::ToolCall;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the reasoning side wants next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReasoningStep {
    /// Done; `text` is the narrative directive for this turn.
    Final { text: String },
    /// Run these tools and come back with the results.
    ToolCalls {
        #[serde(default)]
        thought: Option<String>,
        calls: Vec<ToolCall>,
    },
}

impl ReasoningStep {
    pub fn finish(text: impl Into<String>) -> Self {
        ReasoningStep::Final { text: text.into() }
    }

    pub fn call(call: ToolCall) -> Self {
        ReasoningStep::ToolCalls {
            thought: None,
            calls: vec![call],
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ReasonerError {
    #[error("reasoner unavailable: {0}")]
    Unavailable(String),

    #[error("reasoner returned malformed output: {0}")]
    Malformed(String),
}

/// A language-generation agent, or anything standing in for one.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn step(&self, ctx: &TurnContext) -> Result<ReasoningStep, ReasonerError>;
}
