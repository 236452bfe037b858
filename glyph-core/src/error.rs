//! Error taxonomy for world operations.
//!
//! Every failure a tool can report maps onto a [`ReasonCode`]; callers on the
//! reasoning side only ever see the code and a short message.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Machine-readable failure codes placed in tool envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    NotFound,
    Blocked,
    NoSuchExit,
    SchemaViolation,
    PreconditionFailed,
    Timeout,
    InternalError,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::NotFound => "NotFound",
            ReasonCode::Blocked => "Blocked",
            ReasonCode::NoSuchExit => "NoSuchExit",
            ReasonCode::SchemaViolation => "SchemaViolation",
            ReasonCode::PreconditionFailed => "PreconditionFailed",
            ReasonCode::Timeout => "Timeout",
            ReasonCode::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of records held by the world store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Location,
    Entity,
    Item,
    Knowledge,
    Resource,
    Clue,
    Route,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::Location => "location",
            RecordKind::Entity => "entity",
            RecordKind::Item => "item",
            RecordKind::Knowledge => "knowledge",
            RecordKind::Resource => "resource",
            RecordKind::Clue => "clue",
            RecordKind::Route => "route",
        };
        f.write_str(name)
    }
}

/// Errors from world operations.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EngineError {
    #[error("{kind} not found: {key}")]
    NotFound { kind: RecordKind, key: String },

    #[error("way into '{at}' is blocked ({tag})")]
    Blocked { at: String, tag: String },

    #[error("no exit '{direction}' from '{location}'")]
    NoSuchExit { location: String, direction: String },

    #[error("invalid arguments: {0}")]
    SchemaViolation(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn not_found(kind: RecordKind, key: impl fmt::Display) -> Self {
        EngineError::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    pub fn code(&self) -> ReasonCode {
        match self {
            EngineError::NotFound { .. } => ReasonCode::NotFound,
            EngineError::Blocked { .. } => ReasonCode::Blocked,
            EngineError::NoSuchExit { .. } => ReasonCode::NoSuchExit,
            EngineError::SchemaViolation(_) => ReasonCode::SchemaViolation,
            EngineError::PreconditionFailed(_) => ReasonCode::PreconditionFailed,
            EngineError::Timeout(_) => ReasonCode::Timeout,
            EngineError::Internal(_) => ReasonCode::InternalError,
        }
    }

    /// Message safe to show on the reasoning side. Internal detail is withheld.
    pub fn public_message(&self) -> String {
        match self {
            EngineError::Internal(_) => "an internal error occurred".to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type for world operations.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_follow_variants() {
        let err = EngineError::not_found(RecordKind::Entity, "ghost");
        assert_eq!(err.code(), ReasonCode::NotFound);
        assert_eq!(err.to_string(), "entity not found: ghost");

        let err = EngineError::Timeout(Duration::from_millis(10));
        assert_eq!(err.code(), ReasonCode::Timeout);
    }

    #[test]
    fn test_internal_detail_is_withheld() {
        let err = EngineError::Internal("lock poisoned at store.rs:42".to_string());
        assert_eq!(err.code(), ReasonCode::InternalError);
        assert!(!err.public_message().contains("store.rs"));
    }
}
