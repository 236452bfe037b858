//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

lazy_static::lazy_static! {
    /// Tags that make an exit or a location impassable.
    pub static ref DEFAULT_BLOCKING_TAGS: BTreeSet<String> = ["locked", "sealed", "blocked", "collapsed"]
        .iter()
        .map(|t| t.to_string())
        .collect();
}

/// Environment variable overriding [`EngineConfig::max_rounds`].
pub const ENV_MAX_ROUNDS: &str = "GLYPH_MAX_ROUNDS";
/// Environment variable overriding [`EngineConfig::tool_timeout_ms`].
pub const ENV_TOOL_TIMEOUT_MS: &str = "GLYPH_TOOL_TIMEOUT_MS";
/// Environment variable overriding [`EngineConfig::reasoning_timeout_ms`].
pub const ENV_REASONING_TIMEOUT_MS: &str = "GLYPH_REASONING_TIMEOUT_MS";

const DEFAULT_STALL_MESSAGE: &str =
    "The moment stretches. Something in the air makes you hesitate, and the scene waits for your next move.";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Configuration for the world engine and the orchestration loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum reasoning/tool round trips per user turn.
    pub max_rounds: usize,

    /// Deadline for a single tool invocation, in milliseconds.
    pub tool_timeout_ms: u64,

    /// Deadline for a single reasoning step, in milliseconds.
    pub reasoning_timeout_ms: u64,

    /// Tags on exits or locations that stop movement.
    pub blocking_tags: BTreeSet<String>,

    /// Sanity lost in one delta that marks an entity temporarily unstable.
    pub acute_sanity_loss: i32,

    /// Beats that make up one time slot.
    pub beats_per_slot: u32,

    /// In-fiction line handed to the narrator when a turn is aborted.
    pub stall_message: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            tool_timeout_ms: 5_000,
            reasoning_timeout_ms: 60_000,
            blocking_tags: DEFAULT_BLOCKING_TAGS.clone(),
            acute_sanity_loss: 5,
            beats_per_slot: 4,
            stall_message: DEFAULT_STALL_MESSAGE.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a config from defaults overridden by `GLYPH_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(rounds) = read_positive(ENV_MAX_ROUNDS)? {
            config.max_rounds = rounds as usize;
        }
        if let Some(ms) = read_positive(ENV_TOOL_TIMEOUT_MS)? {
            config.tool_timeout_ms = ms;
        }
        if let Some(ms) = read_positive(ENV_REASONING_TIMEOUT_MS)? {
            config.reasoning_timeout_ms = ms;
        }
        Ok(config)
    }

    pub fn with_max_rounds(mut self, rounds: usize) -> Self {
        self.max_rounds = rounds;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_reasoning_timeout(mut self, timeout: Duration) -> Self {
        self.reasoning_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_blocking_tag(mut self, tag: impl Into<String>) -> Self {
        self.blocking_tags.insert(tag.into());
        self
    }

    pub fn with_acute_sanity_loss(mut self, threshold: i32) -> Self {
        self.acute_sanity_loss = threshold;
        self
    }

    pub fn with_stall_message(mut self, message: impl Into<String>) -> Self {
        self.stall_message = message.into();
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_millis(self.tool_timeout_ms)
    }

    pub fn reasoning_timeout(&self) -> Duration {
        Duration::from_millis(self.reasoning_timeout_ms)
    }
}

fn read_positive(var: &'static str) -> Result<Option<u64>, ConfigError> {
    match std::env::var(var) {
        Ok(value) => match value.trim().parse::<u64>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::InvalidNumber { var, value }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_rounds, 5);
        assert!(config.blocking_tags.contains("locked"));
        assert_eq!(config.tool_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder() {
        let config = EngineConfig::new()
            .with_max_rounds(3)
            .with_blocking_tag("warded")
            .with_tool_timeout(Duration::from_millis(250));
        assert_eq!(config.max_rounds, 3);
        assert!(config.blocking_tags.contains("warded"));
        assert_eq!(config.tool_timeout_ms, 250);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"max_rounds": 2}"#).unwrap();
        assert_eq!(config.max_rounds, 2);
        assert_eq!(config.acute_sanity_loss, 5);
    }

    #[test]
    fn test_from_env() {
        std::env::set_var(ENV_REASONING_TIMEOUT_MS, "1500");
        let config = EngineConfig::from_env().unwrap();
        assert_eq!(config.reasoning_timeout(), Duration::from_millis(1500));

        std::env::set_var(ENV_REASONING_TIMEOUT_MS, "soon");
        assert_eq!(
            EngineConfig::from_env().unwrap_err(),
            ConfigError::InvalidNumber {
                var: ENV_REASONING_TIMEOUT_MS,
                value: "soon".into()
            }
        );
        std::env::remove_var(ENV_REASONING_TIMEOUT_MS);
    }
}
