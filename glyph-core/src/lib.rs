//! World state engine and bounded tool-orchestration loop for AI-narrated
//! investigations.
//!
//! This crate provides:
//! - A typed world model (locations, entities, items, knowledge, clues)
//! - Intent/Effect rules with atomic commits behind a single store
//! - Resource thresholds that apply status tags automatically
//! - Clue discovery over a condition-gated graph of sources and knowledge
//! - Exit-tag aware pathfinding
//! - A tool dispatcher with schema validation, deadlines and conflict batching
//! - A reasoning loop with round limits and a repetition guard
//! - Campaign persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use glyph_core::{Campaign, EngineConfig, InMemoryNarrativeStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let campaign = Campaign::new(
//!         world,
//!         EngineConfig::from_env()?,
//!         Arc::new(my_reasoner),
//!         Arc::new(InMemoryNarrativeStore::new()),
//!     )?;
//!
//!     let outcome = campaign.play_turn("I search the desk").await;
//!     println!("{:?}", outcome.directive);
//!
//!     campaign.save("hollow_house.json").await?;
//!     Ok(())
//! }
//! ```

extern crate self as glyph_core;

pub mod automaton;
pub mod campaign;
pub mod clues;
pub mod config;
pub mod dice;
pub mod error;
pub mod narrative;
pub mod orchestrator;
pub mod pathfinder;
pub mod persist;
pub mod rules;
pub mod store;
pub mod testing;
pub mod tools;
pub mod world;

// Re-export for convenience
pub use glyph_macros::Tool;

// Primary public API
pub use campaign::{Campaign, CampaignError};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult, ReasonCode, RecordKind};
pub use narrative::{InMemoryNarrativeStore, NarrativeStore};
pub use orchestrator::{
    AbortReason, NarrativeDirective, Orchestrator, Reasoner, ReasoningStep, TurnOutcome, TurnStatus,
};
pub use rules::{Intent, Resolution, RulesEngine};
pub use store::WorldStore;
pub use tools::{ToolCall, ToolDispatcher, ToolEnvelope};
pub use world::{World, WorldBuilder};
