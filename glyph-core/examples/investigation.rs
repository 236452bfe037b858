//! Scripted walkthrough of the sample investigation.
//!
//! Run with: `RUST_LOG=glyph_core=debug cargo run -p glyph-core --example investigation`

use glyph_core::orchestrator::TranscriptEntry;
use glyph_core::testing::{sample_world, ScriptedReasoner};
use glyph_core::{Campaign, EngineConfig, InMemoryNarrativeStore, NarrativeDirective, ReasoningStep, ToolCall};
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("glyph_core=info")))
        .init();

    let config = EngineConfig::from_env()?;
    println!("=== The Hollow House ===\n");
    println!("max rounds: {}, tool timeout: {:?}", config.max_rounds, config.tool_timeout());

    let reasoner = Arc::new(ScriptedReasoner::new(vec![
        ReasoningStep::ToolCalls {
            thought: Some("Check where Ada is before moving.".into()),
            calls: vec![ToolCall::new("get_entity", json!({"entity": "ada"}))],
        },
        ReasoningStep::call(ToolCall::new("move_entity", json!({"entity": "ada", "direction": "down"}))),
        ReasoningStep::call(ToolCall::new("travel", json!({"entity": "ada", "destination": "library"}))),
        ReasoningStep::call(ToolCall::new("inspect", json!({"source": "journal", "inspector": "ada"}))),
        ReasoningStep::finish("The cellar door holds fast, so Ada climbs to the library and finds the journal."),
        ReasoningStep::call(ToolCall::new(
            "apply_resource_delta",
            json!({"entity": "ada", "resource": "sanity", "delta": -6}),
        )),
        ReasoningStep::finish("The rite described in the margins turns her stomach."),
    ]));
    let narrative = Arc::new(
        InMemoryNarrativeStore::new().with_content("lore/ritual", "Three candles, a name spoken backwards."),
    );
    let campaign = Campaign::new(sample_world(), config, reasoner, narrative)?;

    for input in ["I try the cellar, then look for something to read.", "I read the rite aloud."] {
        println!("\n> {input}");
        let outcome = campaign.play_turn(input).await;

        for entry in &outcome.context.transcript {
            match entry {
                TranscriptEntry::Thought { text } => println!("  (thinking) {text}"),
                TranscriptEntry::ToolRequest { call } => println!("  -> {} {}", call.name, call.arguments),
                TranscriptEntry::Observation { tool, envelope, .. } => match envelope.code() {
                    None => println!("  <- {tool}: ok"),
                    Some(code) => println!("  <- {tool}: {code}"),
                },
                _ => {}
            }
        }
        match outcome.directive {
            NarrativeDirective::Narrate { text } => println!("\n{text}"),
            NarrativeDirective::Stall { message } => println!("\n{message}"),
        }
    }

    let clock = campaign.clock().await;
    let world = campaign.snapshot().await;
    let ada = world.entity("ada")?;
    println!("\n=== Day {}, {} (beat {}) ===", clock.day, clock.time_slot.name(), clock.beat_counter);
    println!("Ada is in the {}", world.entity_location("ada")?.name);
    println!("Tags: {:?}", ada.tags);

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("hollow_house.json");
    campaign.save(&path).await?;
    println!("Saved to {}", path.display());
    Ok(())
}
