//! Campaign - the primary public API.
//!
//! Wraps the world store, the tool dispatcher, the orchestration loop and the
//! narrative collaborator of one campaign behind a single handle.

use crate::config::EngineConfig;
use crate::narrative::NarrativeStore;
use crate::orchestrator::{Orchestrator, Reasoner, TurnOutcome};
use crate::persist::{PersistError, SavedCampaign};
use crate::rules::Intent;
use crate::store::WorldStore;
use crate::tools::{ToolContext, ToolDispatcher};
use crate::world::{ClockReading, IntegrityError, World};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors from Campaign operations.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),

    #[error("World is inconsistent: {0}")]
    Integrity(#[from] IntegrityError),
}

pub struct Campaign {
    store: WorldStore,
    orchestrator: Orchestrator,
    narrative: Arc<dyn NarrativeStore>,
}

impl Campaign {
    /// Start a campaign on a validated world.
    pub fn new(
        world: World,
        config: EngineConfig,
        reasoner: Arc<dyn Reasoner>,
        narrative: Arc<dyn NarrativeStore>,
    ) -> Result<Self, CampaignError> {
        world.validate()?;
        let store = WorldStore::new(world, config);
        let context = ToolContext::new(store.clone()).with_narrative(narrative.clone());
        let dispatcher = Arc::new(ToolDispatcher::with_world_tools(context));

        Ok(Self {
            orchestrator: Orchestrator::new(reasoner, dispatcher),
            store,
            narrative,
        })
    }

    /// Resume a campaign from a save file.
    pub async fn load(
        path: impl AsRef<Path>,
        config: EngineConfig,
        reasoner: Arc<dyn Reasoner>,
        narrative: Arc<dyn NarrativeStore>,
    ) -> Result<Self, CampaignError> {
        let saved = SavedCampaign::load_json(path).await?;
        info!(campaign = %saved.metadata.campaign_name, day = saved.metadata.day, "Campaign loaded");
        Self::new(saved.world, config, reasoner, narrative)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<(), CampaignError> {
        let world = self.store.snapshot().await;
        SavedCampaign::new(world).save_json(path).await?;
        Ok(())
    }

    /// Play one user turn. A completed turn advances the clock by one beat.
    pub async fn play_turn(&self, input: impl Into<String>) -> TurnOutcome {
        self.play_turn_with_cancel(input, &CancellationToken::new()).await
    }

    pub async fn play_turn_with_cancel(&self, input: impl Into<String>, cancel: &CancellationToken) -> TurnOutcome {
        let outcome = self.orchestrator.run_turn(input, cancel).await;
        if outcome.is_completed() {
            if let Err(err) = self.store.commit(Intent::AdvanceTime { beats: 1 }).await {
                warn!(error = %err, "Failed to advance the clock");
            }
        }
        outcome
    }

    pub fn store(&self) -> &WorldStore {
        &self.store
    }

    pub fn dispatcher(&self) -> &Arc<ToolDispatcher> {
        self.orchestrator.dispatcher()
    }

    pub fn narrative(&self) -> &Arc<dyn NarrativeStore> {
        &self.narrative
    }

    pub async fn snapshot(&self) -> World {
        self.store.snapshot().await
    }

    pub async fn clock(&self) -> ClockReading {
        self.store.read(|world| world.session.clock()).await
    }
}

impl std::fmt::Debug for Campaign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Campaign")
            .field("store", &self.store)
            .field("orchestrator", &self.orchestrator)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::InMemoryNarrativeStore;
    use crate::orchestrator::ReasoningStep;
    use crate::testing::{sample_world, RepeatingReasoner, ScriptedReasoner};
    use crate::tools::ToolCall;
    use serde_json::json;

    #[tokio::test]
    async fn test_completed_turn_advances_clock() {
        let reasoner = Arc::new(ScriptedReasoner::new(vec![ReasoningStep::finish("Quiet.")]));
        let campaign = Campaign::new(
            sample_world(),
            EngineConfig::default(),
            reasoner,
            Arc::new(InMemoryNarrativeStore::new()),
        )
        .unwrap();

        campaign.play_turn("wait").await;
        assert_eq!(campaign.clock().await.beat_counter, 1);
    }

    #[tokio::test]
    async fn test_aborted_turn_keeps_clock() {
        let reasoner = Arc::new(RepeatingReasoner::new(ToolCall::new(
            "get_location",
            json!({"location": "foyer"}),
        )));
        let campaign = Campaign::new(
            sample_world(),
            EngineConfig::default(),
            reasoner,
            Arc::new(InMemoryNarrativeStore::new()),
        )
        .unwrap();

        let outcome = campaign.play_turn("look").await;
        assert!(outcome.aborted().is_some());
        assert_eq!(campaign.clock().await.beat_counter, 0);
    }

    #[test]
    fn test_rejects_inconsistent_world() {
        let mut world = sample_world();
        world.session.participants.push("ghost".into());
        let result = Campaign::new(
            world,
            EngineConfig::default(),
            Arc::new(ScriptedReasoner::new(Vec::new())),
            Arc::new(InMemoryNarrativeStore::new()),
        );
        assert!(matches!(result, Err(CampaignError::Integrity(_))));
    }
}
