//! Testing utilities.
//!
//! - [`ScriptedReasoner`] replays a fixed list of reasoning steps
//! - [`RepeatingReasoner`] asks for the same tool call forever
//! - [`sample_world`] builds a small haunted-house investigation

use crate::clues::{ClueDiscovery, ClueSource};
use crate::orchestrator::{Reasoner, ReasonerError, ReasoningStep, TurnContext};
use crate::tools::ToolCall;
use crate::world::{Entity, Interactable, Knowledge, Location, Locus, World, WorldBuilder};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// A reasoner that returns scripted steps in order.
///
/// Once the script runs out it answers with a fixed final line.
pub struct ScriptedReasoner {
    steps: Mutex<VecDeque<ReasoningStep>>,
    taken: AtomicUsize,
}

impl ScriptedReasoner {
    pub fn new(steps: Vec<ReasoningStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            taken: AtomicUsize::new(0),
        }
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> usize {
        self.taken.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn step(&self, _ctx: &TurnContext) -> Result<ReasoningStep, ReasonerError> {
        self.taken.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .steps
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| ReasoningStep::finish("The scene settles.")))
    }
}

/// A reasoner stuck on one tool call.
pub struct RepeatingReasoner {
    call: ToolCall,
    taken: AtomicUsize,
}

impl RepeatingReasoner {
    pub fn new(call: ToolCall) -> Self {
        Self {
            call,
            taken: AtomicUsize::new(0),
        }
    }

    pub fn steps(&self) -> usize {
        self.taken.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reasoner for RepeatingReasoner {
    async fn step(&self, _ctx: &TurnContext) -> Result<ReasoningStep, ReasonerError> {
        self.taken.fetch_add(1, Ordering::SeqCst);
        // Fresh id each time, same name and arguments.
        Ok(ReasoningStep::call(ToolCall::new(
            self.call.name.clone(),
            self.call.arguments.clone(),
        )))
    }
}

/// A small investigation: a foyer with a locked cellar, a library with a
/// librarian and a journal, and a study with a desk.
///
/// Ada starts in the foyer carrying a lantern.
pub fn sample_world() -> World {
    let built = WorldBuilder::new("The Hollow House")
        .location(
            Location::new("foyer", "Foyer")
                .with_description("Dust sheets over everything. A stair leads down.")
                .with_tagged_exit("down", "cellar", "locked"),
        )
        .location(Location::new("library", "Library").with_tag("dim"))
        .location(Location::new("study", "Study"))
        .location(Location::new("cellar", "Cellar").with_tag("dark").with_exit("up", "foyer"))
        .connect("foyer", "north", "library", "south")
        .connect("library", "east", "study", "west")
        .participant(
            Entity::new("ada", "Ada Whitlock")
                .at("foyer")
                .with_tag("investigator")
                .with_resource("hp", 12)
                .with_resource("sanity", 80)
                .with_resource("luck", 50),
        )
        .entity(
            Entity::new("brooks", "Mr. Brooks")
                .at("library")
                .with_tag("librarian")
                .with_resource("hp", 10)
                .with_resource("sanity", 60),
        )
        .item(Interactable::new("lantern", "Brass Lantern", Locus::CarriedBy("ada".into())).with_state("lit"))
        .item(
            Interactable::new("journal", "Water-stained Journal", Locus::LocatedAt("library".into()))
                .with_description("Someone's private notes, the last pages torn out."),
        )
        .item(Interactable::new("desk", "Writing Desk", Locus::LocatedAt("study".into())).with_state("closed"))
        .knowledge(Knowledge::new("ritual", "lore/ritual").granting("knows_ritual"))
        .knowledge(Knowledge::new("cult_name", "lore/cult").granting("knows_cult"))
        .clue(
            ClueDiscovery::new("journal_ritual", ClueSource::Interactable("journal".into()), "ritual")
                .with_flavor("A margin note describes the rite in a shaking hand."),
        )
        .clue(
            ClueDiscovery::new("brooks_ritual", ClueSource::Entity("brooks".into()), "ritual")
                .requiring(json!({"has_tag": "trusted_by_brooks"}))
                .with_flavor("Brooks lowers his voice and tells what he saw."),
        )
        .clue(
            ClueDiscovery::new("desk_cult", ClueSource::Interactable("desk".into()), "cult_name")
                .requiring(json!({"resource": {"name": "luck", "at_least": 40}}))
                .with_flavor("A letter slipped behind the drawer bears a sigil."),
        )
        .build();

    match built {
        Ok(world) => world,
        Err(err) => panic!("sample world is inconsistent: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_world_is_consistent() {
        let world = sample_world();
        world.validate().unwrap();
        assert_eq!(world.session.participants.len(), 1);
        assert_eq!(world.clues.len(), 3);
    }

    #[tokio::test]
    async fn test_scripted_reasoner_runs_out() {
        let reasoner = ScriptedReasoner::new(vec![ReasoningStep::finish("one")]);
        let ctx = TurnContext::new("hi", Vec::new(), 5);
        assert_eq!(reasoner.step(&ctx).await.unwrap(), ReasoningStep::finish("one"));
        assert_eq!(
            reasoner.step(&ctx).await.unwrap(),
            ReasoningStep::finish("The scene settles.")
        );
        assert_eq!(reasoner.steps(), 2);
    }
}
