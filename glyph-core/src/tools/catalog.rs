//! The world tools exposed to the reasoning side.

use super::{ToolContext, ToolDispatcher, WorldTool};
use crate::clues::{self, ClueSource, InspectionReport};
use crate::dice::DiceExpression;
use crate::error::{EngineError, EngineResult, RecordKind};
use crate::pathfinder;
use crate::rules::{Intent, Outcome};
use crate::world::{Entity, EntityKey, ItemKey, LocationKey, Locus, World};
use crate::Tool;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

pub fn register_all(dispatcher: &mut ToolDispatcher) {
    dispatcher.register::<GetLocation>();
    dispatcher.register::<GetEntity>();
    dispatcher.register::<MoveEntity>();
    dispatcher.register::<Travel>();
    dispatcher.register::<FindRoute>();
    dispatcher.register::<ApplyResourceDelta>();
    dispatcher.register::<RestoreResource>();
    dispatcher.register::<AddTags>();
    dispatcher.register::<RemoveTags>();
    dispatcher.register::<TransferItem>();
    dispatcher.register::<SetItemState>();
    dispatcher.register::<Inspect>();
    dispatcher.register::<TagLocation>();
    dispatcher.register::<TagExit>();
    dispatcher.register::<AdvanceTime>();
    dispatcher.register::<AddGlobalTag>();
    dispatcher.register::<RollDice>();
}

fn to_json<T: Serialize>(value: &T) -> EngineResult<Value> {
    serde_json::to_value(value).map_err(|e| EngineError::Internal(format!("serializing tool output: {e}")))
}

async fn commit(ctx: &ToolContext, intent: Intent) -> EngineResult<Value> {
    let resolution = ctx.store.commit(intent).await?;
    to_json(&resolution.outcome)
}

// ============================================================================
// Queries
// ============================================================================

/// Look at a location: its description, tags, exits, and who and what is there.
#[derive(Tool, Deserialize)]
#[tool(name = "get_location")]
pub struct GetLocation {
    /// Location key
    #[tool(key)]
    pub location: String,
}

#[async_trait]
impl WorldTool for GetLocation {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        ctx.store
            .read(|world| to_json(&world.location_view(&self.location)?))
            .await
    }
}

#[derive(Serialize)]
struct EntityView<'a> {
    #[serde(flatten)]
    entity: &'a Entity,
    inventory: Vec<&'a ItemKey>,
}

/// Look up an entity: location, tags, resources and carried items.
#[derive(Tool, Deserialize)]
#[tool(name = "get_entity")]
pub struct GetEntity {
    /// Entity key
    #[tool(key)]
    pub entity: String,
}

#[async_trait]
impl WorldTool for GetEntity {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        ctx.store
            .read(|world| {
                let entity = world.entity(&self.entity)?;
                to_json(&EntityView {
                    entity,
                    inventory: world.inventory(&self.entity),
                })
            })
            .await
    }
}

/// Find the shortest route between two locations. Reports the first blocked
/// hop, if any, without moving anyone.
#[derive(Tool, Deserialize)]
#[tool(name = "find_route")]
pub struct FindRoute {
    /// Starting location key
    #[tool(key)]
    pub from: String,
    /// Destination location key
    #[tool(key)]
    pub to: String,
}

#[async_trait]
impl WorldTool for FindRoute {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        let blocking = ctx.store.config().blocking_tags.clone();
        ctx.store
            .read(|world| to_json(&pathfinder::find_route(world, &self.from, &self.to, &blocking)?))
            .await
    }
}

// ============================================================================
// Movement
// ============================================================================

/// Move an entity through one exit of its current location.
#[derive(Tool, Deserialize)]
#[tool(name = "move_entity")]
pub struct MoveEntity {
    /// Entity key
    #[tool(key)]
    pub entity: String,
    /// Exit label, e.g. "north" or "cellar stairs"
    pub direction: String,
}

#[async_trait]
impl WorldTool for MoveEntity {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::MoveEntity {
                entity: self.entity.into(),
                direction: self.direction,
            },
        )
        .await
    }

    fn related_keys(args: &Value, world: &World) -> Vec<String> {
        let (Some(entity), Some(direction)) = (
            args.get("entity").and_then(Value::as_str),
            args.get("direction").and_then(Value::as_str),
        ) else {
            return Vec::new();
        };
        world
            .entity_location(entity)
            .ok()
            .and_then(|here| here.exit(direction))
            .map(|exit| vec![exit.target.to_string()])
            .unwrap_or_default()
    }
}

/// Walk an entity toward a destination along the shortest route. Stops in
/// front of the first blocked passage and reports it.
#[derive(Tool, Deserialize)]
#[tool(name = "travel")]
pub struct Travel {
    /// Entity key
    #[tool(key)]
    pub entity: String,
    /// Destination location key
    #[tool(key)]
    pub destination: String,
}

#[async_trait]
impl WorldTool for Travel {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::Travel {
                entity: self.entity.into(),
                destination: self.destination.into(),
            },
        )
        .await
    }

    /// Every location on the route.
    fn related_keys(args: &Value, world: &World) -> Vec<String> {
        let (Some(entity), Some(destination)) = (
            args.get("entity").and_then(Value::as_str),
            args.get("destination").and_then(Value::as_str),
        ) else {
            return Vec::new();
        };
        let Ok(here) = world.entity_location(entity) else {
            return Vec::new();
        };
        pathfinder::find_route(world, here.key.as_str(), destination, &BTreeSet::new())
            .map(|route| route.path.iter().map(|key| key.to_string()).collect())
            .unwrap_or_default()
    }
}

// ============================================================================
// Resources and tags
// ============================================================================

/// Change a resource such as hp or sanity by a signed amount. The value is
/// clamped to its range and threshold conditions are applied as tags.
#[derive(Tool, Deserialize)]
#[tool(name = "apply_resource_delta")]
pub struct ApplyResourceDelta {
    /// Entity key
    #[tool(key)]
    pub entity: String,
    /// Resource name, e.g. "hp" or "sanity"
    pub resource: String,
    /// Signed change; negative for loss
    pub delta: i32,
}

#[async_trait]
impl WorldTool for ApplyResourceDelta {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::ApplyResourceDelta {
                entity: self.entity.into(),
                resource: self.resource,
                delta: self.delta,
            },
        )
        .await
    }
}

/// Restore a resource by a non-negative amount, up to its maximum.
#[derive(Tool, Deserialize)]
#[tool(name = "restore_resource")]
pub struct RestoreResource {
    /// Entity key
    #[tool(key)]
    pub entity: String,
    /// Resource name
    pub resource: String,
    /// Amount to restore
    pub amount: i32,
}

#[async_trait]
impl WorldTool for RestoreResource {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::RestoreResource {
                entity: self.entity.into(),
                resource: self.resource,
                amount: self.amount,
            },
        )
        .await
    }
}

/// Add tags to an entity. Tags already present are left alone.
#[derive(Tool, Deserialize)]
#[tool(name = "add_tags")]
pub struct AddTags {
    /// Entity key
    #[tool(key)]
    pub entity: String,
    /// Tags to add
    pub tags: Vec<String>,
}

#[async_trait]
impl WorldTool for AddTags {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::AddTags {
                entity: self.entity.into(),
                tags: self.tags,
            },
        )
        .await
    }
}

/// Remove tags from an entity.
#[derive(Tool, Deserialize)]
#[tool(name = "remove_tags")]
pub struct RemoveTags {
    /// Entity key
    #[tool(key)]
    pub entity: String,
    /// Tags to remove
    pub tags: Vec<String>,
}

#[async_trait]
impl WorldTool for RemoveTags {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::RemoveTags {
                entity: self.entity.into(),
                tags: self.tags,
            },
        )
        .await
    }
}

// ============================================================================
// Items
// ============================================================================

fn locus_for(world: &World, key: &str) -> EngineResult<Locus> {
    if world.entities.contains_key(key) {
        Ok(Locus::CarriedBy(EntityKey::new(key)))
    } else if world.locations.contains_key(key) {
        Ok(Locus::LocatedAt(LocationKey::new(key)))
    } else {
        Err(EngineError::not_found(RecordKind::Location, key))
    }
}

/// Hand an item over. `from` and `to` are each an entity key (carried) or a
/// location key (lying there); the item must currently be at `from`.
#[derive(Tool, Deserialize)]
#[tool(name = "transfer_item")]
pub struct TransferItem {
    /// Item key
    #[tool(key)]
    pub item: String,
    /// Current holder or location
    #[tool(key)]
    pub from: String,
    /// New holder or location
    #[tool(key)]
    pub to: String,
}

#[async_trait]
impl WorldTool for TransferItem {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        let (from, to) = ctx
            .store
            .read(|world| Ok::<_, EngineError>((locus_for(world, &self.from)?, locus_for(world, &self.to)?)))
            .await?;
        commit(
            ctx,
            Intent::TransferItem {
                item: self.item.into(),
                from,
                to,
            },
        )
        .await
    }
}

/// Set the free-form state of an item, e.g. "open" or "smashed".
#[derive(Tool, Deserialize)]
#[tool(name = "set_item_state")]
pub struct SetItemState {
    /// Item key
    #[tool(key)]
    pub item: String,
    /// New state
    pub state: String,
}

#[async_trait]
impl WorldTool for SetItemState {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::SetItemState {
                item: self.item.into(),
                state: self.state,
            },
        )
        .await
    }
}

// ============================================================================
// Clues
// ============================================================================

/// Examine an item or a person for clues. Returns what the inspector finds
/// and grants the tags that come with the knowledge.
#[derive(Tool, Deserialize)]
#[tool(name = "inspect")]
pub struct Inspect {
    /// Key of the item or entity being examined
    #[tool(key)]
    pub source: String,
    /// Key of the entity doing the examining
    #[tool(key)]
    pub inspector: String,
}

#[derive(Serialize)]
struct InspectOutput {
    #[serde(flatten)]
    report: InspectionReport,
    /// Tags sent to the narrative store for the inspector.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    forwarded_tags: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    narrative_errors: Vec<String>,
}

#[async_trait]
impl WorldTool for Inspect {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        let source: ClueSource = ctx
            .store
            .read(|world| clues::source_for_key(world, &self.source))
            .await?;
        let intent = Intent::Inspect {
            source,
            inspector: self.inspector.clone().into(),
        };

        // Narrative work happens before the commit; nothing is awaited after it.
        let Outcome::Inspection(planned) = ctx.store.preview(intent.clone()).await?.outcome else {
            return Err(EngineError::Internal("inspect resolved to a non-inspection outcome".into()));
        };

        let mut contents: BTreeMap<String, String> = BTreeMap::new();
        let mut forwarded_tags = Vec::new();
        let mut narrative_errors = Vec::new();
        if let Some(narrative) = &ctx.narrative {
            for clue in &planned.revealed {
                if contents.contains_key(&clue.content_ref) {
                    continue;
                }
                match narrative.fetch_content(&clue.content_ref).await {
                    Ok(Some(text)) => {
                        contents.insert(clue.content_ref.clone(), text);
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(content_ref = %clue.content_ref, error = %err, "Narrative content unavailable");
                        narrative_errors.push(format!("{}: {err}", clue.content_ref));
                    }
                }
            }

            if !planned.granted_tags.is_empty() {
                match narrative.grant_tags(&planned.inspector, &planned.granted_tags).await {
                    Ok(()) => forwarded_tags = planned.granted_tags.clone(),
                    Err(err) => {
                        warn!(entity = %planned.inspector, error = %err, "Failed to forward granted tags");
                        narrative_errors.push(err.to_string());
                    }
                }
            }
        }

        let Outcome::Inspection(mut report) = ctx.store.commit(intent).await?.outcome else {
            return Err(EngineError::Internal("inspect resolved to a non-inspection outcome".into()));
        };
        for clue in &mut report.revealed {
            clue.content = contents.get(&clue.content_ref).cloned();
        }

        to_json(&InspectOutput {
            report,
            forwarded_tags,
            narrative_errors,
        })
    }
}

// ============================================================================
// Locations
// ============================================================================

/// Add or remove a tag on a location, e.g. "flooded" or "sealed".
#[derive(Tool, Deserialize)]
#[tool(name = "tag_location")]
pub struct TagLocation {
    /// Location key
    #[tool(key)]
    pub location: String,
    /// Tag to set
    pub tag: String,
    /// Remove the tag instead of adding it
    #[tool(optional)]
    pub remove: Option<bool>,
}

#[async_trait]
impl WorldTool for TagLocation {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::TagLocation {
                location: self.location.into(),
                tag: self.tag,
                present: !self.remove.unwrap_or(false),
            },
        )
        .await
    }
}

/// Add or remove a tag on one exit, e.g. lock or unlock a door.
#[derive(Tool, Deserialize)]
#[tool(name = "tag_exit")]
pub struct TagExit {
    /// Location the exit leaves from
    #[tool(key)]
    pub location: String,
    /// Exit label
    pub direction: String,
    /// Tag to set, e.g. "locked"
    pub tag: String,
    /// Remove the tag instead of adding it
    #[tool(optional)]
    pub remove: Option<bool>,
}

#[async_trait]
impl WorldTool for TagExit {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(
            ctx,
            Intent::TagExit {
                location: self.location.into(),
                direction: self.direction,
                tag: self.tag,
                present: !self.remove.unwrap_or(false),
            },
        )
        .await
    }
}

// ============================================================================
// Session
// ============================================================================

/// Let time pass by a number of beats. Every few beats the time of day moves on.
#[derive(Tool, Deserialize)]
#[tool(name = "advance_time", exclusive)]
pub struct AdvanceTime {
    /// Number of beats
    pub beats: u32,
}

#[async_trait]
impl WorldTool for AdvanceTime {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(ctx, Intent::AdvanceTime { beats: self.beats }).await
    }
}

/// Mark a campaign-wide condition, e.g. "storm" or "cult_alerted".
#[derive(Tool, Deserialize)]
#[tool(name = "add_global_tag", exclusive)]
pub struct AddGlobalTag {
    /// Tag to add
    pub tag: String,
}

#[async_trait]
impl WorldTool for AddGlobalTag {
    async fn run(self, ctx: &ToolContext) -> EngineResult<Value> {
        commit(ctx, Intent::AddGlobalTag { tag: self.tag }).await
    }
}

/// Roll dice in NdM+K notation, e.g. "1d100" or "2d6+1".
#[derive(Tool, Deserialize)]
#[tool(name = "roll_dice")]
pub struct RollDice {
    /// Dice notation
    pub notation: String,
    /// What the roll is for
    #[tool(optional)]
    pub purpose: Option<String>,
}

#[async_trait]
impl WorldTool for RollDice {
    async fn run(self, _ctx: &ToolContext) -> EngineResult<Value> {
        let expression = DiceExpression::parse(&self.notation)
            .map_err(|e| EngineError::PreconditionFailed(e.to_string()))?;
        let result = expression.roll();
        let mut value = to_json(&result)?;
        if let (Some(purpose), Some(map)) = (self.purpose, value.as_object_mut()) {
            map.insert("purpose".to_string(), Value::String(purpose));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::ReasonCode;
    use crate::narrative::{InMemoryNarrativeStore, NarrativeError, NarrativeStore};
    use crate::store::WorldStore;
    use crate::testing::sample_world;
    use crate::tools::ToolArgs;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn dispatcher() -> ToolDispatcher {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        ToolDispatcher::with_world_tools(ToolContext::new(store))
    }

    #[test]
    fn test_generated_schema() {
        let schema = TagExit::input_schema();
        assert_eq!(schema["required"], json!(["location", "direction", "tag"]));
        assert_eq!(schema["properties"]["remove"]["type"], "boolean");
        assert_eq!(schema["additionalProperties"], false);
        assert_eq!(TransferItem::key_fields(), &["item", "from", "to"]);
        assert!(AdvanceTime::exclusive());
        assert!(GetLocation::tool_description().starts_with("Look at a location"));
    }

    #[test]
    fn test_all_tools_registered() {
        let names: Vec<String> = dispatcher().definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names.len(), 17);
        for name in ["travel", "inspect", "roll_dice", "tag_exit", "find_route"] {
            assert!(names.iter().any(|n| n == name), "{name}");
        }
    }

    #[tokio::test]
    async fn test_get_location_lists_occupants() {
        let envelope = dispatcher().invoke("get_location", json!({"location": "library"})).await;
        let data = envelope.data.unwrap();
        assert_eq!(data["location"]["name"], "Library");
        assert_eq!(data["entities"], json!(["brooks"]));
        assert_eq!(data["items"], json!(["journal"]));
    }

    #[tokio::test]
    async fn test_move_envelopes() {
        let d = dispatcher();
        let envelope = d.invoke("move_entity", json!({"entity": "ada", "direction": "down"})).await;
        assert_eq!(envelope.code(), Some(ReasonCode::Blocked));

        let envelope = d.invoke("move_entity", json!({"entity": "ada", "direction": "up"})).await;
        assert_eq!(envelope.code(), Some(ReasonCode::NoSuchExit));

        let envelope = d.invoke("move_entity", json!({"entity": "ada", "direction": "north"})).await;
        assert!(envelope.ok);
        assert_eq!(envelope.data.unwrap()["to"], "library");
    }

    #[tokio::test]
    async fn test_transfer_between_holders() {
        let d = dispatcher();
        let envelope = d
            .invoke("transfer_item", json!({"item": "lantern", "from": "ada", "to": "foyer"}))
            .await;
        assert!(envelope.ok, "{envelope:?}");
        assert_eq!(envelope.data.unwrap()["locus"], json!({"located_at": "foyer"}));

        let envelope = d
            .invoke("transfer_item", json!({"item": "lantern", "from": "ada", "to": "foyer"}))
            .await;
        assert_eq!(envelope.code(), Some(ReasonCode::PreconditionFailed));
    }

    #[tokio::test]
    async fn test_inspect_forwards_grants() {
        let narrative = Arc::new(InMemoryNarrativeStore::new().with_content("lore/ritual", "The ritual needs three."));
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let d = ToolDispatcher::with_world_tools(ToolContext::new(store).with_narrative(narrative.clone()));

        let envelope = d.invoke("inspect", json!({"source": "journal", "inspector": "ada"})).await;
        let data = envelope.data.unwrap();
        assert_eq!(data["revealed"][0]["content"], "The ritual needs three.");
        assert_eq!(data["revealed"][0]["newly_revealed"], true);

        let grants = narrative.grants().await;
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].1, vec!["knows_ritual".to_string()]);
    }

    #[tokio::test]
    async fn test_reinspection_forwards_grants_again() {
        let narrative = Arc::new(InMemoryNarrativeStore::new());
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let d = ToolDispatcher::with_world_tools(ToolContext::new(store).with_narrative(narrative.clone()));

        for _ in 0..2 {
            let envelope = d.invoke("inspect", json!({"source": "journal", "inspector": "ada"})).await;
            assert_eq!(envelope.data.unwrap()["forwarded_tags"], json!(["knows_ritual"]));
        }
        assert_eq!(narrative.grants().await.len(), 2);
    }

    /// Takes a day to answer any content request.
    struct SlowNarrative;

    #[async_trait]
    impl NarrativeStore for SlowNarrative {
        async fn fetch_content(&self, _content_ref: &str) -> Result<Option<String>, NarrativeError> {
            tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
            Ok(None)
        }

        async fn grant_tags(&self, _entity: &EntityKey, _tags: &[String]) -> Result<(), NarrativeError> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_narrative_times_out_without_committing() {
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let d = ToolDispatcher::with_world_tools(ToolContext::new(store.clone()).with_narrative(Arc::new(SlowNarrative)))
            .with_timeout(Duration::from_millis(50));

        let envelope = d.invoke("inspect", json!({"source": "journal", "inspector": "ada"})).await;
        assert_eq!(envelope.code(), Some(ReasonCode::Timeout));

        store
            .read(|world| {
                assert!(!world.clues.get("journal_ritual").unwrap().revealed);
                assert!(!world.entity("ada").unwrap().has_tag("knows_ritual"));
            })
            .await;
    }

    /// Refuses the first grant, accepts the rest.
    struct FlakyNarrative {
        refused: AtomicBool,
        inner: InMemoryNarrativeStore,
    }

    #[async_trait]
    impl NarrativeStore for FlakyNarrative {
        async fn fetch_content(&self, content_ref: &str) -> Result<Option<String>, NarrativeError> {
            self.inner.fetch_content(content_ref).await
        }

        async fn grant_tags(&self, entity: &EntityKey, tags: &[String]) -> Result<(), NarrativeError> {
            if !self.refused.swap(true, Ordering::SeqCst) {
                return Err(NarrativeError::Unavailable("connection reset".into()));
            }
            self.inner.grant_tags(entity, tags).await
        }
    }

    #[tokio::test]
    async fn test_failed_grant_is_reported_and_retried() {
        let narrative = Arc::new(FlakyNarrative {
            refused: AtomicBool::new(false),
            inner: InMemoryNarrativeStore::new(),
        });
        let store = WorldStore::new(sample_world(), EngineConfig::default());
        let d = ToolDispatcher::with_world_tools(ToolContext::new(store).with_narrative(narrative.clone()));

        let envelope = d.invoke("inspect", json!({"source": "journal", "inspector": "ada"})).await;
        assert!(envelope.ok);
        let data = envelope.data.unwrap();
        assert!(data["narrative_errors"][0].as_str().unwrap().contains("connection reset"));
        assert!(data.get("forwarded_tags").is_none());
        assert!(narrative.inner.grants().await.is_empty());

        let envelope = d.invoke("inspect", json!({"source": "journal", "inspector": "ada"})).await;
        let data = envelope.data.unwrap();
        assert_eq!(data["revealed"][0]["newly_revealed"], false);
        assert_eq!(data["forwarded_tags"], json!(["knows_ritual"]));
        assert_eq!(narrative.inner.grants().await.len(), 1);
    }

    #[tokio::test]
    async fn test_roll_dice() {
        let d = dispatcher();
        let envelope = d.invoke("roll_dice", json!({"notation": "1d100", "purpose": "luck"})).await;
        let data = envelope.data.unwrap();
        let total = data["total"].as_i64().unwrap();
        assert!((1..=100).contains(&total));
        assert_eq!(data["purpose"], "luck");

        let envelope = d.invoke("roll_dice", json!({"notation": "lots"})).await;
        assert_eq!(envelope.code(), Some(ReasonCode::PreconditionFailed));
    }
}
