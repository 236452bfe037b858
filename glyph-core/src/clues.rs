//! Clue resolution index.
//!
//! Knowledge is never attached to objects directly. A [`ClueDiscovery`] edge
//! links one source (an interactable or an entity) to one knowledge unit and
//! carries the condition under which inspecting the source reveals it. Many
//! edges may lead to the same knowledge, so a fact can be found more than one
//! way.

use crate::error::{EngineError, EngineResult, RecordKind};
use crate::world::{ClueId, Entity, EntityKey, ItemKey, KnowledgeKey, TagSet, World};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::warn;

/// What a clue is found on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClueSource {
    Interactable(ItemKey),
    Entity(EntityKey),
}

impl fmt::Display for ClueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClueSource::Interactable(item) => write!(f, "item '{item}'"),
            ClueSource::Entity(entity) => write!(f, "entity '{entity}'"),
        }
    }
}

/// An edge from a source to the knowledge it can reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClueDiscovery {
    pub id: ClueId,
    pub source: ClueSource,
    pub knowledge: KnowledgeKey,
    /// Discovery condition. Kept as raw JSON and parsed on inspection.
    #[serde(default)]
    pub condition: Value,
    /// How the discovery reads in the fiction.
    #[serde(default)]
    pub flavor: String,
    #[serde(default)]
    pub revealed: bool,
}

impl ClueDiscovery {
    pub fn new(id: impl Into<ClueId>, source: ClueSource, knowledge: impl Into<KnowledgeKey>) -> Self {
        Self {
            id: id.into(),
            source,
            knowledge: knowledge.into(),
            condition: Value::Null,
            flavor: String::new(),
            revealed: false,
        }
    }

    pub fn requiring(mut self, condition: Value) -> Self {
        self.condition = condition;
        self
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = flavor.into();
        self
    }
}

/// Owner of every clue edge in a world.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClueIndex {
    edges: Vec<ClueDiscovery>,
}

impl ClueIndex {
    /// Add an edge. Returns false if an edge with the same id exists.
    pub fn insert(&mut self, clue: ClueDiscovery) -> bool {
        if self.get(clue.id.as_str()).is_some() {
            return false;
        }
        self.edges.push(clue);
        true
    }

    pub fn get(&self, id: &str) -> Option<&ClueDiscovery> {
        self.edges.iter().find(|c| c.id.as_str() == id)
    }

    pub fn edges(&self) -> impl Iterator<Item = &ClueDiscovery> {
        self.edges.iter()
    }

    pub fn for_source<'a>(&'a self, source: &'a ClueSource) -> impl Iterator<Item = &'a ClueDiscovery> {
        self.edges.iter().filter(move |c| &c.source == source)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub(crate) fn mark_revealed(&mut self, id: &str) {
        if let Some(edge) = self.edges.iter_mut().find(|c| c.id.as_str() == id) {
            edge.revealed = true;
        }
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Bounds on a resource value, both inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceBound {
    pub name: String,
    #[serde(default)]
    pub at_least: Option<i32>,
    #[serde(default)]
    pub at_most: Option<i32>,
}

/// Parsed discovery condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Always,
    HasTag(String),
    LacksTag(String),
    Resource(ResourceBound),
    All(Vec<Condition>),
    Any(Vec<Condition>),
    Not(Box<Condition>),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConditionError {
    #[error("malformed condition: {0}")]
    Malformed(String),

    #[error("condition names unknown resource '{0}'")]
    UnknownResource(String),
}

impl Condition {
    pub fn parse(raw: &Value) -> Result<Self, ConditionError> {
        if raw.is_null() {
            return Ok(Condition::Always);
        }
        serde_json::from_value(raw.clone()).map_err(|e| ConditionError::Malformed(e.to_string()))
    }

    /// Evaluate against the inspector. Never mutates anything.
    pub fn evaluate(&self, inspector: &Entity) -> Result<bool, ConditionError> {
        Ok(match self {
            Condition::Always => true,
            Condition::HasTag(tag) => inspector.has_tag(tag),
            Condition::LacksTag(tag) => !inspector.has_tag(tag),
            Condition::Resource(bound) => {
                let value = inspector
                    .resource(&bound.name)
                    .ok_or_else(|| ConditionError::UnknownResource(bound.name.clone()))?
                    .current;
                bound.at_least.map_or(true, |min| value >= min)
                    && bound.at_most.map_or(true, |max| value <= max)
            }
            Condition::All(conditions) => {
                for condition in conditions {
                    if !condition.evaluate(inspector)? {
                        return Ok(false);
                    }
                }
                true
            }
            Condition::Any(conditions) => {
                for condition in conditions {
                    if condition.evaluate(inspector)? {
                        return Ok(true);
                    }
                }
                false
            }
            Condition::Not(inner) => !inner.evaluate(inspector)?,
        })
    }
}

// ============================================================================
// Inspection
// ============================================================================

/// One revealed clue in an inspection report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevealedClue {
    pub clue: ClueId,
    pub knowledge: KnowledgeKey,
    pub content_ref: String,
    pub flavor: String,
    pub newly_revealed: bool,
    /// Knowledge text, when a narrative store is attached.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionReport {
    pub source: ClueSource,
    pub inspector: EntityKey,
    pub revealed: Vec<RevealedClue>,
    pub still_hidden: usize,
    /// Every tag granted by the revealed knowledge, sorted.
    pub granted_tags: Vec<String>,
}

/// What an inspection would change, alongside the report it produces.
#[derive(Debug, Clone)]
pub struct InspectionPlan {
    pub report: InspectionReport,
    pub newly_revealed: Vec<ClueId>,
    /// Granted tags the inspector does not hold yet.
    pub tags_to_add: Vec<String>,
}

/// Evaluate every edge of `source` for `inspector` against a read-only world.
pub fn plan_inspection(world: &World, source: &ClueSource, inspector: &str) -> EngineResult<InspectionPlan> {
    match source {
        ClueSource::Interactable(item) => {
            world.item(item.as_str())?;
        }
        ClueSource::Entity(entity) => {
            world.entity(entity.as_str())?;
        }
    }
    let inspector = world.entity(inspector)?;

    let mut revealed = Vec::new();
    let mut newly_revealed = Vec::new();
    let mut still_hidden = 0;
    let mut granted = TagSet::new();

    for edge in world.clues.for_source(source) {
        let knowledge = match world.knowledge.get(edge.knowledge.as_str()) {
            Some(knowledge) => knowledge,
            None => {
                warn!(clue = %edge.id, knowledge = %edge.knowledge, "Skipping clue with missing knowledge");
                still_hidden += 1;
                continue;
            }
        };

        if !edge.revealed {
            let satisfied = Condition::parse(&edge.condition).and_then(|c| c.evaluate(inspector));
            match satisfied {
                Ok(true) => newly_revealed.push(edge.id.clone()),
                Ok(false) => {
                    still_hidden += 1;
                    continue;
                }
                Err(err) => {
                    warn!(clue = %edge.id, error = %err, "Skipping clue with unusable condition");
                    still_hidden += 1;
                    continue;
                }
            }
        }

        granted.extend(knowledge.tags_granted.iter().cloned());
        revealed.push(RevealedClue {
            clue: edge.id.clone(),
            knowledge: knowledge.key.clone(),
            content_ref: knowledge.content_ref.clone(),
            flavor: edge.flavor.clone(),
            newly_revealed: !edge.revealed,
            content: None,
        });
    }

    let tags_to_add = granted
        .iter()
        .filter(|t| !inspector.has_tag(t))
        .cloned()
        .collect();

    Ok(InspectionPlan {
        report: InspectionReport {
            source: source.clone(),
            inspector: inspector.key.clone(),
            revealed,
            still_hidden,
            granted_tags: granted.into_iter().collect(),
        },
        newly_revealed,
        tags_to_add,
    })
}

/// Resolve a bare key to a clue source, preferring interactables.
pub fn source_for_key(world: &World, key: &str) -> EngineResult<ClueSource> {
    if world.items.contains_key(key) {
        Ok(ClueSource::Interactable(ItemKey::new(key)))
    } else if world.entities.contains_key(key) {
        Ok(ClueSource::Entity(EntityKey::new(key)))
    } else {
        Err(EngineError::not_found(RecordKind::Item, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn archivist() -> Entity {
        Entity::new("ada", "Ada")
            .with_tag("librarian")
            .with_resource("sanity", 60)
    }

    #[test]
    fn test_null_means_always() {
        assert_eq!(Condition::parse(&Value::Null).unwrap(), Condition::Always);
        assert_eq!(Condition::parse(&json!("always")).unwrap(), Condition::Always);
    }

    #[test]
    fn test_nested_conditions() {
        let condition = Condition::parse(&json!({
            "all": [
                {"has_tag": "librarian"},
                {"not": {"has_tag": "blind"}},
                {"any": [
                    {"resource": {"name": "sanity", "at_least": 50}},
                    {"lacks_tag": "librarian"}
                ]}
            ]
        }))
        .unwrap();
        assert!(condition.evaluate(&archivist()).unwrap());
    }

    #[test]
    fn test_resource_bounds() {
        let condition = Condition::parse(&json!({"resource": {"name": "sanity", "at_most": 40}})).unwrap();
        assert!(!condition.evaluate(&archivist()).unwrap());
    }

    #[test]
    fn test_malformed_and_unknown() {
        assert!(matches!(
            Condition::parse(&json!({"has_tag": 3})),
            Err(ConditionError::Malformed(_))
        ));
        assert!(matches!(
            Condition::parse(&json!({"resource": {"name": "sanity", "above": 3}})),
            Err(ConditionError::Malformed(_))
        ));

        let condition = Condition::parse(&json!({"resource": {"name": "mana", "at_least": 1}})).unwrap();
        assert_eq!(
            condition.evaluate(&archivist()),
            Err(ConditionError::UnknownResource("mana".into()))
        );
    }

    #[test]
    fn test_unusable_edges_stay_hidden() {
        use crate::rules::{apply_effects, RulesEngine};
        use crate::world::{Interactable, Knowledge, Locus, Location, WorldBuilder};

        let shelf = ClueSource::Interactable("shelf".into());
        let mut world = WorldBuilder::new("Stacks")
            .location(Location::new("stacks", "Stacks"))
            .participant(Entity::new("ada", "Ada").at("stacks").with_resource("sanity", 60))
            .item(Interactable::new("shelf", "Shelf", Locus::LocatedAt("stacks".into())))
            .knowledge(Knowledge::new("map", "lore/map").granting("knows_map"))
            .knowledge(Knowledge::new("seal", "lore/seal").granting("knows_seal"))
            .knowledge(Knowledge::new("rite", "lore/rite").granting("knows_rite"))
            .clue(ClueDiscovery::new("shelf_map", shelf.clone(), "map"))
            .clue(ClueDiscovery::new("shelf_seal", shelf.clone(), "seal").requiring(json!({"has_tag": 3})))
            .clue(
                ClueDiscovery::new("shelf_rite", shelf.clone(), "rite")
                    .requiring(json!({"resource": {"name": "mana", "at_least": 1}})),
            )
            .build()
            .unwrap();

        let plan = plan_inspection(&world, &shelf, "ada").unwrap();
        assert_eq!(plan.report.revealed.len(), 1);
        assert_eq!(plan.report.revealed[0].clue.as_str(), "shelf_map");
        assert_eq!(plan.report.still_hidden, 2);
        assert_eq!(plan.newly_revealed.len(), 1);
        assert_eq!(plan.newly_revealed[0].as_str(), "shelf_map");
        assert_eq!(plan.tags_to_add, ["knows_map"]);

        let engine = RulesEngine::default();
        let resolution = engine
            .resolve(
                &world,
                crate::rules::Intent::Inspect {
                    source: shelf.clone(),
                    inspector: "ada".into(),
                },
            )
            .unwrap();
        apply_effects(&mut world, &resolution.effects);

        assert!(world.clues.get("shelf_map").unwrap().revealed);
        assert!(!world.clues.get("shelf_seal").unwrap().revealed);
        assert!(!world.clues.get("shelf_rite").unwrap().revealed);
        let ada = world.entity("ada").unwrap();
        assert!(ada.has_tag("knows_map"));
        assert!(!ada.has_tag("knows_seal"));
        assert!(!ada.has_tag("knows_rite"));
    }

    #[test]
    fn test_index_rejects_duplicate_ids() {
        let mut index = ClueIndex::default();
        let source = ClueSource::Entity("ada".into());
        assert!(index.insert(ClueDiscovery::new("c1", source.clone(), "k1")));
        assert!(!index.insert(ClueDiscovery::new("c1", source.clone(), "k2")));
        assert_eq!(index.for_source(&source).count(), 1);
    }
}
