//! World records: locations, entities, interactables, knowledge and the
//! session clock.
//!
//! The [`World`] value is the single owner of every record. It is only
//! mutated by [`crate::rules::apply_effects`]; everything else reads it.

use crate::clues::{ClueDiscovery, ClueIndex, ClueSource};
use crate::error::{EngineError, EngineResult, RecordKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Keys
// ============================================================================

macro_rules! record_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(key: &str) -> Self {
                Self(key.to_string())
            }
        }

        impl From<String> for $name {
            fn from(key: String) -> Self {
                Self(key)
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

record_key!(
    /// Stable identity of a location within a campaign.
    LocationKey
);
record_key!(
    /// Stable identity of an entity (investigator, NPC, creature).
    EntityKey
);
record_key!(
    /// Stable identity of an interactable object.
    ItemKey
);
record_key!(
    /// Stable identity of a knowledge unit.
    KnowledgeKey
);
record_key!(
    /// Stable identity of a clue edge.
    ClueId
);

/// A set of tags. Ordered so that snapshots and observations are stable.
pub type TagSet = BTreeSet<String>;

// ============================================================================
// Locations
// ============================================================================

/// A directed connection out of a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exit {
    pub target: LocationKey,
    /// Edge-level tags such as "locked" on a door.
    #[serde(default)]
    pub tags: TagSet,
}

impl Exit {
    pub fn to(target: impl Into<LocationKey>) -> Self {
        Self {
            target: target.into(),
            tags: TagSet::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// A node of the location graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub key: LocationKey,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: TagSet,
    /// Direction label -> exit.
    #[serde(default)]
    pub exits: BTreeMap<String, Exit>,
}

impl Location {
    pub fn new(key: impl Into<LocationKey>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            tags: TagSet::new(),
            exits: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_exit(mut self, direction: impl Into<String>, target: impl Into<LocationKey>) -> Self {
        self.exits.insert(direction.into(), Exit::to(target));
        self
    }

    pub fn with_tagged_exit(
        mut self,
        direction: impl Into<String>,
        target: impl Into<LocationKey>,
        tag: impl Into<String>,
    ) -> Self {
        self.exits
            .insert(direction.into(), Exit::to(target).with_tag(tag));
        self
    }

    pub fn exit(&self, direction: &str) -> Option<&Exit> {
        self.exits.get(direction)
    }
}

// ============================================================================
// Resources and entities
// ============================================================================

/// Category of a numeric resource, which selects its threshold rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Physical condition (hp, health).
    Vital,
    /// Mental condition (sanity).
    Mental,
    /// Anything else (power, luck, magic points).
    Pool,
}

impl ResourceKind {
    pub fn classify(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "hp" | "health" | "hit_points" | "vitality" | "life" => ResourceKind::Vital,
            "san" | "sanity" | "mind" | "composure" => ResourceKind::Mental,
            _ => ResourceKind::Pool,
        }
    }
}

/// Current and maximum value of a resource. Persisted as `[current, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Resource {
    pub current: i32,
    pub max: i32,
}

impl Resource {
    /// A full resource.
    pub fn full(max: i32) -> Self {
        let max = max.max(0);
        Self { current: max, max }
    }

    /// A resource at `current`, clamped into `[0, max]`.
    pub fn at(current: i32, max: i32) -> Self {
        let max = max.max(0);
        Self {
            current: current.clamp(0, max),
            max,
        }
    }
}

impl From<(i32, i32)> for Resource {
    fn from((current, max): (i32, i32)) -> Self {
        Self { current, max }
    }
}

impl From<Resource> for (i32, i32) {
    fn from(resource: Resource) -> Self {
        (resource.current, resource.max)
    }
}

/// A character or creature in the world.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub name: String,
    /// `None` only while the entity is being placed.
    #[serde(default)]
    pub location: Option<LocationKey>,
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
}

impl Entity {
    pub fn new(key: impl Into<EntityKey>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            location: None,
            tags: TagSet::new(),
            resources: BTreeMap::new(),
        }
    }

    pub fn at(mut self, location: impl Into<LocationKey>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_resource(mut self, name: impl Into<String>, max: i32) -> Self {
        self.resources.insert(name.into(), Resource::full(max));
        self
    }

    pub fn with_resource_at(mut self, name: impl Into<String>, current: i32, max: i32) -> Self {
        self.resources.insert(name.into(), Resource::at(current, max));
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn resource(&self, name: &str) -> Option<&Resource> {
        self.resources.get(name)
    }
}

// ============================================================================
// Interactables
// ============================================================================

/// Where an interactable is. Exactly one of the two, always.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locus {
    LocatedAt(LocationKey),
    CarriedBy(EntityKey),
}

impl fmt::Display for Locus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locus::LocatedAt(location) => write!(f, "at {location}"),
            Locus::CarriedBy(entity) => write!(f, "carried by {entity}"),
        }
    }
}

/// An object that can be inspected, carried or handed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interactable {
    pub key: ItemKey,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: TagSet,
    /// Free-form state, e.g. "closed", "smashed".
    #[serde(default)]
    pub state: String,
    pub locus: Locus,
}

impl Interactable {
    pub fn new(key: impl Into<ItemKey>, name: impl Into<String>, locus: Locus) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            description: String::new(),
            tags: TagSet::new(),
            state: String::new(),
            locus,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

// ============================================================================
// Knowledge
// ============================================================================

/// An abstract fact. Its text lives in the external narrative store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Knowledge {
    pub key: KnowledgeKey,
    /// Pointer into the narrative retrieval store.
    pub content_ref: String,
    /// Tags granted to whoever discovers this.
    #[serde(default)]
    pub tags_granted: TagSet,
}

impl Knowledge {
    pub fn new(key: impl Into<KnowledgeKey>, content_ref: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            content_ref: content_ref.into(),
            tags_granted: TagSet::new(),
        }
    }

    pub fn granting(mut self, tag: impl Into<String>) -> Self {
        self.tags_granted.insert(tag.into());
        self
    }
}

// ============================================================================
// Session clock
// ============================================================================

/// Coarse time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TimeSlot {
    #[default]
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeSlot {
    const ORDER: [TimeSlot; 4] = [
        TimeSlot::Morning,
        TimeSlot::Afternoon,
        TimeSlot::Evening,
        TimeSlot::Night,
    ];

    fn index(self) -> usize {
        match self {
            TimeSlot::Morning => 0,
            TimeSlot::Afternoon => 1,
            TimeSlot::Evening => 2,
            TimeSlot::Night => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TimeSlot::Morning => "morning",
            TimeSlot::Afternoon => "afternoon",
            TimeSlot::Evening => "evening",
            TimeSlot::Night => "night",
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-campaign session record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSession {
    pub id: Uuid,
    pub campaign_name: String,
    pub time_slot: TimeSlot,
    pub beat_counter: u32,
    #[serde(default = "first_day")]
    pub day: u32,
    #[serde(default)]
    pub global_tags: TagSet,
    #[serde(default)]
    pub participants: Vec<EntityKey>,
}

fn first_day() -> u32 {
    1
}

/// Clock position after advancing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockReading {
    pub time_slot: TimeSlot,
    pub beat_counter: u32,
    pub day: u32,
}

impl GameSession {
    pub fn new(campaign_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_name: campaign_name.into(),
            time_slot: TimeSlot::Morning,
            beat_counter: 0,
            day: 1,
            global_tags: TagSet::new(),
            participants: Vec::new(),
        }
    }

    pub fn clock(&self) -> ClockReading {
        ClockReading {
            time_slot: self.time_slot,
            beat_counter: self.beat_counter,
            day: self.day,
        }
    }

    /// Where the clock would be after `beats` more beats.
    pub fn clock_after(&self, beats: u32, beats_per_slot: u32) -> ClockReading {
        let per_slot = beats_per_slot.max(1) as u64;
        let into_slot = self.beat_counter as u64 % per_slot;
        let slots_passed = (into_slot + beats as u64) / per_slot;
        let slot_index = self.time_slot.index() as u64 + slots_passed;
        let days_passed = slot_index / TimeSlot::ORDER.len() as u64;

        ClockReading {
            time_slot: TimeSlot::ORDER[(slot_index % TimeSlot::ORDER.len() as u64) as usize],
            beat_counter: self.beat_counter.saturating_add(beats),
            day: self.day.saturating_add(days_passed.min(u32::MAX as u64) as u32),
        }
    }
}

// ============================================================================
// World
// ============================================================================

/// Entities and items present at one location.
#[derive(Debug, Clone, Serialize)]
pub struct LocationView<'a> {
    pub location: &'a Location,
    pub entities: Vec<&'a EntityKey>,
    pub items: Vec<&'a ItemKey>,
}

/// The complete authoritative state of one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub session: GameSession,
    #[serde(default)]
    pub locations: BTreeMap<LocationKey, Location>,
    #[serde(default)]
    pub entities: BTreeMap<EntityKey, Entity>,
    #[serde(default)]
    pub items: BTreeMap<ItemKey, Interactable>,
    #[serde(default)]
    pub knowledge: BTreeMap<KnowledgeKey, Knowledge>,
    #[serde(default)]
    pub clues: ClueIndex,
}

impl World {
    pub fn new(campaign_name: impl Into<String>) -> Self {
        Self {
            session: GameSession::new(campaign_name),
            locations: BTreeMap::new(),
            entities: BTreeMap::new(),
            items: BTreeMap::new(),
            knowledge: BTreeMap::new(),
            clues: ClueIndex::default(),
        }
    }

    pub fn location(&self, key: &str) -> EngineResult<&Location> {
        self.locations
            .get(key)
            .ok_or_else(|| EngineError::not_found(RecordKind::Location, key))
    }

    pub fn entity(&self, key: &str) -> EngineResult<&Entity> {
        self.entities
            .get(key)
            .ok_or_else(|| EngineError::not_found(RecordKind::Entity, key))
    }

    pub fn item(&self, key: &str) -> EngineResult<&Interactable> {
        self.items
            .get(key)
            .ok_or_else(|| EngineError::not_found(RecordKind::Item, key))
    }

    pub fn knowledge(&self, key: &str) -> EngineResult<&Knowledge> {
        self.knowledge
            .get(key)
            .ok_or_else(|| EngineError::not_found(RecordKind::Knowledge, key))
    }

    /// Current location of an entity, which must be placed.
    pub fn entity_location(&self, key: &str) -> EngineResult<&Location> {
        let entity = self.entity(key)?;
        let location = entity.location.as_ref().ok_or_else(|| {
            EngineError::PreconditionFailed(format!("entity '{key}' has not been placed"))
        })?;
        self.location(location.as_str())
    }

    pub fn entities_at(&self, location: &str) -> Vec<&EntityKey> {
        self.entities
            .values()
            .filter(|e| e.location.as_ref().map(|l| l.as_str()) == Some(location))
            .map(|e| &e.key)
            .collect()
    }

    pub fn items_at(&self, location: &str) -> Vec<&ItemKey> {
        self.items
            .values()
            .filter(|i| matches!(&i.locus, Locus::LocatedAt(l) if l.as_str() == location))
            .map(|i| &i.key)
            .collect()
    }

    /// Items carried by an entity.
    pub fn inventory(&self, entity: &str) -> Vec<&ItemKey> {
        self.items
            .values()
            .filter(|i| matches!(&i.locus, Locus::CarriedBy(e) if e.as_str() == entity))
            .map(|i| &i.key)
            .collect()
    }

    pub fn location_view(&self, key: &str) -> EngineResult<LocationView<'_>> {
        let location = self.location(key)?;
        Ok(LocationView {
            location,
            entities: self.entities_at(key),
            items: self.items_at(key),
        })
    }

    /// Check referential integrity. Run when a world is built or loaded.
    pub fn validate(&self) -> Result<(), IntegrityError> {
        for location in self.locations.values() {
            for (direction, exit) in &location.exits {
                if !self.locations.contains_key(exit.target.as_str()) {
                    return Err(IntegrityError::DanglingExit {
                        location: location.key.to_string(),
                        direction: direction.clone(),
                        target: exit.target.to_string(),
                    });
                }
            }
        }

        for entity in self.entities.values() {
            if let Some(location) = &entity.location {
                if !self.locations.contains_key(location.as_str()) {
                    return Err(IntegrityError::DanglingEntityLocation {
                        entity: entity.key.to_string(),
                        location: location.to_string(),
                    });
                }
            }
            for (name, resource) in &entity.resources {
                if resource.max < 0 || resource.current < 0 || resource.current > resource.max {
                    return Err(IntegrityError::ResourceOutOfRange {
                        entity: entity.key.to_string(),
                        resource: name.clone(),
                        current: resource.current,
                        max: resource.max,
                    });
                }
            }
        }

        for item in self.items.values() {
            let present = match &item.locus {
                Locus::LocatedAt(location) => self.locations.contains_key(location.as_str()),
                Locus::CarriedBy(entity) => self.entities.contains_key(entity.as_str()),
            };
            if !present {
                return Err(IntegrityError::DanglingItemLocus {
                    item: item.key.to_string(),
                    locus: item.locus.to_string(),
                });
            }
        }

        for clue in self.clues.edges() {
            let source_present = match &clue.source {
                ClueSource::Interactable(item) => self.items.contains_key(item.as_str()),
                ClueSource::Entity(entity) => self.entities.contains_key(entity.as_str()),
            };
            if !source_present {
                return Err(IntegrityError::DanglingClueSource {
                    clue: clue.id.to_string(),
                    origin: clue.source.to_string(),
                });
            }
            if !self.knowledge.contains_key(clue.knowledge.as_str()) {
                return Err(IntegrityError::DanglingClueKnowledge {
                    clue: clue.id.to_string(),
                    knowledge: clue.knowledge.to_string(),
                });
            }
        }

        for participant in &self.session.participants {
            if !self.entities.contains_key(participant.as_str()) {
                return Err(IntegrityError::UnknownParticipant {
                    entity: participant.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Data-integrity problems found at build or load time.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IntegrityError {
    #[error("exit '{direction}' of '{location}' points at missing location '{target}'")]
    DanglingExit {
        location: String,
        direction: String,
        target: String,
    },

    #[error("entity '{entity}' stands in missing location '{location}'")]
    DanglingEntityLocation { entity: String, location: String },

    #[error("item '{item}' is {locus}, which does not exist")]
    DanglingItemLocus { item: String, locus: String },

    #[error("clue '{clue}' has missing source {origin}")]
    DanglingClueSource { clue: String, origin: String },

    #[error("clue '{clue}' reveals missing knowledge '{knowledge}'")]
    DanglingClueKnowledge { clue: String, knowledge: String },

    #[error("resource '{resource}' of '{entity}' is out of range ({current}/{max})")]
    ResourceOutOfRange {
        entity: String,
        resource: String,
        current: i32,
        max: i32,
    },

    #[error("session participant '{entity}' is not an entity")]
    UnknownParticipant { entity: String },

    #[error("duplicate {kind} key '{key}'")]
    DuplicateKey { kind: RecordKind, key: String },
}

// ============================================================================
// Builder
// ============================================================================

/// Assembles a [`World`] and validates it on [`WorldBuilder::build`].
#[derive(Debug)]
pub struct WorldBuilder {
    world: World,
    duplicate: Option<IntegrityError>,
}

impl WorldBuilder {
    pub fn new(campaign_name: impl Into<String>) -> Self {
        Self {
            world: World::new(campaign_name),
            duplicate: None,
        }
    }

    fn note_duplicate(&mut self, kind: RecordKind, key: &str) {
        if self.duplicate.is_none() {
            self.duplicate = Some(IntegrityError::DuplicateKey {
                kind,
                key: key.to_string(),
            });
        }
    }

    pub fn location(mut self, location: Location) -> Self {
        if self.world.locations.contains_key(location.key.as_str()) {
            self.note_duplicate(RecordKind::Location, location.key.as_str());
        }
        self.world.locations.insert(location.key.clone(), location);
        self
    }

    /// Add a pair of exits between two existing or future locations.
    pub fn connect(
        mut self,
        from: &str,
        forward: impl Into<String>,
        to: &str,
        back: impl Into<String>,
    ) -> Self {
        if let Some(location) = self.world.locations.get_mut(from) {
            location.exits.insert(forward.into(), Exit::to(to));
        }
        if let Some(location) = self.world.locations.get_mut(to) {
            location.exits.insert(back.into(), Exit::to(from));
        }
        self
    }

    pub fn entity(mut self, entity: Entity) -> Self {
        if self.world.entities.contains_key(entity.key.as_str()) {
            self.note_duplicate(RecordKind::Entity, entity.key.as_str());
        }
        self.world.entities.insert(entity.key.clone(), entity);
        self
    }

    /// Add an entity and list it as a session participant.
    pub fn participant(mut self, entity: Entity) -> Self {
        self.world.session.participants.push(entity.key.clone());
        self.entity(entity)
    }

    pub fn item(mut self, item: Interactable) -> Self {
        if self.world.items.contains_key(item.key.as_str()) {
            self.note_duplicate(RecordKind::Item, item.key.as_str());
        }
        self.world.items.insert(item.key.clone(), item);
        self
    }

    pub fn knowledge(mut self, knowledge: Knowledge) -> Self {
        if self.world.knowledge.contains_key(knowledge.key.as_str()) {
            self.note_duplicate(RecordKind::Knowledge, knowledge.key.as_str());
        }
        self.world.knowledge.insert(knowledge.key.clone(), knowledge);
        self
    }

    pub fn clue(mut self, clue: ClueDiscovery) -> Self {
        let id = clue.id.clone();
        if !self.world.clues.insert(clue) {
            self.note_duplicate(RecordKind::Clue, id.as_str());
        }
        self
    }

    pub fn global_tag(mut self, tag: impl Into<String>) -> Self {
        self.world.session.global_tags.insert(tag.into());
        self
    }

    pub fn build(self) -> Result<World, IntegrityError> {
        if let Some(err) = self.duplicate {
            return Err(err);
        }
        self.world.validate()?;
        Ok(self.world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_world() -> WorldBuilder {
        WorldBuilder::new("Test")
            .location(Location::new("hall", "Hall"))
            .location(Location::new("study", "Study"))
            .connect("hall", "north", "study", "south")
    }

    #[test]
    fn test_resource_persists_as_pair() {
        let resource = Resource::at(42, 50);
        let json = serde_json::to_string(&resource).unwrap();
        assert_eq!(json, "[42,50]");
        let back: Resource = serde_json::from_str(&json).unwrap();
        assert_eq!(back, resource);
    }

    #[test]
    fn test_resource_at_clamps() {
        assert_eq!(Resource::at(90, 80).current, 80);
        assert_eq!(Resource::at(-3, 80).current, 0);
    }

    #[test]
    fn test_resource_kind_classification() {
        assert_eq!(ResourceKind::classify("HP"), ResourceKind::Vital);
        assert_eq!(ResourceKind::classify("sanity"), ResourceKind::Mental);
        assert_eq!(ResourceKind::classify("luck"), ResourceKind::Pool);
    }

    #[test]
    fn test_connect_builds_both_directions() {
        let world = small_world().build().unwrap();
        assert_eq!(world.location("hall").unwrap().exit("north").unwrap().target.as_str(), "study");
        assert_eq!(world.location("study").unwrap().exit("south").unwrap().target.as_str(), "hall");
    }

    #[test]
    fn test_dangling_exit_is_rejected() {
        let err = WorldBuilder::new("Test")
            .location(Location::new("hall", "Hall").with_exit("down", "crypt"))
            .build()
            .unwrap_err();
        assert!(matches!(err, IntegrityError::DanglingExit { ref target, .. } if target == "crypt"));
    }

    #[test]
    fn test_dangling_locus_is_rejected() {
        let err = small_world()
            .item(Interactable::new("key", "Key", Locus::CarriedBy("nobody".into())))
            .build()
            .unwrap_err();
        assert!(matches!(err, IntegrityError::DanglingItemLocus { .. }));
    }

    #[test]
    fn test_dangling_clue_source_is_rejected() {
        let err = small_world()
            .knowledge(Knowledge::new("secret", "lore/secret"))
            .clue(ClueDiscovery::new("hidden", ClueSource::Interactable("urn".into()), "secret"))
            .build()
            .unwrap_err();
        assert!(matches!(err, IntegrityError::DanglingClueSource { ref clue, .. } if clue == "hidden"));
        assert!(err.to_string().contains("urn"));
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_duplicate_key_is_rejected() {
        let err = small_world()
            .location(Location::new("hall", "Another Hall"))
            .build()
            .unwrap_err();
        assert!(matches!(err, IntegrityError::DuplicateKey { kind: RecordKind::Location, .. }));
    }

    #[test]
    fn test_queries_by_location() {
        let world = small_world()
            .entity(Entity::new("ada", "Ada").at("hall"))
            .item(Interactable::new("lamp", "Lamp", Locus::LocatedAt("hall".into())))
            .item(Interactable::new("coin", "Coin", Locus::CarriedBy("ada".into())))
            .build()
            .unwrap();

        assert_eq!(world.entities_at("hall").len(), 1);
        assert_eq!(world.items_at("hall").len(), 1);
        assert_eq!(world.inventory("ada")[0].as_str(), "coin");
        assert!(world.items_at("study").is_empty());
    }

    #[test]
    fn test_clock_rolls_slots_and_days() {
        let mut session = GameSession::new("Test");
        let reading = session.clock_after(3, 4);
        assert_eq!(reading.time_slot, TimeSlot::Morning);

        let reading = session.clock_after(4, 4);
        assert_eq!(reading.time_slot, TimeSlot::Afternoon);

        session.time_slot = TimeSlot::Night;
        session.beat_counter = 7;
        let reading = session.clock_after(1, 4);
        assert_eq!(reading.time_slot, TimeSlot::Morning);
        assert_eq!(reading.day, 2);
        assert_eq!(reading.beat_counter, 8);
    }
}
