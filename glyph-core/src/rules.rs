//! Intent resolution and effect application.
//!
//! Every state change follows the same path:
//!
//! 1. A tool produces an [`Intent`].
//! 2. [`RulesEngine::resolve`] checks it against a read-only [`World`] and
//!    returns a [`Resolution`] listing the [`Effect`]s plus the outcome that is
//!    reported back to the caller.
//! 3. [`apply_effects`] commits the effects. It cannot fail, so a resolution is
//!    either fully applied or not applied at all.

use crate::automaton::{self, ResourceChange};
use crate::clues::{self, ClueSource, InspectionReport};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::pathfinder::{self, TravelOutcome};
use crate::world::{ClockReading, ClueId, EntityKey, ItemKey, LocationKey, Locus, TagSet, World};
use serde::{Deserialize, Serialize};

/// A requested change to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Intent {
    /// Step through one exit of the entity's current location.
    MoveEntity { entity: EntityKey, direction: String },

    /// Walk along the shortest route, stopping at the first block.
    Travel {
        entity: EntityKey,
        destination: LocationKey,
    },

    /// Signed change to a resource, with threshold rules.
    ApplyResourceDelta {
        entity: EntityKey,
        resource: String,
        delta: i32,
    },

    /// Healing or recovery. Never triggers threshold rules.
    RestoreResource {
        entity: EntityKey,
        resource: String,
        amount: i32,
    },

    AddTags { entity: EntityKey, tags: Vec<String> },

    RemoveTags { entity: EntityKey, tags: Vec<String> },

    /// Move an item from one locus to another.
    TransferItem { item: ItemKey, from: Locus, to: Locus },

    SetItemState { item: ItemKey, state: String },

    /// Examine a clue source.
    Inspect { source: ClueSource, inspector: EntityKey },

    TagLocation {
        location: LocationKey,
        tag: String,
        present: bool,
    },

    TagExit {
        location: LocationKey,
        direction: String,
        tag: String,
        present: bool,
    },

    AdvanceTime { beats: u32 },

    AddGlobalTag { tag: String },
}

/// A single committed field change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    EntityMoved {
        entity: EntityKey,
        from: LocationKey,
        to: LocationKey,
    },
    ResourceSet {
        entity: EntityKey,
        resource: String,
        value: i32,
    },
    TagsAdded { entity: EntityKey, tags: Vec<String> },
    TagsRemoved { entity: EntityKey, tags: Vec<String> },
    ItemRelocated { item: ItemKey, to: Locus },
    ItemStateSet { item: ItemKey, state: String },
    ClueRevealed { clue: ClueId },
    LocationTagSet {
        location: LocationKey,
        tag: String,
        present: bool,
    },
    ExitTagSet {
        location: LocationKey,
        direction: String,
        tag: String,
        present: bool,
    },
    ClockSet { reading: ClockReading },
    GlobalTagAdded { tag: String },
}

/// What an intent produces: effects to commit and the outcome to report.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub effects: Vec<Effect>,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn new(outcome: Outcome) -> Self {
        Self {
            effects: Vec::new(),
            outcome,
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Result reported for a resolved intent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Moved {
        entity: EntityKey,
        from: LocationKey,
        to: LocationKey,
    },
    Travelled(TravelOutcome),
    Resource(ResourceChange),
    Tags { entity: EntityKey, tags: TagSet },
    ItemLocus { item: ItemKey, locus: Locus },
    ItemState { item: ItemKey, state: String },
    Inspection(InspectionReport),
    LocationTags { location: LocationKey, tags: TagSet },
    ExitTags {
        location: LocationKey,
        direction: String,
        tags: TagSet,
    },
    Clock(ClockReading),
    GlobalTags { global_tags: TagSet },
}

/// Resolves intents against the configured rules.
#[derive(Debug, Clone, Default)]
pub struct RulesEngine {
    config: EngineConfig,
}

impl RulesEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn resolve(&self, world: &World, intent: Intent) -> EngineResult<Resolution> {
        match intent {
            Intent::MoveEntity { entity, direction } => self.resolve_move(world, &entity, &direction),
            Intent::Travel {
                entity,
                destination,
            } => self.resolve_travel(world, &entity, &destination),
            Intent::ApplyResourceDelta {
                entity,
                resource,
                delta,
            } => {
                let target = world.entity(entity.as_str())?;
                let change =
                    automaton::evaluate_delta(target, &resource, delta, self.config.acute_sanity_loss)?;
                Ok(resource_resolution(change))
            }
            Intent::RestoreResource {
                entity,
                resource,
                amount,
            } => {
                let target = world.entity(entity.as_str())?;
                let change = automaton::evaluate_restore(target, &resource, amount)?;
                Ok(resource_resolution(change))
            }
            Intent::AddTags { entity, tags } => {
                let target = world.entity(entity.as_str())?;
                let added = automaton::tags_to_add(&target.tags, &tags);
                let mut final_tags = target.tags.clone();
                final_tags.extend(added.iter().cloned());
                let resolution = Resolution::new(Outcome::Tags {
                    entity: target.key.clone(),
                    tags: final_tags,
                });
                Ok(if added.is_empty() {
                    resolution
                } else {
                    resolution.with_effect(Effect::TagsAdded {
                        entity: target.key.clone(),
                        tags: added,
                    })
                })
            }
            Intent::RemoveTags { entity, tags } => {
                let target = world.entity(entity.as_str())?;
                let removed = automaton::tags_to_remove(&target.tags, &tags);
                let mut final_tags = target.tags.clone();
                for tag in &removed {
                    final_tags.remove(tag);
                }
                let resolution = Resolution::new(Outcome::Tags {
                    entity: target.key.clone(),
                    tags: final_tags,
                });
                Ok(if removed.is_empty() {
                    resolution
                } else {
                    resolution.with_effect(Effect::TagsRemoved {
                        entity: target.key.clone(),
                        tags: removed,
                    })
                })
            }
            Intent::TransferItem { item, from, to } => self.resolve_transfer(world, &item, from, to),
            Intent::SetItemState { item, state } => {
                let target = world.item(item.as_str())?;
                let resolution = Resolution::new(Outcome::ItemState {
                    item: target.key.clone(),
                    state: state.clone(),
                });
                Ok(if target.state == state {
                    resolution
                } else {
                    resolution.with_effect(Effect::ItemStateSet {
                        item: target.key.clone(),
                        state,
                    })
                })
            }
            Intent::Inspect { source, inspector } => {
                let plan = clues::plan_inspection(world, &source, inspector.as_str())?;
                let mut effects: Vec<Effect> = plan
                    .newly_revealed
                    .into_iter()
                    .map(|clue| Effect::ClueRevealed { clue })
                    .collect();
                if !plan.tags_to_add.is_empty() {
                    effects.push(Effect::TagsAdded {
                        entity: plan.report.inspector.clone(),
                        tags: plan.tags_to_add,
                    });
                }
                Ok(Resolution::new(Outcome::Inspection(plan.report)).with_effects(effects))
            }
            Intent::TagLocation {
                location,
                tag,
                present,
            } => {
                let target = world.location(location.as_str())?;
                let mut tags = target.tags.clone();
                let changed = if present {
                    tags.insert(tag.clone())
                } else {
                    tags.remove(&tag)
                };
                let resolution = Resolution::new(Outcome::LocationTags {
                    location: target.key.clone(),
                    tags,
                });
                Ok(if changed {
                    resolution.with_effect(Effect::LocationTagSet {
                        location: target.key.clone(),
                        tag,
                        present,
                    })
                } else {
                    resolution
                })
            }
            Intent::TagExit {
                location,
                direction,
                tag,
                present,
            } => {
                let target = world.location(location.as_str())?;
                let exit = target.exit(&direction).ok_or_else(|| EngineError::NoSuchExit {
                    location: target.key.to_string(),
                    direction: direction.clone(),
                })?;
                let mut tags = exit.tags.clone();
                let changed = if present {
                    tags.insert(tag.clone())
                } else {
                    tags.remove(&tag)
                };
                let resolution = Resolution::new(Outcome::ExitTags {
                    location: target.key.clone(),
                    direction: direction.clone(),
                    tags,
                });
                Ok(if changed {
                    resolution.with_effect(Effect::ExitTagSet {
                        location: target.key.clone(),
                        direction,
                        tag,
                        present,
                    })
                } else {
                    resolution
                })
            }
            Intent::AdvanceTime { beats } => {
                let reading = world.session.clock_after(beats, self.config.beats_per_slot);
                let resolution = Resolution::new(Outcome::Clock(reading));
                Ok(if beats == 0 {
                    resolution
                } else {
                    resolution.with_effect(Effect::ClockSet { reading })
                })
            }
            Intent::AddGlobalTag { tag } => {
                let mut global_tags = world.session.global_tags.clone();
                let added = global_tags.insert(tag.clone());
                let resolution = Resolution::new(Outcome::GlobalTags { global_tags });
                Ok(if added {
                    resolution.with_effect(Effect::GlobalTagAdded { tag })
                } else {
                    resolution
                })
            }
        }
    }

    fn resolve_move(&self, world: &World, entity: &EntityKey, direction: &str) -> EngineResult<Resolution> {
        let here = world.entity_location(entity.as_str())?;
        let exit = here.exit(direction).ok_or_else(|| EngineError::NoSuchExit {
            location: here.key.to_string(),
            direction: direction.to_string(),
        })?;
        world.location(exit.target.as_str())?;

        if let Some(tag) = pathfinder::blocking_tag(world, exit, &self.config.blocking_tags) {
            return Err(EngineError::Blocked {
                at: exit.target.to_string(),
                tag,
            });
        }

        Ok(Resolution::new(Outcome::Moved {
            entity: entity.clone(),
            from: here.key.clone(),
            to: exit.target.clone(),
        })
        .with_effect(Effect::EntityMoved {
            entity: entity.clone(),
            from: here.key.clone(),
            to: exit.target.clone(),
        }))
    }

    fn resolve_travel(
        &self,
        world: &World,
        entity: &EntityKey,
        destination: &LocationKey,
    ) -> EngineResult<Resolution> {
        let outcome = pathfinder::plan_travel(
            world,
            entity.as_str(),
            destination.as_str(),
            &self.config.blocking_tags,
        )?;

        let moved = outcome.reached != outcome.from;
        let effect = Effect::EntityMoved {
            entity: outcome.entity.clone(),
            from: outcome.from.clone(),
            to: outcome.reached.clone(),
        };
        let resolution = Resolution::new(Outcome::Travelled(outcome));
        Ok(if moved {
            resolution.with_effect(effect)
        } else {
            resolution
        })
    }

    fn resolve_transfer(&self, world: &World, item: &ItemKey, from: Locus, to: Locus) -> EngineResult<Resolution> {
        let target = world.item(item.as_str())?;
        if target.locus != from {
            return Err(EngineError::PreconditionFailed(format!(
                "item '{item}' is {}, not {from}",
                target.locus
            )));
        }

        match &to {
            Locus::LocatedAt(location) => {
                world.location(location.as_str())?;
            }
            Locus::CarriedBy(entity) => {
                world.entity(entity.as_str())?;
            }
        }

        let resolution = Resolution::new(Outcome::ItemLocus {
            item: target.key.clone(),
            locus: to.clone(),
        });
        Ok(if to == from {
            resolution
        } else {
            resolution.with_effect(Effect::ItemRelocated {
                item: target.key.clone(),
                to,
            })
        })
    }
}

fn resource_resolution(change: ResourceChange) -> Resolution {
    let mut effects = Vec::new();
    if change.changed() {
        effects.push(Effect::ResourceSet {
            entity: change.entity.clone(),
            resource: change.resource.clone(),
            value: change.after,
        });
    }
    if !change.triggered_tags.is_empty() {
        effects.push(Effect::TagsAdded {
            entity: change.entity.clone(),
            tags: change.triggered_tags.clone(),
        });
    }
    Resolution::new(Outcome::Resource(change)).with_effects(effects)
}

/// Apply all effects of a resolution.
pub fn apply_effects(world: &mut World, effects: &[Effect]) {
    for effect in effects {
        apply_effect(world, effect);
    }
}

/// Apply a single effect. Effects come from [`RulesEngine::resolve`] against
/// the same world, so their targets exist.
pub fn apply_effect(world: &mut World, effect: &Effect) {
    match effect {
        Effect::EntityMoved { entity, to, .. } => {
            if let Some(target) = world.entities.get_mut(entity.as_str()) {
                target.location = Some(to.clone());
            }
        }
        Effect::ResourceSet {
            entity,
            resource,
            value,
        } => {
            if let Some(slot) = world
                .entities
                .get_mut(entity.as_str())
                .and_then(|e| e.resources.get_mut(resource))
            {
                slot.current = (*value).clamp(0, slot.max.max(0));
            }
        }
        Effect::TagsAdded { entity, tags } => {
            if let Some(target) = world.entities.get_mut(entity.as_str()) {
                target.tags.extend(tags.iter().cloned());
            }
        }
        Effect::TagsRemoved { entity, tags } => {
            if let Some(target) = world.entities.get_mut(entity.as_str()) {
                for tag in tags {
                    target.tags.remove(tag);
                }
            }
        }
        Effect::ItemRelocated { item, to } => {
            if let Some(target) = world.items.get_mut(item.as_str()) {
                target.locus = to.clone();
            }
        }
        Effect::ItemStateSet { item, state } => {
            if let Some(target) = world.items.get_mut(item.as_str()) {
                target.state = state.clone();
            }
        }
        Effect::ClueRevealed { clue } => {
            world.clues.mark_revealed(clue.as_str());
        }
        Effect::LocationTagSet {
            location,
            tag,
            present,
        } => {
            if let Some(target) = world.locations.get_mut(location.as_str()) {
                set_tag(&mut target.tags, tag, *present);
            }
        }
        Effect::ExitTagSet {
            location,
            direction,
            tag,
            present,
        } => {
            if let Some(exit) = world
                .locations
                .get_mut(location.as_str())
                .and_then(|l| l.exits.get_mut(direction))
            {
                set_tag(&mut exit.tags, tag, *present);
            }
        }
        Effect::ClockSet { reading } => {
            world.session.time_slot = reading.time_slot;
            world.session.beat_counter = reading.beat_counter;
            world.session.day = reading.day;
        }
        Effect::GlobalTagAdded { tag } => {
            world.session.global_tags.insert(tag.clone());
        }
    }
}

fn set_tag(tags: &mut TagSet, tag: &str, present: bool) {
    if present {
        tags.insert(tag.to_string());
    } else {
        tags.remove(tag);
    }
}
