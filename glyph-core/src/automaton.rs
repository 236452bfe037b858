//! Tag and resource automaton.
//!
//! Resource changes are clamped into `[0, max]` and then checked against a
//! fixed list of threshold rules, in this order:
//!
//! 1. the value reaches 0: terminal tag for the resource category
//! 2. a vital delta takes at least half the maximum: `critically_wounded`
//! 3. a mental delta loses at least the acute threshold: `temporarily_unstable`
//! 4. a mental value at or below four fifths of the maximum: `unstable`
//!
//! Vital resources carry three more rules, checked after the first two:
//!
//! - a single delta taking at least the whole maximum: `dead`
//! - otherwise a delta that was a critical wound also knocks down: `prone`
//! - otherwise reaching 0 while critically wounded: `dying`
//!
//! A rule whose tag is already present does nothing and is not reported.
//! Nothing here removes a tag; removal is always an explicit operation.
//!
//! The functions in this module are pure. They compute what would change and
//! leave committing to [`crate::rules`].

use crate::error::{EngineError, EngineResult, RecordKind};
use crate::world::{Entity, EntityKey, Resource, ResourceKind, TagSet};
use serde::{Deserialize, Serialize};

pub const TAG_UNCONSCIOUS: &str = "unconscious";
pub const TAG_INSANE: &str = "insane";
pub const TAG_EXHAUSTED: &str = "exhausted";
pub const TAG_CRITICALLY_WOUNDED: &str = "critically_wounded";
pub const TAG_TEMPORARILY_UNSTABLE: &str = "temporarily_unstable";
pub const TAG_UNSTABLE: &str = "unstable";
pub const TAG_DEAD: &str = "dead";
pub const TAG_PRONE: &str = "prone";
pub const TAG_DYING: &str = "dying";

impl ResourceKind {
    /// Tag applied when a resource of this kind reaches zero.
    pub fn terminal_tag(&self) -> &'static str {
        match self {
            ResourceKind::Vital => TAG_UNCONSCIOUS,
            ResourceKind::Mental => TAG_INSANE,
            ResourceKind::Pool => TAG_EXHAUSTED,
        }
    }
}

/// Result of a resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceChange {
    pub entity: EntityKey,
    pub resource: String,
    pub kind: ResourceKind,
    pub before: i32,
    pub after: i32,
    pub max: i32,
    /// Tags newly added by threshold rules, in rule order.
    pub triggered_tags: Vec<String>,
}

impl ResourceChange {
    pub fn changed(&self) -> bool {
        self.before != self.after
    }
}

/// Value of `resource` after adding `delta`, clamped into `[0, max]`.
pub fn clamped(resource: Resource, delta: i64) -> i32 {
    let max = i64::from(resource.max.max(0));
    (i64::from(resource.current) + delta).clamp(0, max) as i32
}

fn lookup<'a>(entity: &'a Entity, resource: &str) -> EngineResult<&'a Resource> {
    entity
        .resource(resource)
        .ok_or_else(|| EngineError::not_found(RecordKind::Resource, format!("{}.{resource}", entity.key)))
}

/// Compute a signed resource change and the tags it triggers.
pub fn evaluate_delta(
    entity: &Entity,
    resource: &str,
    delta: i32,
    acute_sanity_loss: i32,
) -> EngineResult<ResourceChange> {
    let value = *lookup(entity, resource)?;
    let kind = ResourceKind::classify(resource);
    let after = clamped(value, i64::from(delta));

    let delta = i64::from(delta);
    let max = i64::from(value.max);
    let loss = -delta;

    let mut triggered: Vec<String> = Vec::new();
    let mut trigger = |tag: &str| {
        if !entity.has_tag(tag) && !triggered.iter().any(|t| t == tag) {
            triggered.push(tag.to_string());
        }
    };

    if after == 0 {
        trigger(kind.terminal_tag());
    }
    match kind {
        ResourceKind::Vital => {
            let major_wound = loss > 0 && loss * 2 >= max;
            if major_wound {
                trigger(TAG_CRITICALLY_WOUNDED);
            }
            if loss > 0 && loss >= max {
                trigger(TAG_DEAD);
            } else {
                if major_wound {
                    trigger(TAG_PRONE);
                }
                if after == 0 && (major_wound || entity.has_tag(TAG_CRITICALLY_WOUNDED)) {
                    trigger(TAG_DYING);
                }
            }
        }
        ResourceKind::Mental => {
            if loss > 0 && loss >= i64::from(acute_sanity_loss) {
                trigger(TAG_TEMPORARILY_UNSTABLE);
            }
            if i64::from(after) * 5 <= max * 4 {
                trigger(TAG_UNSTABLE);
            }
        }
        ResourceKind::Pool => {}
    }

    Ok(ResourceChange {
        entity: entity.key.clone(),
        resource: resource.to_string(),
        kind,
        before: value.current,
        after,
        max: value.max,
        triggered_tags: triggered,
    })
}

/// Compute an explicit restoration. Never triggers threshold rules.
pub fn evaluate_restore(entity: &Entity, resource: &str, amount: i32) -> EngineResult<ResourceChange> {
    if amount < 0 {
        return Err(EngineError::PreconditionFailed(format!(
            "restore amount must not be negative, got {amount}"
        )));
    }
    let value = *lookup(entity, resource)?;

    Ok(ResourceChange {
        entity: entity.key.clone(),
        resource: resource.to_string(),
        kind: ResourceKind::classify(resource),
        before: value.current,
        after: clamped(value, i64::from(amount)),
        max: value.max,
        triggered_tags: Vec::new(),
    })
}

/// Tags from `tags` that `existing` does not hold yet, deduplicated and sorted.
pub fn tags_to_add(existing: &TagSet, tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|t| !existing.contains(t.as_str()))
        .cloned()
        .collect::<TagSet>()
        .into_iter()
        .collect()
}

/// Tags from `tags` that `existing` holds, deduplicated and sorted.
pub fn tags_to_remove(existing: &TagSet, tags: &[String]) -> Vec<String> {
    tags.iter()
        .filter(|t| existing.contains(t.as_str()))
        .cloned()
        .collect::<TagSet>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn investigator() -> Entity {
        Entity::new("ada", "Ada")
            .with_resource("hp", 12)
            .with_resource("sanity", 80)
            .with_resource("luck", 50)
    }

    #[test]
    fn test_clamps_extreme_deltas() {
        let ada = investigator();
        let change = evaluate_delta(&ada, "hp", i32::MIN, 5).unwrap();
        assert_eq!(change.after, 0);

        let change = evaluate_delta(&ada, "hp", i32::MAX, 5).unwrap();
        assert_eq!(change.after, 12);
        assert!(change.triggered_tags.is_empty());
    }

    #[test]
    fn test_major_wound_knocks_down() {
        let ada = investigator();
        let change = evaluate_delta(&ada, "hp", -7, 5).unwrap();
        assert_eq!(change.after, 5);
        assert_eq!(change.triggered_tags, vec![TAG_CRITICALLY_WOUNDED, TAG_PRONE]);
    }

    #[test]
    fn test_killing_blow() {
        let ada = investigator();
        let change = evaluate_delta(&ada, "hp", -20, 5).unwrap();
        assert_eq!(change.after, 0);
        assert_eq!(
            change.triggered_tags,
            vec![TAG_UNCONSCIOUS, TAG_CRITICALLY_WOUNDED, TAG_DEAD]
        );

        // Exactly the maximum is enough, even from a wounded state.
        let ada = investigator().with_resource_at("hp", 3, 12);
        let change = evaluate_delta(&ada, "hp", -12, 5).unwrap();
        assert!(change.triggered_tags.iter().any(|t| t == TAG_DEAD));
        assert!(!change.triggered_tags.iter().any(|t| t == TAG_DYING));
    }

    #[test]
    fn test_dropping_to_zero_while_critical_is_dying() {
        let ada = investigator()
            .with_resource_at("hp", 4, 12)
            .with_tag(TAG_CRITICALLY_WOUNDED)
            .with_tag(TAG_PRONE);
        let change = evaluate_delta(&ada, "hp", -4, 5).unwrap();
        assert_eq!(change.after, 0);
        assert_eq!(change.triggered_tags, vec![TAG_UNCONSCIOUS, TAG_DYING]);

        // Without a critical wound, zero only knocks out.
        let ada = investigator().with_resource_at("hp", 4, 12);
        let change = evaluate_delta(&ada, "hp", -4, 5).unwrap();
        assert_eq!(change.triggered_tags, vec![TAG_UNCONSCIOUS]);
    }

    #[test]
    fn test_critical_wound_to_zero_is_dying() {
        let ada = investigator().with_resource_at("hp", 6, 12);
        let change = evaluate_delta(&ada, "hp", -6, 5).unwrap();
        assert_eq!(change.after, 0);
        assert_eq!(
            change.triggered_tags,
            vec![TAG_UNCONSCIOUS, TAG_CRITICALLY_WOUNDED, TAG_PRONE, TAG_DYING]
        );
    }

    #[test]
    fn test_vital_minor_damage_triggers_nothing() {
        let ada = investigator();
        let change = evaluate_delta(&ada, "hp", -5, 5).unwrap();
        assert_eq!(change.after, 7);
        assert!(change.triggered_tags.is_empty());
    }

    #[test]
    fn test_acute_sanity_loss() {
        let ada = investigator();
        let change = evaluate_delta(&ada, "sanity", -10, 5).unwrap();
        assert_eq!(change.after, 70);
        assert_eq!(change.triggered_tags, vec![TAG_TEMPORARILY_UNSTABLE]);
    }

    #[test]
    fn test_cumulative_sanity_loss() {
        let ada = investigator().with_resource_at("sanity", 64, 80);
        let change = evaluate_delta(&ada, "sanity", -4, 5).unwrap();
        assert_eq!(change.after, 60);
        assert_eq!(change.triggered_tags, vec![TAG_UNSTABLE]);
    }

    #[test]
    fn test_present_tags_are_not_reported() {
        let ada = investigator()
            .with_resource_at("sanity", 60, 80)
            .with_tag(TAG_UNSTABLE);
        let change = evaluate_delta(&ada, "sanity", -2, 5).unwrap();
        assert!(change.triggered_tags.is_empty());
    }

    #[test]
    fn test_pool_exhaustion() {
        let ada = investigator();
        let change = evaluate_delta(&ada, "luck", -50, 5).unwrap();
        assert_eq!(change.triggered_tags, vec![TAG_EXHAUSTED]);
    }

    #[test]
    fn test_unknown_resource() {
        let ada = investigator();
        let err = evaluate_delta(&ada, "mana", -1, 5).unwrap_err();
        assert!(matches!(err, EngineError::NotFound { kind: RecordKind::Resource, .. }));
    }

    #[test]
    fn test_restore_clamps_without_rules() {
        let ada = investigator().with_resource_at("hp", 0, 12);
        let change = evaluate_restore(&ada, "hp", 100).unwrap();
        assert_eq!(change.after, 12);
        assert!(change.triggered_tags.is_empty());

        assert!(evaluate_restore(&ada, "hp", -1).is_err());
    }

    #[test]
    fn test_tag_set_arithmetic() {
        let existing: TagSet = ["wet".to_string()].into();
        let add = tags_to_add(&existing, &["wet".into(), "cold".into(), "cold".into()]);
        assert_eq!(add, vec!["cold"]);
        let remove = tags_to_remove(&existing, &["wet".into(), "dry".into()]);
        assert_eq!(remove, vec!["wet"]);
    }
}
