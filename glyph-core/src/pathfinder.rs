//! Shortest routes over the location graph.
//!
//! Routes are found by breadth-first search. Blocked exits still count as
//! edges when searching so that a route can report where it is cut; moving
//! along a route stops in front of the first block.

use crate::error::{EngineError, EngineResult, RecordKind};
use crate::world::{EntityKey, Exit, LocationKey, World};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// The first hop of a route that cannot be walked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedHop {
    pub from: LocationKey,
    pub to: LocationKey,
    pub direction: String,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Locations from start to destination, both included.
    pub path: Vec<LocationKey>,
    /// Exit labels taken, one per hop.
    pub directions: Vec<String>,
    pub blocked_at: Option<BlockedHop>,
}

impl Route {
    pub fn hops(&self) -> usize {
        self.directions.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelOutcome {
    pub entity: EntityKey,
    pub from: LocationKey,
    pub destination: LocationKey,
    /// Where the entity ends up.
    pub reached: LocationKey,
    pub arrived: bool,
    /// Locations entered on the way, excluding the start.
    pub entered: Vec<LocationKey>,
    pub interrupted: Option<BlockedHop>,
}

/// The tag that stops passage through `exit`, checking the exit first and
/// then the location it leads to.
pub fn blocking_tag(world: &World, exit: &Exit, blocking: &BTreeSet<String>) -> Option<String> {
    if let Some(tag) = exit.tags.iter().find(|t| blocking.contains(*t)) {
        return Some(tag.clone());
    }
    world
        .locations
        .get(exit.target.as_str())
        .and_then(|target| target.tags.iter().find(|t| blocking.contains(*t)))
        .cloned()
}

/// Shortest route from `from` to `to`. Ties go to the lexically smallest path.
pub fn find_route(world: &World, from: &str, to: &str, blocking: &BTreeSet<String>) -> EngineResult<Route> {
    let start = world.location(from)?;
    world.location(to)?;

    let mut parents: BTreeMap<&str, (&LocationKey, &str)> = BTreeMap::new();
    let mut visited: BTreeSet<&str> = BTreeSet::new();
    let mut queue = VecDeque::new();

    visited.insert(start.key.as_str());
    queue.push_back(&start.key);

    let mut found = from == to;
    while let Some(current) = queue.pop_front() {
        if found {
            break;
        }
        let Some(location) = world.locations.get(current.as_str()) else {
            continue;
        };

        let mut neighbours: Vec<(&LocationKey, &str)> = location
            .exits
            .iter()
            .map(|(direction, exit)| (&exit.target, direction.as_str()))
            .collect();
        neighbours.sort();

        for (next, direction) in neighbours {
            if !visited.insert(next.as_str()) {
                continue;
            }
            parents.insert(next.as_str(), (current, direction));
            if next.as_str() == to {
                found = true;
                break;
            }
            queue.push_back(next);
        }
    }

    if !found {
        return Err(EngineError::not_found(RecordKind::Route, format!("no route from {from} to {to}")));
    }

    let mut path = vec![world.location(to)?.key.clone()];
    let mut directions = Vec::new();
    let mut cursor = to;
    while cursor != from {
        let Some(&(prev, direction)) = parents.get(cursor) else {
            return Err(EngineError::Internal(format!("broken route parent chain at {cursor}")));
        };
        directions.push(direction.to_string());
        path.push(prev.clone());
        cursor = prev.as_str();
    }
    path.reverse();
    directions.reverse();

    let blocked_at = path.windows(2).zip(&directions).find_map(|(pair, direction)| {
        let exit = world.locations.get(pair[0].as_str())?.exit(direction)?;
        blocking_tag(world, exit, blocking).map(|tag| BlockedHop {
            from: pair[0].clone(),
            to: pair[1].clone(),
            direction: direction.clone(),
            tag,
        })
    });

    Ok(Route {
        path,
        directions,
        blocked_at,
    })
}

/// Walk `entity` toward `destination`, stopping before the first blocked hop.
pub fn plan_travel(
    world: &World,
    entity: &str,
    destination: &str,
    blocking: &BTreeSet<String>,
) -> EngineResult<TravelOutcome> {
    let start = world.entity_location(entity)?;
    let route = find_route(world, start.key.as_str(), destination, blocking)?;

    let stop = match &route.blocked_at {
        Some(hop) => route
            .path
            .iter()
            .position(|k| k == &hop.from)
            .unwrap_or(0),
        None => route.path.len() - 1,
    };
    let reached = route.path[stop].clone();

    Ok(TravelOutcome {
        entity: world.entity(entity)?.key.clone(),
        from: start.key.clone(),
        destination: LocationKey::new(destination),
        arrived: reached.as_str() == destination,
        entered: route.path[1..=stop].to_vec(),
        reached,
        interrupted: route.blocked_at,
    })
}
