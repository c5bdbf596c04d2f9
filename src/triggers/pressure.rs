//! Pressure plate and pedestal activation predicates
//!
//! These only *evaluate* the tile contents; flipping states and pushing the
//! result through the channel is [`update_plate`](super::propagate::update_plate)'s
//! job.

use crate::core::types::EntityKind;
use crate::entity::{Entity, EntityArena, EntityId};
use crate::map::Map;

/// Total weight resting on a plate.
///
/// An entity counts when its movement capabilities intersect the plate's
/// sensitivity mask, or when it has no movement capabilities at all (inert
/// objects always press down).
pub fn plate_weight(arena: &EntityArena, map: &Map, plate: EntityId) -> i64 {
    let Some(p) = arena.get(plate) else { return 0 };
    let move_on = p.move_on;

    map.stack_above(arena, plate)
        .into_iter()
        .filter_map(|id| arena.get(id))
        .filter(|e| e.move_type.intersects(move_on) || e.move_type.is_unset())
        .map(|e| e.stacked_weight())
        .sum()
}

/// Whether enough weight rests on a plate to hold it down
pub fn plate_active(arena: &EntityArena, map: &Map, plate: EntityId) -> bool {
    let Some(p) = arena.get(plate) else {
        return false;
    };
    plate_weight(arena, map, plate) >= p.weight
}

/// Whether something satisfying a pedestal's criterion stands on it.
///
/// Multi-part occupants are judged by their head. The criterion matches an
/// occupant's race, a special key carrying the same pass phrase, or any
/// player when the criterion is the literal "player".
pub fn pedestal_active(arena: &EntityArena, map: &Map, pedestal: EntityId) -> bool {
    let Some(p) = arena.get(pedestal) else {
        return false;
    };
    let Some(criterion) = p.matches.as_deref() else {
        return false;
    };
    let move_on = p.move_on;

    for id in map.stack_above(arena, pedestal) {
        let Some(e) = arena.get(id) else { continue };
        let head = e.head.and_then(|h| arena.get(h)).unwrap_or(e);
        if !(head.move_type.intersects(move_on) || head.move_type.is_unset()) {
            continue;
        }
        if meets_criterion(head, criterion) {
            return true;
        }
    }
    false
}

fn meets_criterion(e: &Entity, criterion: &str) -> bool {
    if e.race.as_deref() == Some(criterion) {
        return true;
    }
    if e.kind == EntityKind::SpecialKey && e.matches.as_deref() == Some(criterion) {
        return true;
    }
    criterion == "player" && e.kind == EntityKind::Player
}
