//! Sprung triggers: mechanisms that fire on contact and release themselves
//!
//! Unlike a handle, a sprung trigger never waits for a second interaction:
//! pressing it toggles its channel and arms a release timer, and the tick
//! loop swings it back once the timer runs down, toggling the channel again.
//! While the timer runs the mechanism is busy and ignores further presses.

use crate::core::types::EntityKind;
use crate::entity::{Entity, EntityArena, EntityId};
use crate::map::Map;
use crate::templates::TemplateRegistry;

use super::propagate::{push_trigger_at, TriggerError, TriggerEvent};
use super::{altar, pressure};

/// Kinds the tick loop must hand to [`release_trigger`] when their timer
/// expires
pub fn is_sprung(kind: EntityKind) -> bool {
    matches!(
        kind,
        EntityKind::Trigger
            | EntityKind::TriggerButton
            | EntityKind::TriggerPedestal
            | EntityKind::TriggerAltar
    )
}

/// Busy from press until the timed release has run
fn in_motion(e: &Entity) -> bool {
    e.stats.sp != 0 || e.speed != 0.0
}

/// React to something touching or applying a sprung mechanism.
///
/// `cause` is the sacrifice candidate for a sprung altar; the weight and
/// criterion kinds re-evaluate their square regardless of what moved.
pub fn check_trigger(
    arena: &mut EntityArena,
    map: &mut Map,
    templates: &TemplateRegistry,
    id: EntityId,
    cause: Option<EntityId>,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    check_trigger_at(arena, map, templates, id, cause, 0, &mut events)?;
    Ok(events)
}

#[allow(clippy::too_many_arguments)]
fn check_trigger_at(
    arena: &mut EntityArena,
    map: &mut Map,
    templates: &TemplateRegistry,
    id: EntityId,
    cause: Option<EntityId>,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    let Some(e) = arena.get(id) else {
        tracing::warn!("check_trigger on stale entity {}", id);
        return Ok(());
    };

    match e.kind {
        EntityKind::Trigger => {
            if in_motion(e) {
                return Ok(());
            }
            press(arena, map, templates, id, depth, events)
        }
        EntityKind::TriggerButton => {
            let pushed = pressure::plate_active(arena, map, id);
            settle(arena, map, templates, id, pushed, depth, events)
        }
        EntityKind::TriggerPedestal => {
            let pushed = pressure::pedestal_active(arena, map, id);
            settle(arena, map, templates, id, pushed, depth, events)
        }
        EntityKind::TriggerAltar => {
            if in_motion(e) {
                return Ok(());
            }
            let Some(candidate) = cause else {
                return Ok(());
            };
            if altar::operate_altar(arena, map, templates, id, candidate, events) {
                press(arena, map, templates, id, depth, events)?;
            }
            Ok(())
        }
        _ => {
            tracing::debug!("check_trigger on non-sprung {} ({:?})", e.name, e.kind);
            Ok(())
        }
    }
}

/// Shared weight/criterion tail: update the pressed look, then fire only on
/// a fresh activation while the mechanism is at rest.
fn settle(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
    pushed: bool,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    let busy = {
        let Some(e) = arena.get_mut(id) else {
            return Ok(());
        };
        if (e.anim_frame != 0) == pushed {
            return Ok(());
        }
        e.anim_frame = pushed as u32;
        in_motion(e)
    };
    if busy || !pushed {
        return Ok(());
    }
    press(arena, map, templates, id, depth, events)
}

/// Fire: toggle the channel and arm the timed release.
fn press(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    if let Some(e) = arena.get_mut(id) {
        e.stats.sp = 1;
        e.anim_frame = 1;
        e.state = (e.state == 0) as i32;
        // exp stretches the release delay; unset means one whole step.
        e.speed = if e.stats.exp > 0 {
            1.0 / e.stats.exp as f32
        } else {
            1.0
        };
        e.speed_left = -1.0;
    }
    push_trigger_at(arena, map, templates, id, depth, events)
}

/// Swing a sprung mechanism back to rest. Returns whether the channel
/// should carry the release.
pub(crate) fn spring_back(e: &mut Entity) -> bool {
    let kind = e.kind;
    e.stats.sp = 0;
    e.speed = 0.0;
    e.speed_left = 0.0;
    // Buttons and pedestals keep their pressed look while the load remains;
    // levers and altars snap back visually.
    if matches!(kind, EntityKind::Trigger | EntityKind::TriggerAltar) {
        e.anim_frame = 0;
    }
    // A sprung altar configured with last_sp pushes its channel once per
    // sacrifice; the reset then swings the state back silently.
    let silent = kind == EntityKind::TriggerAltar && e.stats.last_sp != 0;
    e.state = (e.state == 0) as i32;
    !silent
}

/// Timed release, driven by the tick loop once the press timer runs down
pub fn release_trigger(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    let push = match arena.get_mut(id) {
        Some(e) => spring_back(e),
        None => {
            tracing::warn!("release_trigger on stale entity {}", id);
            return Ok(events);
        }
    };
    if push {
        push_trigger_at(arena, map, templates, id, 0, &mut events)?;
    }
    Ok(events)
}
