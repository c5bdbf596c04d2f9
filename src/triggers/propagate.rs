//! Trigger propagation engine
//!
//! Walks a channel's link list and applies a per-kind reaction to each
//! linked entity. Cascades terminate through the "no-op on unchanged state"
//! rule at each mechanism that can re-trigger its own channel; a depth
//! budget backstops pathological content and surfaces as an error.

use thiserror::Error;

use crate::core::config::{DIRECTOR_FACINGS, GATE_TRANSITION_SPEED, MAX_CASCADE_DEPTH};
use crate::core::types::{ChannelId, EntityKind};
use crate::entity::{Entity, EntityArena, EntityId};
use crate::map::Map;
use crate::templates::TemplateRegistry;

use super::pressure;

#[derive(Debug, Error)]
pub enum TriggerError {
    /// The cascade depth budget ran out. The no-op-on-unchanged-state rule
    /// should have settled the network long before this; content wired to
    /// defeat it is a fatal configuration problem, not something to truncate
    /// silently.
    #[error("cascade budget exhausted on channel {channel:?} after {depth} levels")]
    CascadeBudgetExhausted { channel: ChannelId, depth: usize },
}

/// Side effects a propagation pass wants the outer game layers to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    /// A sign fired; deliver its text to the causing entity
    SignMessage {
        sign: EntityId,
        target: Option<EntityId>,
        text: String,
    },
    /// An unanimated linear hazard discharges immediately
    HazardDischarge {
        entity: EntityId,
        cause: Option<EntityId>,
    },
    /// An altar accepted a sacrifice and has something to say
    AltarMessage { altar: EntityId, text: String },
    /// A kind the engine doesn't handle itself; the extension point for
    /// outer layers
    Generic {
        entity: EntityId,
        cause: Option<EntityId>,
        state: bool,
    },
}

/// Trigger every entity linked to `channel`.
///
/// `cause` may be absent: the scripting layer propagates channels without a
/// source entity. `state` carries the binary activate/release edge.
pub fn propagate(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    channel: ChannelId,
    cause: Option<EntityId>,
    state: bool,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    propagate_at(arena, map, templates, channel, cause, state, 0, &mut events)?;
    Ok(events)
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn propagate_at(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    channel: ChannelId,
    cause: Option<EntityId>,
    state: bool,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    if depth > MAX_CASCADE_DEPTH {
        return Err(TriggerError::CascadeBudgetExhausted { channel, depth });
    }

    // Snapshot: reactions may rewire the very entry being walked.
    for id in map.connections.snapshot(channel) {
        let Some(e) = arena.get(id) else {
            // Destroyed since the link was formed; the link is dead.
            tracing::warn!(
                "skipping stale link {} on channel {:?} (cause {:?})",
                id,
                channel,
                cause
            );
            continue;
        };

        if state && !e.flags.activate_on_push {
            continue;
        }
        if !state && !e.flags.activate_on_release {
            continue;
        }

        match e.kind {
            EntityKind::Gate | EntityKind::Pit => {
                if let Some(e) = arena.get_mut(id) {
                    e.state = gated_state(e, state);
                    // Nonzero processing speed: the traversal change happens
                    // over the following ticks, not instantly.
                    e.speed = GATE_TRANSITION_SPEED;
                }
            }
            EntityKind::Handle => {
                if let Some(e) = arena.get_mut(id) {
                    e.state = gated_state(e, state);
                    e.anim_frame = e.state as u32;
                }
            }
            EntityKind::Sign => {
                if let Some(e) = arena.get_mut(id) {
                    // food bounds how often the sign speaks; zero means
                    // unlimited.
                    if e.stats.food == 0 || e.stats.last_eat < e.stats.food {
                        events.push(TriggerEvent::SignMessage {
                            sign: id,
                            target: cause,
                            text: e.msg.clone().unwrap_or_default(),
                        });
                        if e.stats.food != 0 {
                            e.stats.last_eat += 1;
                        }
                    }
                }
            }
            EntityKind::Altar => {
                if let Some(e) = arena.get_mut(id) {
                    e.state = 1;
                    e.anim_frame = 1;
                }
            }
            EntityKind::Plate | EntityKind::Pedestal => {
                if let Some(e) = arena.get_mut(id) {
                    e.state = state as i32;
                    e.anim_frame = e.state as u32;
                }
            }
            EntityKind::TimedGate => retime_chain(arena, templates, id),
            EntityKind::Director | EntityKind::Firewall => {
                let animated = e.flags.animated;
                let kind = e.kind;
                if !animated && kind == EntityKind::Firewall {
                    events.push(TriggerEvent::HazardDischarge { entity: id, cause });
                } else if let Some(e) = arena.get_mut(id) {
                    advance_facing(e);
                }
            }
            _ => {
                // Generic per-kind hook: extension without touching the
                // engine itself.
                tracing::debug!("generic trigger for {} ({:?})", e.name, e.kind);
                events.push(TriggerEvent::Generic {
                    entity: id,
                    cause,
                    state,
                });
            }
        }
    }
    Ok(())
}

/// Mechanism state for an incoming edge, honoring the inversion flag
/// (`maxsp`) some gates and handles are configured with.
fn gated_state(e: &Entity, state: bool) -> i32 {
    if e.stats.maxsp != 0 {
        !state as i32
    } else {
        state as i32
    }
}

/// Retime every part of a timed mechanism from its template defaults and
/// schedule the chain.
fn retime_chain(arena: &mut EntityArena, templates: &TemplateRegistry, head: EntityId) {
    let mut parts = Vec::new();
    let mut at = Some(head);
    while let Some(id) = at {
        parts.push(id);
        at = arena.get(id).and_then(|e| e.more);
    }

    for id in parts {
        let defaults = arena
            .get(id)
            .and_then(|e| e.template)
            .map(|tid| {
                let body = &templates.get(tid).body;
                (body.speed, body.state)
            });
        if let Some(e) = arena.get_mut(id) {
            if let Some((speed, state)) = defaults {
                e.speed = speed;
                e.state = state;
            }
            e.stats.sp = 1;
            e.stats.hp = e.stats.maxhp;
        }
    }
}

/// Advance a director through its facings, wrapping after a full turn
fn advance_facing(e: &mut Entity) {
    e.stats.sp += e.stats.maxsp;
    if e.stats.sp > DIRECTOR_FACINGS {
        e.stats.sp = ((e.stats.sp - 1) % DIRECTOR_FACINGS) + 1;
    }
    e.anim_frame = (e.stats.sp.max(1) - 1) as u32;
}

/// Propagate an entity's own channel carrying its own state
pub fn push_trigger(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    push_trigger_at(arena, map, templates, id, 0, &mut events)?;
    Ok(events)
}

pub(crate) fn push_trigger_at(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    let Some(channel) = map.connections.channel_of(id) else {
        return Ok(());
    };
    let state = arena.get(id).map_or(false, |e| e.state != 0);
    propagate_at(arena, map, templates, channel, Some(id), state, depth, events)
}

/// Toggle a lever-driven mechanism and propagate the new state
pub fn use_handle(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    use_handle_at(arena, map, templates, id, 0, &mut events)?;
    Ok(events)
}

fn use_handle_at(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    id: EntityId,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    let Some(e) = arena.get_mut(id) else {
        tracing::warn!("use_handle on stale entity {}", id);
        return Ok(());
    };
    e.state = (e.state == 0) as i32;
    push_trigger_at(arena, map, templates, id, depth, events)
}

/// Re-evaluate a plate or pedestal and, when its state changed, make every
/// co-linked mechanism follow.
///
/// The "do nothing if new state equals old state" gate at the bottom is
/// what terminates mutual cascades between co-linked triggers.
pub fn update_plate(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    plate: EntityId,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    update_plate_at(arena, map, templates, plate, 0, &mut events)?;
    Ok(events)
}

fn update_plate_at(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    plate: EntityId,
    depth: usize,
    events: &mut Vec<TriggerEvent>,
) -> Result<(), TriggerError> {
    let Some(channel) = map.connections.channel_of(plate) else {
        return Ok(());
    };
    let Some(old) = arena.get(plate).map(|e| e.state) else {
        tracing::warn!("update_plate on stale entity {}", plate);
        return Ok(());
    };

    let mut any_down = false;
    for id in map.connections.snapshot(channel) {
        let Some(e) = arena.get(id) else {
            tracing::debug!("stale link {} while updating channel {:?}", id, channel);
            continue;
        };
        let active = match e.kind {
            EntityKind::Plate => pressure::plate_active(arena, map, id),
            EntityKind::Pedestal => pressure::pedestal_active(arena, map, id),
            _ => continue,
        };
        if let Some(e) = arena.get_mut(id) {
            e.state = active as i32;
        }
        if active {
            any_down = true;
        }
    }

    // Another co-linked trigger is held down: this one stays down too.
    if any_down {
        if let Some(e) = arena.get_mut(plate) {
            e.state = 1;
        }
    }

    let new = arena.get(plate).map(|e| e.state).unwrap_or(old);
    if new != old {
        if let Some(e) = arena.get_mut(plate) {
            e.anim_frame = e.state as u32;
        }
        // Make all other linked mechanisms follow.
        propagate_at(
            arena,
            map,
            templates,
            channel,
            Some(plate),
            new != 0,
            depth + 1,
            events,
        )?;
    }
    Ok(())
}

/// Map-load entry point: settle every channel by updating one of its
/// plates or pedestals.
pub fn update_all_plates(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let mut events = Vec::new();
    let channels: Vec<ChannelId> = map.connections.channels().collect();
    for channel in channels {
        for id in map.connections.snapshot(channel) {
            let Some(e) = arena.get(id) else {
                tracing::error!("stale link {} on channel {:?} during settle", id, channel);
                continue;
            };
            if matches!(e.kind, EntityKind::Plate | EntityKind::Pedestal) {
                update_plate_at(arena, map, templates, id, 0, &mut events)?;
                break;
            }
        }
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::MoveType;

    fn world() -> (EntityArena, Map, TemplateRegistry) {
        (
            EntityArena::new(),
            Map::new("test", 8, 8),
            TemplateRegistry::with_table_size(64),
        )
    }

    fn mechanism(kind: EntityKind, name: &str) -> Entity {
        let mut e = Entity::named(name);
        e.kind = kind;
        e
    }

    #[test]
    fn test_gate_reaction_arms_transition() {
        let (mut arena, mut map, reg) = world();
        let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
        map.link(&mut arena, gate, ChannelId(1));

        propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        let e = arena.get(gate).unwrap();
        assert_eq!(e.state, 1);
        assert!(e.speed > 0.0);
    }

    #[test]
    fn test_gate_inversion_flag() {
        let (mut arena, mut map, reg) = world();
        let mut body = mechanism(EntityKind::Gate, "inverted gate");
        body.stats.maxsp = 1;
        let gate = arena.insert(body);
        map.link(&mut arena, gate, ChannelId(1));

        propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        assert_eq!(arena.get(gate).unwrap().state, 0);
    }

    #[test]
    fn test_stale_link_skipped_without_crash() {
        let (mut arena, mut map, reg) = world();
        let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
        let lever = arena.insert(mechanism(EntityKind::Handle, "lever"));
        map.link(&mut arena, gate, ChannelId(1));
        map.link(&mut arena, lever, ChannelId(1));
        arena.destroy(gate);

        // The dead link is skipped; the survivor still reacts.
        propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        assert_eq!(arena.get(lever).unwrap().state, 1);
    }

    #[test]
    fn test_activation_edge_gating() {
        let (mut arena, mut map, reg) = world();
        let mut body = mechanism(EntityKind::Handle, "push-only");
        body.flags.activate_on_release = false;
        let handle = arena.insert(body);
        map.link(&mut arena, handle, ChannelId(1));

        propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        assert_eq!(arena.get(handle).unwrap().state, 1);
        // Release edge is ignored by this mechanism.
        propagate(&mut arena, &map, &reg, ChannelId(1), None, false).unwrap();
        assert_eq!(arena.get(handle).unwrap().state, 1);
    }

    #[test]
    fn test_sign_usage_counter_exhausts() {
        let (mut arena, mut map, reg) = world();
        let mut body = mechanism(EntityKind::Sign, "sign");
        body.msg = Some("the password is swordfish\n".into());
        body.stats.food = 2;
        let sign = arena.insert(body);
        map.link(&mut arena, sign, ChannelId(1));

        for expected in [1, 1, 0] {
            let events = propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
            let spoken = events
                .iter()
                .filter(|ev| matches!(ev, TriggerEvent::SignMessage { .. }))
                .count();
            assert_eq!(spoken, expected);
        }
    }

    #[test]
    fn test_sign_without_counter_is_unlimited() {
        let (mut arena, mut map, reg) = world();
        let mut body = mechanism(EntityKind::Sign, "sign");
        body.msg = Some("welcome\n".into());
        let sign = arena.insert(body);
        map.link(&mut arena, sign, ChannelId(1));

        for _ in 0..5 {
            let events = propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
            assert_eq!(events.len(), 1);
        }
    }

    #[test]
    fn test_altar_lights_on_activation() {
        let (mut arena, mut map, reg) = world();
        let altar = arena.insert(mechanism(EntityKind::Altar, "altar"));
        map.link(&mut arena, altar, ChannelId(1));

        propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        let e = arena.get(altar).unwrap();
        assert_eq!(e.state, 1);
        assert_eq!(e.anim_frame, 1);
    }

    #[test]
    fn test_director_facing_wraps_after_full_turn() {
        let (mut arena, mut map, reg) = world();
        let mut body = mechanism(EntityKind::Director, "director");
        body.flags.animated = true;
        body.stats.sp = 1;
        body.stats.maxsp = 1;
        let director = arena.insert(body);
        map.link(&mut arena, director, ChannelId(1));

        for expected in [2, 3, 4, 5, 6, 7, 8, 1] {
            propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
            assert_eq!(arena.get(director).unwrap().stats.sp, expected);
        }
    }

    #[test]
    fn test_unanimated_firewall_discharges() {
        let (mut arena, mut map, reg) = world();
        let wall = arena.insert(mechanism(EntityKind::Firewall, "firewall"));
        map.link(&mut arena, wall, ChannelId(1));

        let events = propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        assert!(matches!(
            events[0],
            TriggerEvent::HazardDischarge { entity, .. } if entity == wall
        ));
    }

    #[test]
    fn test_unrecognized_kind_falls_through_to_generic_hook() {
        let (mut arena, mut map, reg) = world();
        let odd = arena.insert(mechanism(EntityKind::Item, "odd mechanism"));
        map.link(&mut arena, odd, ChannelId(1));

        let events = propagate(&mut arena, &map, &reg, ChannelId(1), None, true).unwrap();
        assert_eq!(
            events,
            vec![TriggerEvent::Generic {
                entity: odd,
                cause: None,
                state: true,
            }]
        );
    }

    #[test]
    fn test_timed_gate_chain_retimed_from_template() {
        use crate::templates::store::Template;
        let (mut arena, mut map, mut reg) = world();

        let mut head_body = mechanism(EntityKind::TimedGate, "timed gate");
        head_body.speed = -0.3;
        head_body.state = 1;
        let head_tid = reg.push(Template::new("timed_gate", head_body));
        let mut part_body = mechanism(EntityKind::TimedGate, "timed gate");
        part_body.speed = -0.3;
        part_body.state = 1;
        part_body.pos = glam::IVec2::new(0, 1);
        let part_tid = reg.push(Template::new("timed_gate_2", part_body));
        reg.get_mut(head_tid).more = Some(part_tid);
        reg.get_mut(part_tid).head = Some(head_tid);
        reg.build_table().unwrap();

        let head = reg.instantiate_full(head_tid, &mut arena);
        // Simulate a run-down mechanism.
        {
            let e = arena.get_mut(head).unwrap();
            e.speed = 0.0;
            e.state = 0;
            e.stats.maxhp = 20;
            e.stats.hp = 0;
        }
        let part = arena.get(head).unwrap().more.unwrap();
        arena.get_mut(part).unwrap().stats.maxhp = 15;

        map.link(&mut arena, head, ChannelId(4));
        propagate(&mut arena, &map, &reg, ChannelId(4), None, true).unwrap();

        let h = arena.get(head).unwrap();
        assert_eq!(h.state, 1);
        assert!((h.speed - -0.3).abs() < f32::EPSILON);
        assert_eq!(h.stats.sp, 1);
        assert_eq!(h.stats.hp, 20);
        let p = arena.get(part).unwrap();
        assert_eq!(p.stats.hp, 15);
        assert_eq!(p.stats.sp, 1);
    }

    #[test]
    fn test_propagate_idempotent_on_repeated_state() {
        let (mut arena, mut map, reg) = world();
        let handle = arena.insert(mechanism(EntityKind::Handle, "lever"));
        map.link(&mut arena, handle, ChannelId(2));

        // A handle mirrors the incoming state: propagating the same state
        // twice leaves it exactly where the first pass put it.
        propagate(&mut arena, &map, &reg, ChannelId(2), None, true).unwrap();
        let after_first = arena.get(handle).unwrap().state;
        propagate(&mut arena, &map, &reg, ChannelId(2), None, true).unwrap();
        assert_eq!(arena.get(handle).unwrap().state, after_first);
    }

    #[test]
    fn test_cascade_budget_surfaces_as_error() {
        let (mut arena, mut map, reg) = world();
        let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
        map.link(&mut arena, gate, ChannelId(1));

        let mut events = Vec::new();
        let err = propagate_at(
            &mut arena,
            &map,
            &reg,
            ChannelId(1),
            None,
            true,
            MAX_CASCADE_DEPTH + 1,
            &mut events,
        )
        .unwrap_err();
        assert!(matches!(err, TriggerError::CascadeBudgetExhausted { .. }));
    }

    #[test]
    fn test_use_handle_toggles_and_propagates() {
        let (mut arena, mut map, reg) = world();
        let handle = arena.insert(mechanism(EntityKind::Handle, "lever"));
        let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
        map.link(&mut arena, handle, ChannelId(7));
        map.link(&mut arena, gate, ChannelId(7));

        use_handle(&mut arena, &map, &reg, handle).unwrap();
        assert_eq!(arena.get(handle).unwrap().state, 1);
        assert_eq!(arena.get(gate).unwrap().state, 1);

        use_handle(&mut arena, &map, &reg, handle).unwrap();
        assert_eq!(arena.get(handle).unwrap().state, 0);
        assert_eq!(arena.get(gate).unwrap().state, 0);
    }

    #[test]
    fn test_plate_scenario_weights() {
        let (mut arena, mut map, reg) = world();
        let pos = glam::IVec2::new(2, 2);

        let mut plate_body = mechanism(EntityKind::Plate, "pressure plate");
        plate_body.weight = 10; // threshold
        plate_body.move_on = MoveType::WALK;
        let plate = arena.insert(plate_body);
        map.insert_at(&mut arena, plate, pos);
        map.link(&mut arena, plate, ChannelId(3));

        let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
        map.link(&mut arena, gate, ChannelId(3));

        for (weight, move_type) in [
            (5, MoveType::WALK),
            (5, MoveType::WALK),
            (20, MoveType::NONE), // unset capability always counts
        ] {
            let mut e = Entity::named("weight");
            e.weight = weight;
            e.move_type = move_type;
            let id = arena.insert(e);
            map.insert_at(&mut arena, id, pos);
        }

        update_plate(&mut arena, &map, &reg, plate).unwrap();
        assert_eq!(arena.get(plate).unwrap().state, 1);
        // The push carried through to the co-linked gate.
        assert_eq!(arena.get(gate).unwrap().state, 1);
        assert_eq!(pressure::plate_weight(&arena, &map, plate), 30);
    }

    #[test]
    fn test_plate_update_is_noop_when_state_unchanged() {
        let (mut arena, mut map, reg) = world();
        let pos = glam::IVec2::new(1, 1);
        let mut plate_body = mechanism(EntityKind::Plate, "plate");
        plate_body.weight = 10;
        let plate = arena.insert(plate_body);
        map.insert_at(&mut arena, plate, pos);
        map.link(&mut arena, plate, ChannelId(3));

        let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
        map.link(&mut arena, gate, ChannelId(3));

        // Nothing on the plate: state stays up, nothing propagates.
        update_plate(&mut arena, &map, &reg, plate).unwrap();
        assert_eq!(arena.get(gate).unwrap().speed, 0.0);
    }

    #[test]
    fn test_update_all_plates_settles_every_channel() {
        let (mut arena, mut map, reg) = world();

        // Channel 1: loaded plate + gate. Channel 2: empty plate + gate.
        for (channel, pos, load) in [
            (ChannelId(1), glam::IVec2::new(1, 1), true),
            (ChannelId(2), glam::IVec2::new(4, 4), false),
        ] {
            let mut plate_body = mechanism(EntityKind::Plate, "plate");
            plate_body.weight = 10;
            let plate = arena.insert(plate_body);
            map.insert_at(&mut arena, plate, pos);
            map.link(&mut arena, plate, channel);

            let gate = arena.insert(mechanism(EntityKind::Gate, "gate"));
            map.link(&mut arena, gate, channel);

            if load {
                let mut rock = Entity::named("rock");
                rock.weight = 50;
                let rock = arena.insert(rock);
                map.insert_at(&mut arena, rock, pos);
            }
        }

        update_all_plates(&mut arena, &map, &reg).unwrap();

        let states: Vec<i32> = map
            .connections
            .snapshot(ChannelId(1))
            .into_iter()
            .chain(map.connections.snapshot(ChannelId(2)))
            .map(|id| arena.get(id).unwrap().state)
            .collect();
        // Channel 1 fully down, channel 2 fully up.
        assert_eq!(states.iter().filter(|&&s| s != 0).count(), 2);
        assert_eq!(states.len(), 4);
    }

    #[test]
    fn test_cascading_pedestal_pair_settles_once() {
        let (mut arena, mut map, reg) = world();
        let a_pos = glam::IVec2::new(1, 1);
        let b_pos = glam::IVec2::new(5, 5);

        let mut ped = mechanism(EntityKind::Pedestal, "pedestal");
        ped.matches = Some("dragon".into());
        let a = arena.insert(ped.clone());
        let b = arena.insert(ped);
        map.insert_at(&mut arena, a, a_pos);
        map.insert_at(&mut arena, b, b_pos);
        map.link(&mut arena, a, ChannelId(9));
        map.link(&mut arena, b, ChannelId(9));

        let mut dragon = Entity::named("dragon");
        dragon.race = Some("dragon".into());
        let d = arena.insert(dragon);
        map.insert_at(&mut arena, d, a_pos);

        // Activating one must not ping-pong the pair; both settle to the
        // same state in a single pass.
        update_plate(&mut arena, &map, &reg, a).unwrap();
        assert_eq!(arena.get(a).unwrap().state, 1);
        assert_eq!(arena.get(b).unwrap().state, 1);

        // Second update with the same world state changes nothing.
        update_plate(&mut arena, &map, &reg, a).unwrap();
        assert_eq!(arena.get(a).unwrap().state, 1);
        assert_eq!(arena.get(b).unwrap().state, 1);
    }
}
