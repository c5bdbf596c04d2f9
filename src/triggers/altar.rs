//! Altar sacrifice evaluation
//!
//! An altar names what it wants (`matches`) and how much (`stats.food`).
//! For ordinary offerings the requirement counts units; for the literal
//! "money" it counts total coin value, and change is never given.

use crate::core::types::EntityKind;
use crate::entity::{Entity, EntityArena, EntityId};
use crate::map::{decrease_nrof, remove_entity, Map};
use crate::templates::TemplateRegistry;

use super::propagate::TriggerEvent;

/// Whether `candidate` is acceptable to `altar` at all, quantities aside.
///
/// Living things, wired mechanisms, and players are never sacrificable.
pub fn matches_sacrifice(
    templates: &TemplateRegistry,
    altar: &Entity,
    candidate: &Entity,
) -> bool {
    if candidate.flags.alive || candidate.flags.is_linked || candidate.kind == EntityKind::Player {
        return false;
    }
    let Some(wanted) = altar.matches.as_deref() else {
        return false;
    };

    let template_name = candidate
        .template
        .map(|tid| templates.get(tid).name.as_str());
    if template_name == Some(wanted)
        || candidate.name == wanted
        || candidate.matches.as_deref() == Some(wanted)
        || candidate.base_name() == wanted
    {
        return true;
    }
    wanted == "money" && candidate.kind == EntityKind::Money
}

/// Decide whether dropping `candidate` on `altar` satisfies the demand,
/// counting matching stacks already resting on the altar toward it.
///
/// Returns how many units of `candidate` the caller must consume. With
/// `remove_others` set, the contributing stacks on the altar are consumed
/// here; coin stacks are charged rounded *up* to whole coins.
pub fn check_sacrifice(
    arena: &mut EntityArena,
    map: &mut Map,
    templates: &TemplateRegistry,
    altar: EntityId,
    candidate: EntityId,
    remove_others: bool,
) -> Option<u32> {
    let (wanted_money, need) = {
        let a = arena.get(altar)?;
        let c = arena.get(candidate)?;
        if !matches_sacrifice(templates, a, c) {
            return None;
        }
        // Goods with unsettled ownership don't count.
        if c.flags.unpaid {
            return None;
        }
        (a.matches.as_deref() == Some("money"), a.stats.food as i64)
    };

    let (cand_count, cand_unit_worth, cand_total_worth) = {
        let c = arena.get(candidate)?;
        (c.stack_count() as i64, c.worth, c.stack_worth())
    };

    // The dropped stack alone covers it.
    if wanted_money && cand_total_worth >= need {
        if cand_unit_worth <= 0 {
            return None;
        }
        let mut units = need / cand_unit_worth;
        if need % cand_unit_worth != 0 {
            units += 1;
        }
        return Some(units as u32);
    }
    if !wanted_money && need <= cand_count {
        return Some(need as u32);
    }

    // Shortfall: see whether stacks already on the altar make up the rest.
    let shortfall = if wanted_money {
        need - cand_total_worth
    } else {
        need - cand_count
    };

    let on_altar = map.stack_above(arena, altar);
    let mut remaining = shortfall;
    for &id in &on_altar {
        if remaining <= 0 {
            break;
        }
        if id == candidate {
            continue;
        }
        let Some(e) = arena.get(id) else { continue };
        let Some(a) = arena.get(altar) else {
            return None;
        };
        if !matches_sacrifice(templates, a, e) {
            continue;
        }
        remaining -= if wanted_money {
            e.stack_worth()
        } else {
            e.stack_count() as i64
        };
    }
    if remaining > 0 {
        return None;
    }

    // The whole dropped stack goes; the rest comes off the altar.
    let toremove = cand_count as u32;
    if !remove_others {
        return Some(toremove);
    }

    let mut rest = shortfall;
    for &id in &on_altar {
        if rest <= 0 {
            break;
        }
        if id == candidate {
            continue;
        }
        let contribution = {
            let Some(e) = arena.get(id) else { continue };
            let Some(a) = arena.get(altar) else {
                return None;
            };
            if !matches_sacrifice(templates, a, e) {
                continue;
            }
            if wanted_money {
                (e.stack_worth(), e.worth)
            } else {
                (e.stack_count() as i64, 1)
            }
        };
        let (have, unit_worth) = contribution;
        if rest > have {
            remove_entity(map, arena, id);
            rest -= have;
        } else {
            let units = if wanted_money {
                if unit_worth <= 0 {
                    continue;
                }
                let mut u = rest / unit_worth;
                if rest % unit_worth != 0 {
                    u += 1;
                }
                u
            } else {
                rest
            };
            decrease_nrof(map, arena, id, units as u32);
            return Some(toremove);
        }
    }

    // Accounting said yes but removal came up short. Accept anyway; a lost
    // sacrifice is a map bug, a swallowed offering is a player complaint.
    tracing::error!(
        "check_sacrifice on {}: accounted for the sacrifice but couldn't consume it",
        map.name
    );
    Some(toremove)
}

/// Full altar operation: evaluate, consume, and emit the altar's message.
///
/// Returns whether the sacrifice was accepted; the caller propagates the
/// altar's channel on acceptance.
pub fn operate_altar(
    arena: &mut EntityArena,
    map: &mut Map,
    templates: &TemplateRegistry,
    altar: EntityId,
    candidate: EntityId,
    events: &mut Vec<TriggerEvent>,
) -> bool {
    let msg = {
        let Some(a) = arena.get(altar) else {
            return false;
        };
        // A spent one-shot altar (state already pushed) takes nothing more.
        if a.matches.is_none() || a.state != 0 {
            return false;
        }
        a.msg.clone()
    };

    let Some(units) = check_sacrifice(arena, map, templates, altar, candidate, true) else {
        return false;
    };
    decrease_nrof(map, arena, candidate, units);

    if let Some(text) = msg {
        events.push(TriggerEvent::AltarMessage { altar, text });
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::IVec2;

    fn world() -> (EntityArena, Map, TemplateRegistry) {
        (
            EntityArena::new(),
            Map::new("test", 4, 4),
            TemplateRegistry::with_table_size(64),
        )
    }

    fn altar_wanting(what: &str, amount: i32) -> Entity {
        let mut e = Entity::named("altar");
        e.kind = EntityKind::Altar;
        e.matches = Some(what.into());
        e.stats.food = amount;
        e
    }

    fn coins(n: u32, worth: i64) -> Entity {
        let mut e = Entity::named("silver coin");
        e.kind = EntityKind::Money;
        e.nrof = n;
        e.worth = worth;
        e
    }

    fn drop_at(arena: &mut EntityArena, map: &mut Map, e: Entity, pos: IVec2) -> EntityId {
        let id = arena.insert(e);
        map.insert_at(arena, id, pos);
        id
    }

    #[test]
    fn test_matches_sacrifice_rejections() {
        let reg = TemplateRegistry::with_table_size(64);
        let altar = altar_wanting("rose", 1);

        let mut live = Entity::named("rose");
        live.flags.alive = true;
        assert!(!matches_sacrifice(&reg, &altar, &live));

        let mut wired = Entity::named("rose");
        wired.flags.is_linked = true;
        assert!(!matches_sacrifice(&reg, &altar, &wired));

        let mut player = Entity::named("rose");
        player.kind = EntityKind::Player;
        assert!(!matches_sacrifice(&reg, &altar, &player));

        assert!(matches_sacrifice(&reg, &altar, &Entity::named("rose")));
    }

    #[test]
    fn test_money_demand_rounds_up() {
        let (mut arena, mut map, reg) = world();
        let pos = IVec2::new(1, 1);
        // Wants 100 in value; a coin is worth 30: three coins leave change
        // behind on the altar's side of the bargain, not the player's.
        let altar = drop_at(&mut arena, &mut map, altar_wanting("money", 100), pos);
        let purse = drop_at(&mut arena, &mut map, coins(10, 30), pos);

        let units = check_sacrifice(&mut arena, &mut map, &reg, altar, purse, true);
        assert_eq!(units, Some(4));
    }

    #[test]
    fn test_money_accumulates_other_altar_stacks() {
        let (mut arena, mut map, reg) = world();
        let pos = IVec2::new(1, 1);
        let altar = drop_at(&mut arena, &mut map, altar_wanting("money", 100), pos);
        // Already resting on the altar: 7 coins worth 20 each.
        let resting = drop_at(&mut arena, &mut map, coins(7, 20), pos);
        // Dropped now: 2 coins worth 20 each, short on their own.
        let dropped = drop_at(&mut arena, &mut map, coins(2, 20), pos);

        let units = check_sacrifice(&mut arena, &mut map, &reg, altar, dropped, true);
        // The whole dropped stack goes, and 60 in value (3 coins) comes off
        // the resting stack.
        assert_eq!(units, Some(2));
        assert_eq!(arena.get(resting).unwrap().nrof, 4);
    }

    #[test]
    fn test_item_count_demand() {
        let (mut arena, mut map, reg) = world();
        let pos = IVec2::new(0, 0);
        let altar = drop_at(&mut arena, &mut map, altar_wanting("rose", 3), pos);

        let mut short = Entity::named("rose");
        short.nrof = 2;
        let short = drop_at(&mut arena, &mut map, short, pos);
        assert_eq!(
            check_sacrifice(&mut arena, &mut map, &reg, altar, short, false),
            None
        );

        let mut enough = Entity::named("rose");
        enough.nrof = 5;
        let enough = drop_at(&mut arena, &mut map, enough, pos);
        // Two matching stacks now rest on the altar; `short` covers part of
        // the demand, so the 2-stack is accepted whole.
        assert_eq!(
            check_sacrifice(&mut arena, &mut map, &reg, altar, short, false),
            Some(2)
        );
        // On its own the 5-stack just pays the asking count.
        assert_eq!(
            check_sacrifice(&mut arena, &mut map, &reg, altar, enough, false),
            Some(3)
        );
    }

    #[test]
    fn test_unpaid_offering_refused() {
        let (mut arena, mut map, reg) = world();
        let pos = IVec2::new(0, 0);
        let altar = drop_at(&mut arena, &mut map, altar_wanting("rose", 1), pos);
        let mut stolen = Entity::named("rose");
        stolen.flags.unpaid = true;
        let stolen = drop_at(&mut arena, &mut map, stolen, pos);

        assert_eq!(
            check_sacrifice(&mut arena, &mut map, &reg, altar, stolen, false),
            None
        );
    }

    #[test]
    fn test_operate_altar_consumes_and_reports() {
        let (mut arena, mut map, reg) = world();
        let pos = IVec2::new(2, 2);
        let mut body = altar_wanting("money", 50);
        body.msg = Some("the altar hums\n".into());
        let altar = drop_at(&mut arena, &mut map, body, pos);
        let purse = drop_at(&mut arena, &mut map, coins(10, 10), pos);

        let mut events = Vec::new();
        assert!(operate_altar(
            &mut arena, &mut map, &reg, altar, purse, &mut events
        ));
        assert_eq!(arena.get(purse).unwrap().nrof, 5);
        assert_eq!(
            events,
            vec![TriggerEvent::AltarMessage {
                altar,
                text: "the altar hums\n".into(),
            }]
        );

        // A spent altar refuses further offerings.
        arena.get_mut(altar).unwrap().state = 1;
        assert!(!operate_altar(
            &mut arena, &mut map, &reg, altar, purse, &mut events
        ));
        assert_eq!(arena.get(purse).unwrap().nrof, 5);
    }
}
