//! Inventory checkers
//!
//! A checker fires its own channel when a player walking over it does (or
//! does not) carry a matching item. Matching criteria are conjunctive:
//! every criterion the checker sets must hold.

use crate::core::types::EntityKind;
use crate::entity::{Entity, EntityArena, EntityId};
use crate::map::Map;
use crate::templates::TemplateRegistry;

use super::propagate::{use_handle, TriggerError, TriggerEvent};

/// Find the first item in `owner`'s inventory (containers included, any
/// depth) satisfying the checker's criteria.
pub fn find_in_inventory<'a>(
    templates: &TemplateRegistry,
    owner: &'a Entity,
    checker: &Entity,
) -> Option<&'a Entity> {
    if meets_criteria(templates, owner, checker) {
        return Some(owner);
    }
    for item in &owner.inv {
        if !item.inv.is_empty() {
            if let Some(found) = find_in_inventory(templates, item, checker) {
                return Some(found);
            }
        } else if meets_criteria(templates, item, checker) {
            return Some(item);
        }
    }
    None
}

fn meets_criteria(templates: &TemplateRegistry, item: &Entity, checker: &Entity) -> bool {
    if let Some(kind) = checker.match_kind {
        if item.kind != kind {
            return false;
        }
    }
    if let Some(phrase) = checker.matches.as_deref() {
        if item.matches.as_deref() != Some(phrase) {
            return false;
        }
    }
    // The checker's race criterion names a *template*, not a race.
    if let Some(wanted) = checker.race.as_deref() {
        let tname = item.template.map(|tid| templates.get(tid).name.as_str());
        if tname != Some(wanted) {
            return false;
        }
    }
    if let Some(title) = checker.title.as_deref() {
        if item.title.as_deref() != Some(title) {
            return false;
        }
    }
    // A checker with no criteria at all matches nothing.
    checker.match_kind.is_some()
        || checker.matches.is_some()
        || checker.race.is_some()
        || checker.title.is_some()
}

/// Remove one unit of the first matching item, adjusting container loads on
/// the way out. Returns the weight removed.
fn consume_one_matching(
    templates: &TemplateRegistry,
    owner: &mut Entity,
    checker: &Entity,
) -> Option<i64> {
    for i in 0..owner.inv.len() {
        if !owner.inv[i].inv.is_empty() {
            if let Some(w) = consume_one_matching(templates, &mut owner.inv[i], checker) {
                owner.inv[i].carrying -= w;
                return Some(w);
            }
            continue;
        }
        if !meets_criteria(templates, &owner.inv[i], checker) {
            continue;
        }
        let item = &mut owner.inv[i];
        let w = item.weight;
        if item.stack_count() > 1 {
            item.nrof = item.stack_count() - 1;
        } else {
            owner.inv.remove(i);
        }
        return Some(w);
    }
    None
}

/// Run a checker against a player stepping on it.
///
/// `last_sp` selects the firing sense (fire on presence vs. absence);
/// `last_heal` makes a matched item get consumed. Non-players never trip a
/// checker.
pub fn check_inventory(
    arena: &mut EntityArena,
    map: &Map,
    templates: &TemplateRegistry,
    walker: EntityId,
    checker: EntityId,
) -> Result<Vec<TriggerEvent>, TriggerError> {
    let (fire_on_match, consume) = {
        let Some(c) = arena.get(checker) else {
            return Ok(Vec::new());
        };
        (c.stats.last_sp != 0, c.stats.last_heal != 0)
    };

    let matched = {
        let Some(w) = arena.get(walker) else {
            return Ok(Vec::new());
        };
        if w.kind != EntityKind::Player {
            return Ok(Vec::new());
        }
        let Some(c) = arena.get(checker) else {
            return Ok(Vec::new());
        };
        find_in_inventory(templates, w, c).is_some()
    };

    if matched && fire_on_match {
        if consume {
            let checker_copy = arena.get(checker).cloned();
            if let (Some(c), Some(w)) = (checker_copy, arena.get_mut(walker)) {
                if let Some(weight) = consume_one_matching(templates, w, &c) {
                    w.carrying -= weight;
                }
            }
        }
        use_handle(arena, map, templates, checker)
    } else if !matched && !fire_on_match {
        use_handle(arena, map, templates, checker)
    } else {
        Ok(Vec::new())
    }
}
