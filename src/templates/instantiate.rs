//! Deep instantiation of templates into live entities

use rand::Rng;

use crate::core::types::TemplateId;
use crate::entity::{Entity, EntityArena, EntityId};

use super::store::TemplateRegistry;

/// Face carried by placeholder entities for unresolvable templates
pub const SINGULARITY_FACE: &str = "singularity.111";

/// Placeholder entity for a template that could not be found.
///
/// Named exactly what was requested, so downstream code can always read an
/// entity's name instead of null-checking an instantiation result; the
/// placeholder face is what gives it away on a map.
pub fn singularity(name: &str) -> Entity {
    let mut e = Entity::named(name);
    e.name_pl = Some(name.to_string());
    e.face = SINGULARITY_FACE.to_string();
    e.flags.no_pick = true;
    e
}

impl TemplateRegistry {
    /// Deep-copy a prototype's default state into a fresh live entity.
    ///
    /// The nested inventory is instantiated item by item and re-parented so
    /// the copy shares nothing with the prototype.
    pub fn instantiate(&self, id: TemplateId) -> Entity {
        let template = self.get(id);
        let mut e = clone_body(&template.body);
        e.template = Some(id);
        e
    }

    /// Instantiate every part of a multi-part template into the arena.
    ///
    /// Live parts keep the prototype chain's relative offsets and head/more
    /// linkage; the returned id is the chain head.
    pub fn instantiate_full(&self, id: TemplateId, arena: &mut EntityArena) -> EntityId {
        let mut head: Option<EntityId> = None;
        let mut prev: Option<EntityId> = None;
        let mut at = Some(id);

        while let Some(tid) = at {
            let template = self.get(tid);
            let mut e = self.instantiate(tid);
            e.pos = template.body.pos;
            e.head = head;
            let live = arena.insert(e);
            match prev {
                None => head = Some(live),
                Some(p) => {
                    if let Some(prev_e) = arena.get_mut(p) {
                        prev_e.more = Some(live);
                    }
                }
            }
            prev = Some(live);
            at = template.more;
        }

        head.expect("template chain has at least its head")
    }

    /// Instantiate by template name; never fails.
    ///
    /// An unknown name yields a [`singularity`] placeholder instead of an
    /// absent value.
    pub fn instantiate_by_name(&self, name: &str) -> Entity {
        match self.find(name) {
            Some(id) => self.instantiate(id),
            None => singularity(name),
        }
    }

    /// Instantiate by in-game display name, shortening the name until a
    /// template matches. Falls back to a singularity like
    /// [`instantiate_by_name`](Self::instantiate_by_name).
    pub fn instantiate_by_object_name(&self, name: &str) -> Entity {
        let mut prefix = name;
        while !prefix.is_empty() {
            if let Some(id) = self.find_by_object_name(prefix) {
                return self.instantiate(id);
            }
            let mut cut = prefix.len() - 1;
            while !prefix.is_char_boundary(cut) {
                cut -= 1;
            }
            prefix = &prefix[..cut];
        }
        singularity(name)
    }
}

/// Copy a default state, recursing through its inventory.
fn clone_body(body: &Entity) -> Entity {
    let mut e = body.clone();
    e.inv = body.inv.iter().map(clone_body).collect();

    // Movers share a template speed; desynchronize their phase so a room of
    // identical mechanisms doesn't act in lockstep.
    if e.speed < 0.0 {
        e.speed_left -= rand::thread_rng().gen_range(0.0..2.0);
    }
    e
}
