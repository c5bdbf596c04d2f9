//! Generational entity arena
//!
//! Every map-level entity lives in one of these. An [`EntityId`] carries the
//! slot's generation at the time the entity was created, so a connection link
//! (or any other retained id) formed before the entity was destroyed resolves
//! to `None` afterwards, even once the slot has been recycled. That `None` is
//! the staleness check the trigger engine relies on.

use serde::{Deserialize, Serialize};

use super::Entity;

/// Generation-checked handle to an arena slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId {
    slot: u32,
    generation: u32,
}

impl EntityId {
    /// Slot index, stable across the entity's lifetime
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// Identity tag captured when the entity was created
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}v{}", self.slot, self.generation)
    }
}

struct Slot {
    generation: u32,
    entity: Option<Entity>,
}

/// Slot-recycling arena of live entities
#[derive(Default)]
pub struct EntityArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl EntityArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: Entity) -> EntityId {
        self.live += 1;
        if let Some(slot) = self.free.pop() {
            let s = &mut self.slots[slot as usize];
            s.entity = Some(entity);
            EntityId {
                slot,
                generation: s.generation,
            }
        } else {
            let slot = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                entity: Some(entity),
            });
            EntityId {
                slot,
                generation: 0,
            }
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        let s = self.slots.get(id.slot as usize)?;
        if s.generation != id.generation {
            return None;
        }
        s.entity.as_ref()
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let s = self.slots.get_mut(id.slot as usize)?;
        if s.generation != id.generation {
            return None;
        }
        s.entity.as_mut()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.get(id).is_some()
    }

    /// Destroy the entity, recycling its slot under a new generation.
    ///
    /// Outstanding ids for the old generation stop resolving immediately.
    pub fn destroy(&mut self, id: EntityId) -> Option<Entity> {
        let s = self.slots.get_mut(id.slot as usize)?;
        if s.generation != id.generation || s.entity.is_none() {
            return None;
        }
        let entity = s.entity.take();
        s.generation = s.generation.wrapping_add(1);
        self.free.push(id.slot);
        self.live -= 1;
        entity
    }

    pub fn live_count(&self) -> usize {
        self.live
    }

    /// Iterate live entities in fixed slot order (the tick visitation order)
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.entity.as_ref().map(|e| {
                (
                    EntityId {
                        slot: i as u32,
                        generation: s.generation,
                    },
                    e,
                )
            })
        })
    }

    /// Snapshot of live ids, for walks that mutate the arena mid-iteration
    pub fn live_ids(&self) -> Vec<EntityId> {
        self.iter().map(|(id, _)| id).collect()
    }
}
