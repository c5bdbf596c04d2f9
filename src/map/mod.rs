//! Map grid: per-tile entity stacks and the map's connection table

pub mod connections;

pub use connections::{ConnectionLink, ConnectionTable};

use glam::IVec2;

use crate::core::types::ChannelId;
use crate::entity::{EntityArena, EntityId};

/// One map: a tile grid of entity stacks plus the signaling table.
///
/// Stacks are kept bottom-to-top in insertion order; trigger evaluation
/// looks at what rests *above* a mechanism in its tile.
pub struct Map {
    pub name: String,
    width: i32,
    height: i32,
    cells: Vec<Vec<EntityId>>,
    pub connections: ConnectionTable,
}

impl Map {
    pub fn new(name: &str, width: i32, height: i32) -> Map {
        Map {
            name: name.to_string(),
            width,
            height,
            cells: vec![Vec::new(); (width * height) as usize],
            connections: ConnectionTable::new(),
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, pos: IVec2) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    #[inline]
    fn cell_index(&self, pos: IVec2) -> usize {
        (pos.y * self.width + pos.x) as usize
    }

    /// Bottom-to-top stack at a tile
    pub fn stack_at(&self, pos: IVec2) -> &[EntityId] {
        if self.in_bounds(pos) {
            &self.cells[self.cell_index(pos)]
        } else {
            &[]
        }
    }

    /// Place a single entity (or chain part) on a tile, on top of the stack
    pub fn insert_at(&mut self, arena: &mut EntityArena, id: EntityId, pos: IVec2) -> bool {
        if !self.in_bounds(pos) {
            tracing::warn!("insert_at out of bounds at {:?} on {}", pos, self.name);
            return false;
        }
        let Some(e) = arena.get_mut(id) else {
            tracing::warn!("insert_at with stale entity {}", id);
            return false;
        };
        e.pos = pos;
        let idx = self.cell_index(pos);
        self.cells[idx].push(id);
        true
    }

    /// Place a multi-part entity: the head goes at `origin`, every part at
    /// origin plus its chain offset.
    pub fn place(&mut self, arena: &mut EntityArena, head: EntityId, origin: IVec2) -> bool {
        let mut at = Some(head);
        while let Some(id) = at {
            let Some(e) = arena.get(id) else {
                tracing::warn!("place walked into stale part {} on {}", id, self.name);
                return false;
            };
            let offset = e.pos;
            at = e.more;
            // Part offsets were set relative to the head at instantiation.
            let pos = if id == head { origin } else { origin + offset };
            if !self.insert_at(arena, id, pos) {
                return false;
            }
        }
        true
    }

    /// Take an entity off its tile (single part; chains go through
    /// [`remove_entity`]).
    pub fn remove(&mut self, arena: &EntityArena, id: EntityId) {
        let Some(e) = arena.get(id) else { return };
        let pos = e.pos;
        if !self.in_bounds(pos) {
            return;
        }
        let idx = self.cell_index(pos);
        self.cells[idx].retain(|&other| other != id);
    }

    /// Ids stacked above `id` in its tile, bottom-to-top
    pub fn stack_above(&self, arena: &EntityArena, id: EntityId) -> Vec<EntityId> {
        let Some(e) = arena.get(id) else {
            return Vec::new();
        };
        let stack = self.stack_at(e.pos);
        match stack.iter().position(|&other| other == id) {
            Some(i) => stack[i + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// Wire an entity into this map's signaling network
    pub fn link(&mut self, arena: &mut EntityArena, id: EntityId, channel: ChannelId) {
        let Some(e) = arena.get_mut(id) else {
            tracing::error!("tried to link stale entity {}", id);
            return;
        };
        e.flags.is_linked = true;
        self.connections.link(id, channel);
    }

    /// Remove an entity from the signaling network
    pub fn unlink(&mut self, arena: &mut EntityArena, id: EntityId) {
        if !self.connections.unlink(id) {
            tracing::error!("unlink: couldn't find entity {} in {}", id, self.name);
        }
        if let Some(e) = arena.get_mut(id) {
            e.flags.is_linked = false;
        }
    }
}

/// Destroy an entity and its whole part chain: off the map, out of the
/// signaling network, out of the arena.
pub fn remove_entity(map: &mut Map, arena: &mut EntityArena, id: EntityId) {
    // Walk from the head so non-head segments take the chain with them.
    let head = arena
        .get(id)
        .and_then(|e| e.head)
        .unwrap_or(id);

    let mut at = Some(head);
    while let Some(part) = at {
        at = arena.get(part).and_then(|e| e.more);
        map.remove(arena, part);
        if arena.get(part).map_or(false, |e| e.flags.is_linked) {
            map.unlink(arena, part);
        }
        arena.destroy(part);
    }
}

/// Shrink a stack by `count` units, destroying the entity when the stack is
/// exhausted. Returns the surviving id, if any.
pub fn decrease_nrof(
    map: &mut Map,
    arena: &mut EntityArena,
    id: EntityId,
    count: u32,
) -> Option<EntityId> {
    let have = arena.get(id)?.stack_count();
    if count >= have {
        remove_entity(map, arena, id);
        None
    } else {
        arena.get_mut(id)?.nrof = have - count;
        Some(id)
    }
}
