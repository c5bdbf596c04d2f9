//! Simulation shell: the world and its tick loop
//!
//! Single threaded. Each tick walks live entities in fixed slot order;
//! entities with a processing speed accumulate `speed_left` and act when it
//! overflows a whole step.

use ahash::AHashMap;
use glam::IVec2;

use crate::core::config::GATE_FRAMES;
use crate::core::types::{ChannelId, EntityKind, MapId, Tick};
use crate::entity::{Entity, EntityArena, EntityId};
use crate::map::{remove_entity, Map};
use crate::templates::{singularity, TemplateRegistry};
use crate::triggers::{self, TriggerError, TriggerEvent};

/// Top-level simulation state
pub struct World {
    pub current_tick: Tick,
    pub templates: TemplateRegistry,
    pub arena: EntityArena,
    maps: AHashMap<MapId, Map>,
    next_map: u32,
}

impl World {
    pub fn new(templates: TemplateRegistry) -> World {
        World {
            current_tick: 0,
            templates,
            arena: EntityArena::new(),
            maps: AHashMap::new(),
            next_map: 0,
        }
    }

    pub fn add_map(&mut self, map: Map) -> MapId {
        let id = MapId(self.next_map);
        self.next_map += 1;
        tracing::info!("map {:?} registered: {}", id, map.name);
        self.maps.insert(id, map);
        id
    }

    pub fn map(&self, id: MapId) -> Option<&Map> {
        self.maps.get(&id)
    }

    pub fn map_mut(&mut self, id: MapId) -> Option<&mut Map> {
        self.maps.get_mut(&id)
    }

    /// Instantiate a template by name and place it (all parts) on a map.
    ///
    /// Unknown names spawn a singularity placeholder, so the failure is
    /// visible in the world instead of silent.
    pub fn spawn(&mut self, map_id: MapId, name: &str, pos: IVec2) -> Option<EntityId> {
        let id = match self.templates.find(name) {
            Some(tid) => self.templates.instantiate_full(tid, &mut self.arena),
            None => self.arena.insert(singularity(name)),
        };
        let map = self.maps.get_mut(&map_id)?;
        if map.place(&mut self.arena, id, pos) {
            Some(id)
        } else {
            remove_entity(map, &mut self.arena, id);
            None
        }
    }

    /// Destroy an entity (whole part chain) everywhere it is registered
    pub fn destroy(&mut self, map_id: MapId, id: EntityId) {
        if let Some(map) = self.maps.get_mut(&map_id) {
            remove_entity(map, &mut self.arena, id);
        }
    }

    /// Place an already-built entity on a map tile
    pub fn insert_at(&mut self, map_id: MapId, id: EntityId, pos: IVec2) -> bool {
        match self.maps.get_mut(&map_id) {
            Some(map) => map.insert_at(&mut self.arena, id, pos),
            None => false,
        }
    }

    /// Wire an entity into a map's signaling network
    pub fn link(&mut self, map_id: MapId, id: EntityId, channel: ChannelId) {
        if let Some(map) = self.maps.get_mut(&map_id) {
            map.link(&mut self.arena, id, channel);
        }
    }

    /// Trigger a channel on a map
    pub fn propagate(
        &mut self,
        map_id: MapId,
        channel: ChannelId,
        cause: Option<EntityId>,
        state: bool,
    ) -> Result<Vec<TriggerEvent>, TriggerError> {
        match self.maps.get(&map_id) {
            Some(map) => {
                triggers::propagate(&mut self.arena, map, &self.templates, channel, cause, state)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Re-evaluate a plate or pedestal, pushing any state change through its
    /// channel
    pub fn update_plate(
        &mut self,
        map_id: MapId,
        plate: EntityId,
    ) -> Result<Vec<TriggerEvent>, TriggerError> {
        match self.maps.get(&map_id) {
            Some(map) => triggers::update_plate(&mut self.arena, map, &self.templates, plate),
            None => Ok(Vec::new()),
        }
    }

    /// Toggle a lever-driven mechanism
    pub fn use_handle(
        &mut self,
        map_id: MapId,
        id: EntityId,
    ) -> Result<Vec<TriggerEvent>, TriggerError> {
        match self.maps.get(&map_id) {
            Some(map) => triggers::use_handle(&mut self.arena, map, &self.templates, id),
            None => Ok(Vec::new()),
        }
    }

    /// Offer `candidate` to an altar
    pub fn operate_altar(
        &mut self,
        map_id: MapId,
        altar: EntityId,
        candidate: EntityId,
        events: &mut Vec<TriggerEvent>,
    ) -> bool {
        match self.maps.get_mut(&map_id) {
            Some(map) => triggers::operate_altar(
                &mut self.arena,
                map,
                &self.templates,
                altar,
                candidate,
                events,
            ),
            None => false,
        }
    }

    /// Run an inventory checker against a player standing on it
    pub fn check_inventory(
        &mut self,
        map_id: MapId,
        walker: EntityId,
        checker: EntityId,
    ) -> Result<Vec<TriggerEvent>, TriggerError> {
        match self.maps.get(&map_id) {
            Some(map) => {
                triggers::check_inventory(&mut self.arena, map, &self.templates, walker, checker)
            }
            None => Ok(Vec::new()),
        }
    }

    /// Run a sprung trigger's contact reaction
    pub fn check_trigger(
        &mut self,
        map_id: MapId,
        id: EntityId,
        cause: Option<EntityId>,
    ) -> Result<Vec<TriggerEvent>, TriggerError> {
        match self.maps.get_mut(&map_id) {
            Some(map) => triggers::check_trigger(&mut self.arena, map, &self.templates, id, cause),
            None => Ok(Vec::new()),
        }
    }

    /// Advance the world one tick.
    ///
    /// Sprung triggers whose release timer ran down toggle their channels
    /// here; any side effects that produces are returned.
    pub fn tick(&mut self) -> Vec<TriggerEvent> {
        self.current_tick += 1;
        let mut due = Vec::new();
        for id in self.arena.live_ids() {
            let Some(e) = self.arena.get_mut(id) else {
                continue;
            };
            if e.speed == 0.0 {
                continue;
            }
            e.speed_left += e.speed.abs();
            while e.speed_left >= 1.0 {
                e.speed_left -= 1.0;
                if triggers::sprung::is_sprung(e.kind) {
                    // Release needs the map; handled after the walk.
                    due.push(id);
                    break;
                }
                process_entity(e);
                if e.speed == 0.0 {
                    break;
                }
            }
        }

        let mut events = Vec::new();
        for id in due {
            self.release_sprung(id, &mut events);
        }
        events
    }

    fn release_sprung(&mut self, id: EntityId, events: &mut Vec<TriggerEvent>) {
        let map = self
            .maps
            .values()
            .find(|m| m.connections.channel_of(id).is_some());
        match map {
            Some(map) => {
                match triggers::release_trigger(&mut self.arena, map, &self.templates, id) {
                    Ok(mut evs) => events.append(&mut evs),
                    Err(err) => tracing::error!("sprung trigger release failed: {}", err),
                }
            }
            // Unwired: the spring still swings back.
            None => {
                if let Some(e) = self.arena.get_mut(id) {
                    triggers::sprung::spring_back(e);
                }
            }
        }
    }
}

fn process_entity(e: &mut Entity) {
    match e.kind {
        EntityKind::Gate | EntityKind::Pit => step_gate(e),
        EntityKind::TimedGate => step_timed_gate(e),
        _ => {}
    }
}

/// Step a gate's transition one frame; the transition ends by dropping the
/// processing speed back to zero.
fn step_gate(e: &mut Entity) {
    let open = GATE_FRAMES - 1;
    if e.state != 0 {
        if e.anim_frame < open {
            e.anim_frame += 1;
        }
        if e.anim_frame >= open {
            e.speed = 0.0;
            e.speed_left = 0.0;
        }
    } else {
        if e.anim_frame > 0 {
            e.anim_frame -= 1;
        }
        if e.anim_frame == 0 {
            e.speed = 0.0;
            e.speed_left = 0.0;
        }
    }
}

/// A timed gate opens, holds for `hp` steps, then closes on its own.
fn step_timed_gate(e: &mut Entity) {
    let open = GATE_FRAMES - 1;
    if e.state != 0 {
        if e.anim_frame < open {
            e.anim_frame += 1;
            return;
        }
        if e.stats.hp > 0 {
            e.stats.hp -= 1;
            return;
        }
        // Timer ran out: release and start closing.
        e.state = 0;
        e.stats.sp = 0;
    } else if e.anim_frame > 0 {
        e.anim_frame -= 1;
    } else {
        e.speed = 0.0;
        e.speed_left = 0.0;
    }
}
