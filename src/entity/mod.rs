//! Live entity model
//!
//! An `Entity` is a mutable instance created from a template. Entities that
//! sit on a map are owned by the [`arena`](crate::entity::arena) and addressed
//! by generational id; entities held inside another entity's inventory are
//! owned by value by their container.

pub mod arena;

pub use arena::{EntityArena, EntityId};

use glam::IVec2;

use crate::core::types::{EntityKind, MoveType, TemplateId};

/// Numeric attributes shared by mechanisms and creatures.
///
/// Mechanism kinds overload several of these the way the content corpus
/// expects: `food` is a sign's usage limit, `sp`/`maxsp` drive director
/// facings and gate inversion, `hp`/`maxhp` time a timed gate's open phase,
/// `exp` stretches a sprung trigger's release delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub hp: i32,
    pub maxhp: i32,
    pub sp: i32,
    pub maxsp: i32,
    pub food: i32,
    pub exp: i32,
    pub last_sp: i32,
    pub last_heal: i32,
    pub last_eat: i32,
}

/// Boolean entity properties
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flags {
    pub alive: bool,
    pub unpaid: bool,
    pub no_pick: bool,
    /// Set while the entity is filed in a map's connection table
    pub is_linked: bool,
    pub monster: bool,
    pub generator: bool,
    /// Generator produces from its inventory instead of a product reference
    pub content_on_gen: bool,
    pub activate_on_push: bool,
    pub activate_on_release: bool,
    pub animated: bool,
}

impl Default for Flags {
    fn default() -> Self {
        // Mechanisms react to both edges unless the corpus narrows them.
        Flags {
            alive: false,
            unpaid: false,
            no_pick: false,
            is_linked: false,
            monster: false,
            generator: false,
            content_on_gen: false,
            activate_on_push: true,
            activate_on_release: true,
            animated: false,
        }
    }
}

/// A mutable live instance (or a template's embedded default state)
#[derive(Debug, Clone, Default)]
pub struct Entity {
    pub name: String,
    pub name_pl: Option<String>,
    pub title: Option<String>,
    pub race: Option<String>,
    /// Criterion string: what a pedestal/altar/checker of this template
    /// matches, or what key class this item belongs to
    pub matches: Option<String>,
    pub skill: Option<String>,
    pub msg: Option<String>,
    pub kind: EntityKind,
    pub subkind: u8,
    /// Visual face name; multi-part footprint accounting compares faces
    pub face: String,
    pub pos: IVec2,
    /// Unit weight
    pub weight: i64,
    /// Total weight of carried inventory
    pub carrying: i64,
    /// Stack count; zero is treated as one
    pub nrof: u32,
    /// Unit worth, for currency sacrifices
    pub worth: i64,
    /// Binary mechanism state (gate open, plate depressed, altar lit)
    pub state: i32,
    pub anim_frame: u32,
    pub speed: f32,
    pub speed_left: f32,
    pub move_type: MoveType,
    /// Which movement capabilities trigger this entity when stacked on it
    pub move_on: MoveType,
    pub stats: Stats,
    pub flags: Flags,
    /// Kind an inventory checker looks for (checkers only)
    pub match_kind: Option<EntityKind>,
    /// Product reference resolved in the loader's second pass
    pub turns_into: Option<TemplateId>,
    /// Loot-table assignment resolved in the loader's second pass
    pub loot: Option<String>,
    pub template: Option<TemplateId>,
    /// Head of this entity's part chain (unset on heads)
    pub head: Option<EntityId>,
    /// Next part of this entity's chain
    pub more: Option<EntityId>,
    /// Nested inventory, owned by value
    pub inv: Vec<Entity>,
}

impl Entity {
    pub fn named(name: &str) -> Entity {
        Entity {
            name: name.to_string(),
            ..Entity::default()
        }
    }

    /// Stack count with the zero-means-one convention
    #[inline]
    pub fn stack_count(&self) -> u32 {
        self.nrof.max(1)
    }

    /// Weight contributed to whatever this entity rests on
    #[inline]
    pub fn stacked_weight(&self) -> i64 {
        self.weight * self.stack_count() as i64 + self.carrying
    }

    /// Total currency value of the stack
    #[inline]
    pub fn stack_worth(&self) -> i64 {
        self.worth * self.stack_count() as i64
    }

    /// Display name with title ("ring of fire"), used for sacrifice matching
    pub fn base_name(&self) -> String {
        match &self.title {
            Some(title) => format!("{} {}", self.name, title),
            None => self.name.clone(),
        }
    }
}
