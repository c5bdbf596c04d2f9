//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Game tick counter (simulation time unit)
pub type Tick = u64;

/// Numeric signaling channel.
///
/// Mechanisms placed independently on a map (plates, levers, gates, altars)
/// are associated through a channel number instead of direct references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelId(pub u32);

/// Index of a template in the catalogue (stable for the registry's lifetime)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub u32);

/// Identifier for a loaded map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapId(pub u32);

/// Bitset of traversal capabilities.
///
/// An unset value means "no declared movement" and is treated by trigger
/// evaluation as matching everything (swords dropped on a plate still count).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MoveType(pub u8);

impl MoveType {
    pub const NONE: MoveType = MoveType(0);
    pub const WALK: MoveType = MoveType(1);
    pub const FLY_LOW: MoveType = MoveType(2);
    pub const FLY_HIGH: MoveType = MoveType(4);
    pub const SWIM: MoveType = MoveType(8);
    pub const BOAT: MoveType = MoveType(16);

    #[inline]
    pub fn intersects(self, other: MoveType) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Parse a comma-separated capability list (`walk,fly_low`)
    pub fn parse(s: &str) -> Option<MoveType> {
        let mut bits = 0u8;
        for part in s.split(',') {
            bits |= match part.trim() {
                "walk" => Self::WALK.0,
                "fly_low" => Self::FLY_LOW.0,
                "fly_high" => Self::FLY_HIGH.0,
                "swim" => Self::SWIM.0,
                "boat" => Self::BOAT.0,
                "none" | "" => 0,
                _ => return None,
            };
        }
        Some(MoveType(bits))
    }
}

impl std::ops::BitOr for MoveType {
    type Output = MoveType;
    fn bitor(self, rhs: MoveType) -> MoveType {
        MoveType(self.0 | rhs.0)
    }
}

/// Behavior-driving entity kind.
///
/// This is a closed, hand-enumerated set: the trigger propagation engine
/// dispatches on it directly, and kinds it does not recognize fall through
/// to a generic hook rather than being rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Inert object with no mechanism behavior
    Item,
    /// Weight-triggered pressure plate
    Plate,
    /// Race/key/player-triggered pedestal
    Pedestal,
    /// Blocking gate, opens and closes gradually
    Gate,
    /// Floor pit, the inverted sibling of a gate
    Pit,
    /// Lever or switch
    Handle,
    /// Sprung lever: fires on application, releases itself on a timer
    Trigger,
    /// Sprung pressure plate
    TriggerButton,
    /// Sprung pedestal
    TriggerPedestal,
    /// Altar that re-arms after each sacrifice instead of latching
    TriggerAltar,
    /// Inscribed sign
    Sign,
    /// Sacrificial altar
    Altar,
    /// Gate that re-arms on a timer, part chains retimed together
    TimedGate,
    /// Rotating projectile redirector
    Director,
    /// Linear hazard emitter
    Firewall,
    /// Floor square that inspects a walker's inventory
    InventoryChecker,
    /// Key item matched by pedestals and checkers
    SpecialKey,
    Money,
    Spell,
    Player,
}

impl EntityKind {
    /// Parse the symbolic kind keyword used by the template corpus
    pub fn from_keyword(s: &str) -> Option<EntityKind> {
        Some(match s {
            "item" => EntityKind::Item,
            "plate" => EntityKind::Plate,
            "pedestal" => EntityKind::Pedestal,
            "gate" => EntityKind::Gate,
            "pit" => EntityKind::Pit,
            "handle" => EntityKind::Handle,
            "trigger" => EntityKind::Trigger,
            "trigger_button" => EntityKind::TriggerButton,
            "trigger_pedestal" => EntityKind::TriggerPedestal,
            "trigger_altar" => EntityKind::TriggerAltar,
            "sign" => EntityKind::Sign,
            "altar" => EntityKind::Altar,
            "timed_gate" => EntityKind::TimedGate,
            "director" => EntityKind::Director,
            "firewall" => EntityKind::Firewall,
            "inv_checker" => EntityKind::InventoryChecker,
            "special_key" => EntityKind::SpecialKey,
            "money" => EntityKind::Money,
            "spell" => EntityKind::Spell,
            "player" => EntityKind::Player,
            _ => return None,
        })
    }
}

impl Default for EntityKind {
    fn default() -> Self {
        EntityKind::Item
    }
}

/// Spell subkind: summons a creature as its product
pub const SUBKIND_SUMMON: u8 = 1;
