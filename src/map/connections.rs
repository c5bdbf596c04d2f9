//! Per-map connection table
//!
//! Channel number -> list of linked entities. Links hold generational ids;
//! a destroyed-and-recycled entity simply stops resolving, so the table is
//! never eagerly swept on entity death.

use ahash::AHashMap;

use crate::core::types::ChannelId;
use crate::entity::{EntityArena, EntityId};

/// One entry in a channel's link list.
///
/// The generational id doubles as the identity tag captured at link time:
/// if the arena no longer resolves it, the link is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLink {
    pub entity: EntityId,
}

/// Channel-keyed link lists, owned by the map
#[derive(Debug, Default)]
pub struct ConnectionTable {
    channels: AHashMap<ChannelId, Vec<ConnectionLink>>,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// File an entity under a channel. Newest links go to the front, the
    /// order map editors historically expect.
    pub fn link(&mut self, entity: EntityId, channel: ChannelId) {
        self.channels
            .entry(channel)
            .or_default()
            .insert(0, ConnectionLink { entity });
    }

    /// Remove an entity's link. Returns false when no link was found.
    pub fn unlink(&mut self, entity: EntityId) -> bool {
        for links in self.channels.values_mut() {
            if let Some(i) = links.iter().position(|l| l.entity == entity) {
                links.remove(i);
                return true;
            }
        }
        false
    }

    /// Iterate a channel's links
    pub fn links_for(&self, channel: ChannelId) -> impl Iterator<Item = &ConnectionLink> {
        self.channels.get(&channel).into_iter().flatten()
    }

    /// Snapshot a channel's linked ids.
    ///
    /// Propagation dispatches against a snapshot so reactions that mutate
    /// the same entry mid-cascade can't invalidate the walk.
    pub fn snapshot(&self, channel: ChannelId) -> Vec<EntityId> {
        self.links_for(channel).map(|l| l.entity).collect()
    }

    /// The channel an entity is filed under, if any
    pub fn channel_of(&self, entity: EntityId) -> Option<ChannelId> {
        self.channels.iter().find_map(|(channel, links)| {
            links.iter().any(|l| l.entity == entity).then_some(*channel)
        })
    }

    /// Channels with at least one link
    pub fn channels(&self) -> impl Iterator<Item = ChannelId> + '_ {
        self.channels.keys().copied()
    }

    /// Diagnostic-only link consistency sweep: logs every link whose entity
    /// no longer resolves and returns how many there were. Mutates nothing.
    pub fn verify_consistency(&self, arena: &EntityArena) -> usize {
        let mut stale = 0;
        for (channel, links) in &self.channels {
            for link in links {
                if !arena.contains(link.entity) {
                    tracing::error!(
                        "verify_consistency: link {} on channel {:?} is stale",
                        link.entity,
                        channel
                    );
                    stale += 1;
                }
            }
        }
        stale
    }
}
