//! Template store: catalogue plus open-addressing name table
//!
//! Lookup goes through a fixed-size, linear-probing hash table keyed on the
//! template name. The table never grows: the loader sizes it ahead of the
//! corpus, and wrapping all the way around without finding a free slot is a
//! fatal configuration error, not a resize.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use thiserror::Error;

use crate::core::config::{HASH_PREFIX_LEN, TEMPLATE_TABLE_SIZE};
use crate::core::types::{EntityKind, TemplateId};
use crate::entity::Entity;

use glam::IVec2;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The probe table wrapped fully while inserting: the table was sized
    /// too small for the loaded corpus.
    #[error("template table full ({size} slots) while inserting '{name}'")]
    TableFull { name: String, size: usize },

    #[error("duplicate template name '{0}'")]
    DuplicateName(String),
}

/// Immutable-after-load prototype record
#[derive(Debug, Clone)]
pub struct Template {
    /// Unique name, the hash key
    pub name: String,
    /// Embedded default-state entity, deep-copied on instantiation
    pub body: Entity,
    /// Next part of a multi-part body
    pub more: Option<TemplateId>,
    /// Chain head, set on every non-first part
    pub head: Option<TemplateId>,
    /// Extent of the multi-tile footprint relative to the head
    pub tail: IVec2,
}

impl Template {
    pub fn new(name: &str, body: Entity) -> Template {
        Template {
            name: name.to_string(),
            body,
            more: None,
            head: None,
            tail: IVec2::ZERO,
        }
    }
}

/// Diagnostic counters retained across lookups
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct LookupStats {
    /// Probe sequences started
    pub searches: u64,
    /// Name comparisons performed while probing
    pub comparisons: u64,
}

/// Owns the template catalogue and its name table.
///
/// Explicitly constructed and owned by the simulation context; a hot reload
/// is a fresh registry built from the corpus, never an in-place patch.
pub struct TemplateRegistry {
    catalogue: Vec<Template>,
    table: Vec<Option<TemplateId>>,
    searches: AtomicU64,
    comparisons: AtomicU64,
}

/// One-at-a-time hash over a bounded prefix of the name.
///
/// Names longer than the prefix still compare fully during probing; bounding
/// only the hash keeps hashing cost flat for the handful of very long names.
fn hash_name(name: &str, table_size: usize) -> usize {
    let mut hash: u32 = 0;
    for &b in name.as_bytes().iter().take(HASH_PREFIX_LEN) {
        hash = hash.wrapping_add(b as u32);
        hash = hash.wrapping_add(hash << 10);
        hash ^= hash >> 6;
    }
    hash = hash.wrapping_add(hash << 3);
    hash ^= hash >> 11;
    hash = hash.wrapping_add(hash << 15);
    hash as usize % table_size
}

impl TemplateRegistry {
    pub fn new() -> Self {
        Self::with_table_size(TEMPLATE_TABLE_SIZE)
    }

    /// A zero-slot table would turn every hash into a modulo by zero; the
    /// failure mode for an undersized table is `TableFull`, so the size is
    /// floored at one slot instead.
    pub fn with_table_size(size: usize) -> Self {
        TemplateRegistry {
            catalogue: Vec::new(),
            table: vec![None; size.max(1)],
            searches: AtomicU64::new(0),
            comparisons: AtomicU64::new(0),
        }
    }

    /// Append a template to the catalogue without indexing it.
    ///
    /// The loader's first pass appends all records, then builds the table in
    /// one sweep once the catalogue is complete.
    pub fn push(&mut self, template: Template) -> TemplateId {
        let id = TemplateId(self.catalogue.len() as u32);
        self.catalogue.push(template);
        id
    }

    pub fn get(&self, id: TemplateId) -> &Template {
        &self.catalogue[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: TemplateId) -> &mut Template {
        &mut self.catalogue[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.catalogue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalogue.is_empty()
    }

    pub fn table_size(&self) -> usize {
        self.table.len()
    }

    /// Iterate the catalogue in load order
    pub fn iter(&self) -> impl Iterator<Item = (TemplateId, &Template)> {
        self.catalogue
            .iter()
            .enumerate()
            .map(|(i, t)| (TemplateId(i as u32), t))
    }

    /// File a template in the probe table.
    ///
    /// A full wrap is the fatal table-too-small condition.
    pub fn index(&mut self, id: TemplateId) -> Result<(), StoreError> {
        let name = self.catalogue[id.0 as usize].name.clone();
        let origin = hash_name(&name, self.table.len());
        let mut slot = origin;
        loop {
            match self.table[slot] {
                None => {
                    self.table[slot] = Some(id);
                    return Ok(());
                }
                Some(existing) => {
                    if self.catalogue[existing.0 as usize].name == name {
                        return Err(StoreError::DuplicateName(name));
                    }
                }
            }
            slot += 1;
            if slot == self.table.len() {
                slot = 0;
            }
            if slot == origin {
                return Err(StoreError::TableFull {
                    name,
                    size: self.table.len(),
                });
            }
        }
    }

    /// Build the probe table for the whole catalogue
    pub fn build_table(&mut self) -> Result<(), StoreError> {
        for i in 0..self.catalogue.len() {
            self.index(TemplateId(i as u32))?;
        }
        Ok(())
    }

    /// Probe for a template by name; a miss is logged.
    pub fn find(&self, name: &str) -> Option<TemplateId> {
        let found = self.find_quiet(name);
        if found.is_none() {
            tracing::warn!("couldn't find template {}", name);
        }
        found
    }

    /// Probe for a template by name without diagnostics on a miss.
    ///
    /// Used during bulk resolution where absence is expected.
    pub fn find_quiet(&self, name: &str) -> Option<TemplateId> {
        let origin = hash_name(name, self.table.len());
        self.searches.fetch_add(1, Ordering::Relaxed);
        let mut slot = origin;
        loop {
            let id = self.table[slot]?;
            self.comparisons.fetch_add(1, Ordering::Relaxed);
            if self.catalogue[id.0 as usize].name == name {
                return Some(id);
            }
            slot += 1;
            if slot == self.table.len() {
                slot = 0;
            }
            if slot == origin {
                return None;
            }
        }
    }

    /// Linear catalogue scan by kind and in-game name
    pub fn find_by_kind_and_name(&self, kind: EntityKind, name: &str) -> Option<TemplateId> {
        self.iter()
            .find(|(_, t)| t.body.kind == kind && t.body.name == name)
            .map(|(id, _)| id)
    }

    /// Linear catalogue scan by declared skill; `kind` of `None` means any
    pub fn find_by_skill_and_kind(
        &self,
        skill: &str,
        kind: Option<EntityKind>,
    ) -> Option<TemplateId> {
        self.iter()
            .find(|(_, t)| {
                kind.map_or(true, |k| t.body.kind == k)
                    && t.body.skill.as_deref() == Some(skill)
            })
            .map(|(id, _)| id)
    }

    /// Linear catalogue scan by in-game display name.
    ///
    /// Browses the whole catalogue each time; prefer `find` unless the
    /// display name is genuinely all you have (scripting layers do this).
    pub fn find_by_object_name(&self, name: &str) -> Option<TemplateId> {
        self.iter()
            .find(|(_, t)| t.body.name == name)
            .map(|(id, _)| id)
    }

    /// Snapshot the lookup diagnostics
    pub fn lookup_stats(&self) -> LookupStats {
        LookupStats {
            searches: self.searches.load(Ordering::Relaxed),
            comparisons: self.comparisons.load(Ordering::Relaxed),
        }
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}
