//! Catalog gate: releases recipes once the achievement gating them is reachable.
//!
//! The engine only talks to [`CatalogGate`]. [`RecipeCatalog`] is the in-memory
//! implementation; it uses BTree collections so release sets and lookups are
//! deterministic.

use crate::achievement::AchievementId;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Key of a catalog entry (recipe id)
pub type CatalogKey = u32;

/// A recipe in the catalog, tagged with the achievements that release it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub key: CatalogKey,
    pub name: String,
    #[serde(default)]
    pub achievements: Vec<AchievementId>,
}

impl CatalogEntry {
    pub fn new(key: CatalogKey, name: &str, achievements: &[u16]) -> Self {
        Self {
            key,
            name: name.to_string(),
            achievements: achievements.iter().copied().map(AchievementId).collect(),
        }
    }
}

/// Content store consulted when a node becomes reachable.
pub trait CatalogGate: Send {
    /// Release every entry gated by `id`. Returns only keys that were not
    /// already released.
    fn release_by_achievement(&mut self, id: AchievementId) -> BTreeSet<CatalogKey>;

    /// Entries for `keys`, ordered by name then key. Unknown keys are ignored.
    fn lookup_by_keys(&self, keys: &BTreeSet<CatalogKey>) -> Vec<CatalogEntry>;

    /// Keys released so far
    fn released_keys(&self) -> BTreeSet<CatalogKey>;

    /// Forget all releases.
    fn relock_all(&mut self);
}

/// In-memory recipe catalog
#[derive(Debug, Clone, Default)]
pub struct RecipeCatalog {
    entries: BTreeMap<CatalogKey, CatalogEntry>,
    /// Achievement -> keys of entries it releases
    by_achievement: BTreeMap<AchievementId, BTreeSet<CatalogKey>>,
    released: BTreeSet<CatalogKey>,
}

impl RecipeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = Self::new();
        for entry in entries {
            catalog.add_entry(entry);
        }
        catalog
    }

    /// Load a JSON array of entries
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let entries: Vec<CatalogEntry> = serde_json::from_str(&content)?;
        Ok(Self::from_entries(entries))
    }

    /// Add or replace an entry
    pub fn add_entry(&mut self, entry: CatalogEntry) {
        if let Some(old) = self.entries.remove(&entry.key) {
            for id in &old.achievements {
                if let Some(keys) = self.by_achievement.get_mut(id) {
                    keys.remove(&old.key);
                }
            }
        }

        for id in &entry.achievements {
            self.by_achievement.entry(*id).or_default().insert(entry.key);
        }
        self.entries.insert(entry.key, entry);
    }

    pub fn is_released(&self, key: CatalogKey) -> bool {
        self.released.contains(&key)
    }

    /// Entries currently released, ordered by name
    pub fn released_entries(&self) -> Vec<CatalogEntry> {
        self.lookup_by_keys(&self.released)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CatalogGate for RecipeCatalog {
    fn release_by_achievement(&mut self, id: AchievementId) -> BTreeSet<CatalogKey> {
        let Some(keys) = self.by_achievement.get(&id) else {
            return BTreeSet::new();
        };

        let mut newly = BTreeSet::new();
        for key in keys {
            if self.released.insert(*key) {
                newly.insert(*key);
            }
        }
        newly
    }

    fn lookup_by_keys(&self, keys: &BTreeSet<CatalogKey>) -> Vec<CatalogEntry> {
        let mut found: Vec<CatalogEntry> = keys
            .iter()
            .filter_map(|k| self.entries.get(k))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name).then(a.key.cmp(&b.key)));
        found
    }

    fn released_keys(&self) -> BTreeSet<CatalogKey> {
        self.released.clone()
    }

    fn relock_all(&mut self) {
        self.released.clear();
    }
}
