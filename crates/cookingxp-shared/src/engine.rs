//! Progression engine: registry, trees, score and persistence behind one lock.
//!
//! Every mutation (including the preference write it triggers) happens while
//! holding the engine mutex. New flags and score are written to the store
//! before any tree is revalidated; if the write fails they are rolled back,
//! so memory, store and catalog never disagree.

use crate::achievement::{AchievementDef, AchievementId, AchievementRegistry};
use crate::catalog::{CatalogEntry, CatalogGate, CatalogKey};
use crate::config::EngineConfig;
use crate::error::{Result, XpError};
use crate::prefs::PreferenceStore;
use crate::state::{parse_ids, LoadReport, PersistedState};
use crate::topology::TopologyDef;
use crate::tree::{ProgressionTree, TreeId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Flags and score as they were before a mutation
struct Snapshot {
    active: Vec<AchievementId>,
    score: i64,
}

struct EngineState {
    registry: AchievementRegistry,
    trees: BTreeMap<TreeId, ProgressionTree>,
    score: i64,
    score_increment: i64,
    catalog: Box<dyn CatalogGate>,
    store: Box<dyn PreferenceStore>,
}

impl EngineState {
    fn validate_all(&mut self) -> Result<BTreeSet<CatalogKey>> {
        let mut released = BTreeSet::new();
        for tree in self.trees.values_mut() {
            released.extend(tree.validate(&self.registry, self.catalog.as_mut())?);
        }
        Ok(released)
    }

    /// Relock the catalog and revalidate. Returns only keys that were not
    /// released before the relock.
    fn revalidate_from_scratch(&mut self) -> Result<BTreeSet<CatalogKey>> {
        let before = self.catalog.released_keys();
        self.catalog.relock_all();
        let released = self.validate_all()?;
        Ok(released.difference(&before).copied().collect())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            active: self.registry.active_ids(),
            score: self.score,
        }
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.registry.reset_all();
        for id in &snapshot.active {
            self.registry.mark_active(*id)?;
        }
        self.score = snapshot.score;
        Ok(())
    }

    /// Write current flags and score. On failure, put `previous` back in
    /// memory and in the store's pending writes, then return the error.
    fn persist_or_rollback(&mut self, previous: &Snapshot) -> Result<()> {
        let err = match PersistedState::capture(&self.registry, self.score)
            .write_to(self.store.as_mut())
        {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        warn!("Failed to persist progress, rolling back: {}", err);
        self.restore(previous)?;
        if let Err(e) =
            PersistedState::capture(&self.registry, self.score).stage(self.store.as_mut())
        {
            warn!("Failed to restage previous progress: {}", e);
        }
        Err(err)
    }

    /// Replace activation flags and score with `state`, skipping ids the
    /// topology does not know. Trees are not revalidated.
    fn apply(&mut self, state: &PersistedState, report: &mut LoadReport) -> Result<()> {
        self.registry.reset_all();

        if let Some(serialized) = state.serialized_active_ids.as_deref() {
            let (ids, errors) = parse_ids(serialized);
            for err in errors {
                warn!("Skipping persisted entry: {}", err);
                report.skipped.push(err);
            }

            for id in ids {
                if !self.registry.contains(id) {
                    let err = XpError::MalformedState(format!(
                        "achievement {} is not in the current topology",
                        id
                    ));
                    warn!("Skipping persisted entry: {}", err);
                    report.skipped.push(err);
                } else if self.registry.mark_active(id)? {
                    report.activated.push(id);
                }
            }
        }

        self.score = state.score;
        Ok(())
    }
}

/// The progression engine. Share it behind an `Arc` when several owners
/// need it; all methods take `&self`.
pub struct ProgressionEngine {
    state: Mutex<EngineState>,
}

impl ProgressionEngine {
    /// Build the topology, run the first validation, then restore whatever
    /// progress the store holds.
    pub fn new(
        topology: &TopologyDef,
        config: &EngineConfig,
        catalog: impl CatalogGate + 'static,
        store: impl PreferenceStore + 'static,
    ) -> Result<Self> {
        let (registry, trees) = topology.build(config.tree_height)?;
        info!(
            achievements = registry.len(),
            trees = trees.len(),
            "Initializing progression engine"
        );

        let mut state = EngineState {
            registry,
            trees,
            score: 0,
            score_increment: config.score_increment,
            catalog: Box::new(catalog),
            store: Box::new(store),
        };
        state.validate_all()?;

        let engine = Self {
            state: Mutex::new(state),
        };
        engine.restore_from_store()?;
        Ok(engine)
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        // Every step leaves the state consistent, so a poisoned lock is safe to reuse
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record that `id` was completed. Returns the catalog keys this
    /// completion released.
    pub fn record_completion(&self, id: AchievementId) -> Result<BTreeSet<CatalogKey>> {
        let mut state = self.lock();
        let previous = state.snapshot();

        let newly_active = state.registry.mark_active(id)?;
        // Wraps on overflow; set_score takes any value
        state.score = state.score.wrapping_add(state.score_increment);
        state.persist_or_rollback(&previous)?;
        let released = state.validate_all()?;

        info!(
            achievement = %id,
            newly_active,
            score = state.score,
            released = released.len(),
            "Recorded completion"
        );
        Ok(released)
    }

    /// Revalidate every tree without touching the score
    pub fn validate_all(&self) -> Result<BTreeSet<CatalogKey>> {
        self.lock().validate_all()
    }

    pub fn score(&self) -> i64 {
        self.lock().score
    }

    /// Overwrite the score
    pub fn set_score(&self, score: i64) -> Result<()> {
        let mut state = self.lock();
        let previous = state.snapshot();
        state.score = score;
        state.persist_or_rollback(&previous)
    }

    /// Back to a fresh game: no achievements, score 0, catalog relocked and
    /// tier-0 content released again.
    pub fn reset(&self) -> Result<BTreeSet<CatalogKey>> {
        let mut state = self.lock();
        let previous = state.snapshot();

        state.score = 0;
        state.registry.reset_all();
        state.persist_or_rollback(&previous)?;
        state.catalog.relock_all();
        let released = state.validate_all()?;

        info!(released = released.len(), "Progress reset");
        Ok(released)
    }

    /// Replace progress with a serialized active-id list and score. The
    /// catalog is relocked first, so content behind progress that is no
    /// longer held goes away; `released` lists only keys that were not out
    /// before the load.
    pub fn load_state(&self, serialized_active_ids: Option<&str>, score: i64) -> Result<LoadReport> {
        let persisted = PersistedState {
            serialized_active_ids: serialized_active_ids.map(str::to_string),
            score,
        };

        let mut state = self.lock();
        let previous = state.snapshot();
        let mut report = LoadReport::default();
        state.apply(&persisted, &mut report)?;
        state.persist_or_rollback(&previous)?;
        report.released = state.revalidate_from_scratch()?;

        info!(
            activated = report.activated.len(),
            skipped = report.skipped.len(),
            score,
            "Loaded state"
        );
        Ok(report)
    }

    pub fn export_state(&self) -> PersistedState {
        let state = self.lock();
        PersistedState::capture(&state.registry, state.score)
    }

    /// Reload progress from the preference store. Keys that cannot be read
    /// are reported as skipped and treated as absent.
    pub fn restore_from_store(&self) -> Result<LoadReport> {
        let mut state = self.lock();
        let (persisted, errors) = PersistedState::read_lenient(state.store.as_ref());

        let mut report = LoadReport::default();
        for err in errors {
            warn!("Skipping persisted entry: {}", err);
            report.skipped.push(err);
        }
        state.apply(&persisted, &mut report)?;
        report.released = state.revalidate_from_scratch()?;

        debug!(
            activated = report.activated.len(),
            skipped = report.skipped.len(),
            score = state.score,
            "Restored state from store"
        );
        Ok(report)
    }

    pub fn is_active(&self, id: AchievementId) -> Result<bool> {
        self.lock().registry.is_active(id)
    }

    pub fn active_achievements(&self) -> Vec<AchievementId> {
        self.lock().registry.active_ids()
    }

    pub fn achievement(&self, id: AchievementId) -> Result<AchievementDef> {
        self.lock()
            .registry
            .get(id)
            .map(|a| a.def.clone())
            .ok_or(XpError::AchievementNotFound(id))
    }

    /// Snapshot of one tree as of the last validation
    pub fn tree(&self, id: TreeId) -> Result<ProgressionTree> {
        self.lock()
            .trees
            .get(&id)
            .cloned()
            .ok_or(XpError::TreeNotFound(id))
    }

    /// Snapshots of all trees, ordered by id
    pub fn trees(&self) -> Vec<ProgressionTree> {
        self.lock().trees.values().cloned().collect()
    }

    /// Catalog entries for released keys, for notifications
    pub fn lookup_entries(&self, keys: &BTreeSet<CatalogKey>) -> Vec<CatalogEntry> {
        self.lock().catalog.lookup_by_keys(keys)
    }
}
