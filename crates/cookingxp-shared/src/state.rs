//! Persisted form of the engine's progress.

use crate::achievement::{AchievementId, AchievementRegistry};
use crate::catalog::CatalogKey;
use crate::error::XpError;
use crate::prefs::{PreferenceStore, GAME_SCORE_KEY, SERIALIZED_GAME_DATA_KEY};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Active achievements plus score, as written to the preference store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    /// Space-separated decimal ids; `None` when nothing is active
    pub serialized_active_ids: Option<String>,
    pub score: i64,
}

impl PersistedState {
    pub fn capture(registry: &AchievementRegistry, score: i64) -> Self {
        Self {
            serialized_active_ids: serialize_ids(&registry.active_ids()),
            score,
        }
    }

    /// Write both keys and commit. An empty active set removes the ids key.
    pub fn write_to(&self, store: &mut dyn PreferenceStore) -> crate::Result<()> {
        self.stage(store)?;
        store.commit()
    }

    /// Put both keys without committing
    pub fn stage(&self, store: &mut dyn PreferenceStore) -> crate::Result<()> {
        match &self.serialized_active_ids {
            Some(ids) => store.put_string(SERIALIZED_GAME_DATA_KEY, ids)?,
            None => store.remove(SERIALIZED_GAME_DATA_KEY)?,
        }
        store.put_int(GAME_SCORE_KEY, self.score)
    }

    pub fn read_from(store: &dyn PreferenceStore) -> crate::Result<Self> {
        Ok(Self {
            serialized_active_ids: store.get_string(SERIALIZED_GAME_DATA_KEY)?,
            score: store.get_int(GAME_SCORE_KEY)?.unwrap_or(0),
        })
    }

    /// Like [`PersistedState::read_from`], but a key that cannot be read
    /// falls back to its default and comes back as a `MalformedState` error.
    pub fn read_lenient(store: &dyn PreferenceStore) -> (Self, Vec<XpError>) {
        let mut errors = Vec::new();

        let serialized_active_ids = store
            .get_string(SERIALIZED_GAME_DATA_KEY)
            .unwrap_or_else(|e| {
                errors.push(XpError::MalformedState(e.to_string()));
                None
            });
        let score = store
            .get_int(GAME_SCORE_KEY)
            .unwrap_or_else(|e| {
                errors.push(XpError::MalformedState(e.to_string()));
                None
            })
            .unwrap_or(0);

        (
            Self {
                serialized_active_ids,
                score,
            },
            errors,
        )
    }
}

/// Join ids with single spaces
pub fn serialize_ids(ids: &[AchievementId]) -> Option<String> {
    if ids.is_empty() {
        return None;
    }
    Some(
        ids.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" "),
    )
}

/// Parse a serialized id list. Tokens that are not ids come back as
/// `MalformedState` errors alongside the ids that did parse.
pub fn parse_ids(serialized: &str) -> (Vec<AchievementId>, Vec<XpError>) {
    let mut ids = Vec::new();
    let mut errors = Vec::new();
    for token in serialized.split_whitespace() {
        match token.parse::<AchievementId>() {
            Ok(id) => ids.push(id),
            Err(e) => errors.push(XpError::MalformedState(format!(
                "cannot parse achievement id {:?}: {}",
                token, e
            ))),
        }
    }
    (ids, errors)
}

/// Outcome of loading persisted state
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Achievements activated by the load
    pub activated: Vec<AchievementId>,
    /// Entries that were skipped, as `MalformedState` errors
    pub skipped: Vec<XpError>,
    /// Catalog keys released by the validation that follows the load
    pub released: BTreeSet<CatalogKey>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}
