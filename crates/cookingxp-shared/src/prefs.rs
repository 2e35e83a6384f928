//! Key/value preference stores backing the persisted progress.
//!
//! Two keys are written: [`SERIALIZED_GAME_DATA_KEY`] holds the active
//! achievement ids, [`GAME_SCORE_KEY`] the score. Writes are buffered until
//! [`PreferenceStore::commit`].

use crate::error::{Result, XpError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Space-separated active achievement ids
pub const SERIALIZED_GAME_DATA_KEY: &str = "SERIALIZED_GAME_DATA";

/// Current score
pub const GAME_SCORE_KEY: &str = "GAME_SCORE";

/// A stored preference value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrefValue {
    Int(i64),
    Str(String),
}

pub trait PreferenceStore: Send {
    fn get_string(&self, key: &str) -> Result<Option<String>>;
    fn get_int(&self, key: &str) -> Result<Option<i64>>;
    fn put_string(&mut self, key: &str, value: &str) -> Result<()>;
    fn put_int(&mut self, key: &str, value: i64) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    /// Make pending writes durable
    fn commit(&mut self) -> Result<()>;
}

fn as_string(key: &str, value: Option<&PrefValue>) -> Result<Option<String>> {
    match value {
        None => Ok(None),
        Some(PrefValue::Str(s)) => Ok(Some(s.clone())),
        Some(PrefValue::Int(_)) => Err(XpError::Store(format!("{} is not a string", key))),
    }
}

fn as_int(key: &str, value: Option<&PrefValue>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(PrefValue::Int(n)) => Ok(Some(*n)),
        Some(PrefValue::Str(_)) => Err(XpError::Store(format!("{} is not an integer", key))),
    }
}

/// In-memory store. Clones share the same map, so a caller can keep a
/// handle to inspect what an engine wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryPrefs {
    values: Arc<Mutex<BTreeMap<String, PrefValue>>>,
}

impl MemoryPrefs {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, PrefValue>> {
        self.values.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values().contains_key(key)
    }

    pub fn snapshot(&self) -> BTreeMap<String, PrefValue> {
        self.values().clone()
    }
}

impl PreferenceStore for MemoryPrefs {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        as_string(key, self.values().get(key))
    }

    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        as_int(key, self.values().get(key))
    }

    fn put_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.values()
            .insert(key.to_string(), PrefValue::Str(value.to_string()));
        Ok(())
    }

    fn put_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.values().insert(key.to_string(), PrefValue::Int(value));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values().remove(key);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}

/// On-disk layout of [`JsonFilePrefs`]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PrefsFile {
    saved_at: DateTime<Utc>,
    #[serde(default)]
    values: BTreeMap<String, PrefValue>,
}

/// Preference store persisted as a JSON file
#[derive(Debug)]
pub struct JsonFilePrefs {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
}

impl JsonFilePrefs {
    /// Open the store at `path`. A missing file is an empty store, and so is
    /// one that does not parse; the next commit overwrites it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let content = fs::read_to_string(&path)?;
            match serde_json::from_str::<PrefsFile>(&content) {
                Ok(file) => file.values,
                Err(e) => {
                    warn!("Ignoring unreadable preference file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonFilePrefs {
    fn get_string(&self, key: &str) -> Result<Option<String>> {
        as_string(key, self.values.get(key))
    }

    fn get_int(&self, key: &str) -> Result<Option<i64>> {
        as_int(key, self.values.get(key))
    }

    fn put_string(&mut self, key: &str, value: &str) -> Result<()> {
        self.values
            .insert(key.to_string(), PrefValue::Str(value.to_string()));
        Ok(())
    }

    fn put_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.values.insert(key.to_string(), PrefValue::Int(value));
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = PrefsFile {
            saved_at: Utc::now(),
            values: self.values.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;

        // Write to a sibling temp file, then rename over the target
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_prefs_shared_between_clones() {
        let prefs = MemoryPrefs::new();
        let mut writer = prefs.clone();
        writer.put_int(GAME_SCORE_KEY, 4).unwrap();

        assert_eq!(prefs.get_int(GAME_SCORE_KEY).unwrap(), Some(4));
        assert!(prefs.contains(GAME_SCORE_KEY));
    }

    #[test]
    fn test_type_mismatch_is_store_error() {
        let mut prefs = MemoryPrefs::new();
        prefs.put_string(GAME_SCORE_KEY, "three").unwrap();
        assert!(matches!(prefs.get_int(GAME_SCORE_KEY), Err(XpError::Store(_))));
    }

    #[test]
    fn test_json_prefs_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.json");

        let mut prefs = JsonFilePrefs::open(&path).unwrap();
        prefs.put_string(SERIALIZED_GAME_DATA_KEY, "0 3 11").unwrap();
        prefs.put_int(GAME_SCORE_KEY, 3).unwrap();
        prefs.commit().unwrap();

        let reopened = JsonFilePrefs::open(&path).unwrap();
        assert_eq!(
            reopened.get_string(SERIALIZED_GAME_DATA_KEY).unwrap(),
            Some("0 3 11".to_string())
        );
        assert_eq!(reopened.get_int(GAME_SCORE_KEY).unwrap(), Some(3));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_json_prefs_uncommitted_writes_not_durable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = JsonFilePrefs::open(&path).unwrap();
        prefs.put_int(GAME_SCORE_KEY, 9).unwrap();

        let reopened = JsonFilePrefs::open(&path).unwrap();
        assert_eq!(reopened.get_int(GAME_SCORE_KEY).unwrap(), None);
    }

    #[test]
    fn test_json_prefs_corrupt_file_opens_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");
        fs::write(&path, "{\"values\": {\"GAME_SCORE\": 3").unwrap();

        let mut prefs = JsonFilePrefs::open(&path).unwrap();
        assert_eq!(prefs.get_int(GAME_SCORE_KEY).unwrap(), None);

        prefs.put_int(GAME_SCORE_KEY, 1).unwrap();
        prefs.commit().unwrap();
        let reopened = JsonFilePrefs::open(&path).unwrap();
        assert_eq!(reopened.get_int(GAME_SCORE_KEY).unwrap(), Some(1));
    }

    #[test]
    fn test_json_prefs_remove() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("prefs.json");

        let mut prefs = JsonFilePrefs::open(&path).unwrap();
        prefs.put_string(SERIALIZED_GAME_DATA_KEY, "1").unwrap();
        prefs.commit().unwrap();
        prefs.remove(SERIALIZED_GAME_DATA_KEY).unwrap();
        prefs.commit().unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(!content.contains(SERIALIZED_GAME_DATA_KEY));
        assert!(content.contains("saved_at"));
    }
}
