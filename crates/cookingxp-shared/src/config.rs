//! CookingXP configuration.
//!
//! Config file: ~/.config/cookingxp/config.toml or /etc/cookingxp/config.toml

use crate::tree::DEFAULT_TREE_HEIGHT;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the state file location
pub const STATE_PATH_ENV: &str = "COOKINGXP_STATE";

fn default_tree_height() -> usize {
    DEFAULT_TREE_HEIGHT
}

fn default_score_increment() -> i64 {
    1
}

/// Engine tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Tiers per tree
    #[serde(default = "default_tree_height")]
    pub tree_height: usize,

    /// Score added for every recorded completion
    #[serde(default = "default_score_increment")]
    pub score_increment: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tree_height: default_tree_height(),
            score_increment: default_score_increment(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Preference file; defaults to the user data dir
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// JSON recipe catalog
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,

    /// TOML topology; the built-in cooking topology when unset
    #[serde(default)]
    pub topology_path: Option<PathBuf>,
}

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub content: ContentConfig,
}

impl XpConfig {
    /// Default user config path: ~/.config/cookingxp/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("cookingxp").join("config.toml"))
    }

    /// System config path: /etc/cookingxp/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/cookingxp/config.toml")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Load configuration
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config (~/.config/cookingxp/config.toml)
    /// 3. System config (/etc/cookingxp/config.toml)
    /// 4. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::from_file(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::from_file(&system_path);
        }

        Ok(Self::default())
    }

    /// Resolved preference file: env override, then config, then data dir
    pub fn state_path(&self) -> PathBuf {
        if let Ok(path) = std::env::var(STATE_PATH_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        self.storage.state_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("cookingxp")
                .join("prefs.json")
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.tree_height == 0 {
            anyhow::bail!("engine.tree_height must be at least 1");
        }
        Ok(())
    }
}
