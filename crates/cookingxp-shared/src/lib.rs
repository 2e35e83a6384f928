//! Shared types and the progression engine for CookingXP.
//!
//! Recipes are gated behind achievements ("boxes") laid out on tiered trees.
//! Completing an achievement activates it everywhere it appears; each tree
//! then works out which of its nodes are reachable and releases the recipes
//! behind them.

pub mod achievement;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod prefs;
pub mod state;
pub mod topology;
pub mod tree;

pub use achievement::{Achievement, AchievementDef, AchievementId, AchievementRegistry};
pub use catalog::{CatalogEntry, CatalogGate, CatalogKey, RecipeCatalog};
pub use config::XpConfig;
pub use engine::ProgressionEngine;
pub use error::{ErrorKind, Result, XpError};
pub use prefs::{JsonFilePrefs, MemoryPrefs, PreferenceStore};
pub use state::{LoadReport, PersistedState};
pub use topology::TopologyDef;
pub use tree::{NodeRef, NodeState, ProgressionTree, TreeBuilder, TreeId, TreeNode};
