//! Achievement registry.
//!
//! Every achievement ("box") has exactly one global activation flag. Trees
//! refer to achievements by id only, so a box shared between trees is
//! activated once and seen as active everywhere.

use crate::error::{Result, XpError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Small integer identifying an achievement within the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AchievementId(pub u16);

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AchievementId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim().parse::<u16>().map(AchievementId)
    }
}

impl From<u16> for AchievementId {
    fn from(id: u16) -> Self {
        AchievementId(id)
    }
}

/// Static definition of an achievement: id plus presentation resource keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: AchievementId,
    /// Title resource key (e.g., "game_box_title3")
    #[serde(default)]
    pub title: String,
    /// Description resource key
    #[serde(default)]
    pub description: String,
    /// Icon resource key used once activated
    #[serde(default)]
    pub icon: String,
}

impl AchievementDef {
    pub fn new(id: u16) -> Self {
        let id = AchievementId(id);
        Self {
            id,
            title: format!("game_box_title{}", id),
            description: format!("game_box_description{}", id),
            icon: format!("ic_box_activated{}", id),
        }
    }
}

/// An achievement with its live activation flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Achievement {
    pub def: AchievementDef,
    active: bool,
}

impl Achievement {
    fn new(def: AchievementDef) -> Self {
        Self { def, active: false }
    }

    pub fn id(&self) -> AchievementId {
        self.def.id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}

/// Arena of achievements indexed by id.
#[derive(Debug, Clone, Default)]
pub struct AchievementRegistry {
    achievements: BTreeMap<AchievementId, Achievement>,
}

impl AchievementRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an achievement definition. Ids must be unique.
    pub fn register(&mut self, def: AchievementDef) -> Result<()> {
        if self.achievements.contains_key(&def.id) {
            return Err(XpError::DuplicateAchievement(def.id));
        }
        self.achievements.insert(def.id, Achievement::new(def));
        Ok(())
    }

    /// Activate an achievement. Returns true if the flag changed.
    pub fn mark_active(&mut self, id: AchievementId) -> Result<bool> {
        let achievement = self
            .achievements
            .get_mut(&id)
            .ok_or(XpError::AchievementNotFound(id))?;
        let changed = !achievement.active;
        achievement.active = true;
        Ok(changed)
    }

    pub fn is_active(&self, id: AchievementId) -> Result<bool> {
        self.achievements
            .get(&id)
            .map(Achievement::is_active)
            .ok_or(XpError::AchievementNotFound(id))
    }

    /// Clear every activation flag.
    pub fn reset_all(&mut self) {
        for achievement in self.achievements.values_mut() {
            achievement.active = false;
        }
    }

    pub fn get(&self, id: AchievementId) -> Option<&Achievement> {
        self.achievements.get(&id)
    }

    pub fn contains(&self, id: AchievementId) -> bool {
        self.achievements.contains_key(&id)
    }

    /// Active ids in ascending order
    pub fn active_ids(&self) -> Vec<AchievementId> {
        self.achievements
            .values()
            .filter(|a| a.active)
            .map(Achievement::id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Achievement> {
        self.achievements.values()
    }

    pub fn len(&self) -> usize {
        self.achievements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.achievements.is_empty()
    }
}
