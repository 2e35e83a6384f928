//! Error types for the progression engine.

use crate::achievement::AchievementId;
use crate::tree::TreeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, XpError>;

#[derive(Error, Debug)]
pub enum XpError {
    #[error("Achievement {0} not found")]
    AchievementNotFound(AchievementId),

    #[error("Tree {0} not found")]
    TreeNotFound(TreeId),

    #[error("Duplicate achievement id: {0}")]
    DuplicateAchievement(AchievementId),

    #[error("Duplicate tree id: {0}")]
    DuplicateTree(TreeId),

    #[error("Malformed state: {0}")]
    MalformedState(String),

    #[error("Malformed topology: {0}")]
    MalformedTopology(String),

    #[error("Preference store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Coarse classification of an [`XpError`], stable across variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    DuplicateId,
    MalformedState,
    MalformedTopology,
    Storage,
}

impl XpError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            XpError::AchievementNotFound(_) | XpError::TreeNotFound(_) => ErrorKind::NotFound,
            XpError::DuplicateAchievement(_) | XpError::DuplicateTree(_) => ErrorKind::DuplicateId,
            XpError::MalformedState(_) => ErrorKind::MalformedState,
            XpError::MalformedTopology(_) | XpError::Toml(_) => ErrorKind::MalformedTopology,
            XpError::Store(_) | XpError::Io(_) | XpError::Json(_) => ErrorKind::Storage,
        }
    }
}
