//! Error types for the learning engine

use thiserror::Error;

/// Errors surfaced by the learning engine and its stores
#[derive(Debug, Error)]
pub enum LearningError {
    /// A referenced conversation or pattern does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The underlying store failed (connectivity, constraint violation, corrupt row)
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// A value outside its domain (feedback, quality)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be read or parsed
    #[error("configuration error: {0}")]
    Config(String),
}

impl LearningError {
    pub fn conversation_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { kind: "conversation", id: id.into() }
    }

    pub fn pattern_not_found(id: impl Into<String>) -> Self {
        Self::NotFound { kind: "pattern", id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for LearningError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for LearningError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("serialization: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, LearningError>;
