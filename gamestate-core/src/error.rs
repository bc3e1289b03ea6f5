//! Error types for the game-state service.
//!
//! Two layers: [`StoreError`] is what a [`crate::store::Store`]
//! implementation reports, and [`GameStateError`] is what the directory,
//! aggregator and leaderboard hand back to the request-handling layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure reported by a persistence backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The addressed record does not exist.
    #[error("record not found")]
    NotFound,

    /// A uniqueness constraint rejected the write.
    #[error("uniqueness conflict: {0}")]
    Conflict(String),

    /// A value cannot be represented by the backend (e.g. an integer wider
    /// than the column type).
    #[error("value out of range: {0}")]
    InvalidValue(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),

    /// The backend itself failed.
    #[error("backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => Self::NotFound,
            rusqlite::Error::SqliteFailure(ref code, ref msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Conflict(
                    msg.clone()
                        .unwrap_or_else(|| "constraint violation".to_string()),
                )
            }
            other => Self::Backend(Box::new(other)),
        }
    }
}

/// The failure categories the request-handling layer distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Caller-supplied data failed a precondition.
    InvalidInput,
    /// The referenced entity does not exist.
    NotFound,
    /// Uniqueness violation during concurrent creation.
    Conflict,
    /// The persistence collaborator failed or timed out.
    StoreUnavailable,
}

/// Top-level error type for all game-state operations.
#[derive(Error, Debug)]
pub enum GameStateError {
    /// Caller-supplied data failed a precondition.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The referenced entity does not exist.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Which kind of record was looked up.
        entity: &'static str,
        /// The key that was used.
        key: String,
    },

    /// A uniqueness constraint was violated and could not be resolved.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The store failed; the underlying cause is attached.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GameStateError {
    /// Shorthand for a missing player.
    pub(crate) fn player_not_found(key: impl ToString) -> Self {
        Self::NotFound {
            entity: "Player",
            key: key.to_string(),
        }
    }

    /// The category the request-handling layer maps to a response code.
    ///
    /// Configuration problems are caller-supplied data and report as
    /// [`ErrorKind::InvalidInput`]; I/O failures report as
    /// [`ErrorKind::StoreUnavailable`].
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) | Self::Config(_) => ErrorKind::InvalidInput,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::StoreUnavailable(_) | Self::Io(_) => ErrorKind::StoreUnavailable,
        }
    }
}

impl From<StoreError> for GameStateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::NotFound {
                entity: "Record",
                key: String::new(),
            },
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::InvalidValue(msg) => Self::InvalidInput(msg),
            other => Self::StoreUnavailable(other),
        }
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, GameStateError>;
