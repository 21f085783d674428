//! Unified error types for trailhead.
//!
//! Errors split into two families: user errors (not found, validation,
//! insufficient gems) that map to 4xx responses at the request boundary, and
//! infrastructure errors (storage, serialization, config) that map to 5xx.
//! Idempotent re-completion, re-award, and re-stamping are not errors at all;
//! the engines detect those states and short-circuit.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for trailhead operations.
#[derive(Error, Debug)]
pub enum TrailheadError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Input rejected before any state change.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// A gem-gated purchase exceeded the user's balance.
    #[error("insufficient gems: need {needed}, have {balance}")]
    InsufficientGems { needed: u32, balance: u32 },

    /// Badge criteria expression failed to parse or evaluate.
    #[error("criteria error: {message}")]
    Criteria { message: String },

    /// I/O errors from the snapshot store.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON serialization/deserialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },
}

/// A specialized Result type for trailhead operations.
pub type Result<T> = std::result::Result<T, TrailheadError>;

impl TrailheadError {
    /// Create a not-found error for an entity kind and id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a criteria error.
    pub fn criteria(message: impl Into<String>) -> Self {
        Self::Criteria {
            message: message.into(),
        }
    }

    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error was caused by the caller's input.
    ///
    /// User errors are non-retryable without corrected input and map to 4xx
    /// at the request boundary; everything else is an infrastructure failure
    /// whose transaction has been rolled back, so the same logical request
    /// may be retried.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::Validation { .. } | Self::InsufficientGems { .. }
        )
    }
}

impl From<io::Error> for TrailheadError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for TrailheadError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}
