//! Registry error types

use std::path::PathBuf;

use somnus_types::{FunctionId, ValidationError};
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Function not found: {0}")]
    NotFound(FunctionId),

    #[error("Function already registered: {0}")]
    AlreadyExists(FunctionId),

    #[error("Concurrent modification of {id}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        id: FunctionId,
        expected: u64,
        actual: u64,
    },

    #[error("Corrupt registry at {path}: {reason}")]
    CorruptRegistry { path: PathBuf, reason: String },

    #[error("Registry store is closed")]
    Closed,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RegistryError {
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::CorruptRegistry {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying against a fresh read can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RegistryError::ConcurrentModification { .. })
    }
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
