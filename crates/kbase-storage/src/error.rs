//! Storage layer error types.

use std::path::PathBuf;

use kbase_types::KbaseError;
use thiserror::Error;

/// Errors that can occur in the storage layer
#[derive(Error, Debug)]
pub enum StorageError {
    /// Filesystem operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Existing file could not be parsed; it is left untouched
    #[error("Corrupted file {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// Knowledge base name rejected
    #[error(transparent)]
    InvalidName(#[from] KbaseError),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}
