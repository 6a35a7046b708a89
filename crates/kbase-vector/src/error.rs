//! Vector index error types.

use std::path::PathBuf;

use kbase_storage::StorageError;
use kbase_types::QuantizationSetting;
use thiserror::Error;

/// Errors that can occur during vector operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Dimension mismatch
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Pairs and metadata lists differ in length
    #[error("Length mismatch: {pairs} pairs but {metadatas} metadata entries")]
    LengthMismatch { pairs: usize, metadatas: usize },

    /// An index cannot be built from zero vectors
    #[error("Cannot build an index from zero vectors")]
    Empty,

    /// Position past the end of the index
    #[error("Position {position} out of range (index holds {count} vectors)")]
    OutOfRange { position: usize, count: usize },

    /// Stored precision does not allow exact reconstruction
    #[error("Vector reconstruction unsupported for {0:?} storage")]
    ReconstructUnsupported(QuantizationSetting),

    /// No index files on disk
    #[error("No vector index at {0}")]
    Missing(PathBuf),

    /// Index files present but unreadable or inconsistent
    #[error("Corrupted vector index {path}: {reason}")]
    Corrupted { path: PathBuf, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl VectorError {
    pub fn is_missing(&self) -> bool {
        matches!(self, VectorError::Missing(_))
    }

    pub fn is_corrupted(&self) -> bool {
        matches!(self, VectorError::Corrupted { .. })
    }
}

impl From<serde_json::Error> for VectorError {
    fn from(err: serde_json::Error) -> Self {
        VectorError::Serialization(err.to_string())
    }
}
