//! Error types for the indexing controller.

use kbase_storage::StorageError;
use kbase_vector::VectorError;
use thiserror::Error;

/// Errors that can occur while indexing a knowledge base
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Document log or layout operation failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Vector index error
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// The embedding service was unreachable for a whole batch; earlier
    /// batches are committed
    #[error("Batch {start}..{end} failed: {reason}")]
    BatchFailed {
        start: usize,
        end: usize,
        reason: String,
    },

    /// Caller supplied unusable arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl IndexingError {
    /// Whether retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, IndexingError::BatchFailed { .. })
    }
}
