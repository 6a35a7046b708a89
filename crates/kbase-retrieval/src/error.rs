//! Retrieval error types.

use kbase_embeddings::EmbeddingError;
use kbase_storage::StorageError;
use kbase_vector::VectorError;
use thiserror::Error;

/// Errors that can occur while loading or searching knowledge bases
#[derive(Error, Debug)]
pub enum RetrievalError {
    /// Document log could not be read
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Vector index error
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// Query embedding failed
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Caller supplied unusable arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
