//! Service error types.

use kbase_embeddings::EmbeddingError;
use kbase_indexing::IndexingError;
use kbase_retrieval::RetrievalError;
use kbase_storage::StorageError;
use kbase_types::KbaseError;
use kbase_vector::VectorError;
use thiserror::Error;

/// Errors surfaced by [`crate::KnowledgeBaseService`].
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Indexing(#[from] IndexingError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Vector(#[from] VectorError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Invalid settings or names
    #[error(transparent)]
    Config(#[from] KbaseError),

    /// The knowledge base has no data of the requested kind
    #[error("Not found: {0}")]
    NotFound(String),
}
