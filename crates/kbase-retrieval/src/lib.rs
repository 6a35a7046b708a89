//! # kbase-retrieval
//!
//! Query-time access to one or more knowledge bases.
//!
//! [`load_kbs`] reads the named document logs into one record list and
//! merges their vector indexes into one in-memory index. [`Retriever`]
//! embeds a query once and searches the merged index, falling back to
//! keyword matching over the combined records.

pub mod error;
pub mod loader;
pub mod retriever;

pub use error::RetrievalError;
pub use loader::{load_kbs, KbSource, LoadedKnowledge, SkippedIndex};
pub use retriever::{
    keyword_search, RetrievalHit, RetrievalMode, RetrievalResult, Retriever, DEFAULT_TOP_K,
};
