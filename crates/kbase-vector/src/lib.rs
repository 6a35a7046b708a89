//! # kbase-vector
//!
//! Vector index for kbase knowledge bases using the HNSW algorithm.
//!
//! Each knowledge base stores its embeddings in a usearch index whose keys
//! are positions, next to a JSON companion file holding the record behind
//! each position. The persisted size of the index is the indexing
//! checkpoint.
//!
//! ## Features
//! - Incremental append with full, atomic persist after every extension
//! - Load distinguishes missing files from corrupted ones
//! - Reconstruction of stored vectors by position
//! - Merging several knowledge bases into one in-memory index

pub mod error;
pub mod hnsw;
pub mod metadata;
pub mod store;

pub use error::VectorError;
pub use hnsw::{scalar_kind, supports_reconstruction, HnswConfig};
pub use metadata::{IndexMeta, META_VERSION};
pub use store::{VectorHit, VectorStore};
