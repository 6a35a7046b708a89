//! Storage layer for kbase knowledge bases.
//!
//! Provides the directory layout shared by both stores, crash-safe file
//! replacement, and the [`DocumentLog`]: the durable record of what should
//! exist in each knowledge base.

pub mod document_log;
pub mod error;
pub mod fs;
pub mod layout;

pub use document_log::{keyword_search, DocumentLog};
pub use error::StorageError;
pub use fs::{commit_temp, temp_path, write_atomic};
pub use layout::{KbLayout, KbPaths, DOCUMENTS_FILE, VECTOR_INDEX_FILE, VECTOR_META_FILE};
