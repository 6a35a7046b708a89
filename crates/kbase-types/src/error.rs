//! Error types shared across the kbase crates.

use thiserror::Error;

/// Unified error type for shared domain operations.
#[derive(Debug, Error)]
pub enum KbaseError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Knowledge base name rejected by validation
    #[error("Invalid knowledge base name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
