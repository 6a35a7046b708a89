//! # kbase-embeddings
//!
//! Embedding generation for kbase knowledge bases.
//!
//! The embedding service is remote and unreliable, so this crate treats it
//! as a capability `embed(text) -> vector | failure` and layers concurrency
//! and failure tolerance on top.
//!
//! ## Features
//! - [`HttpEmbedder`]: Ollama and OpenAI-compatible endpoints, per-call
//!   timeout, backoff on rate limiting
//! - [`EmbeddingProvider`]: bounded concurrent fan-out with results
//!   reassembled in submission order and `None` for failed items
//! - [`MockEmbedder`]: deterministic vectors for tests and offline runs

pub mod error;
pub mod http;
pub mod mock;
pub mod model;
pub mod provider;

pub use error::EmbeddingError;
pub use http::{HttpEmbedder, HttpEmbedderConfig};
pub use mock::MockEmbedder;
pub use model::{Embedding, EmbeddingModel, ModelInfo};
pub use provider::{
    count_failures, EmbeddingProvider, ProviderConfig, DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT,
};
