//! # kbase-types
//!
//! Shared domain types for kbase knowledge bases.
//!
//! This crate defines the data structures every other crate speaks:
//! - [`Record`]: one chunk of ingested text plus string metadata
//! - [`HealthStatus`] / [`HealthReport`]: consistency classification of a
//!   knowledge base's document log against its vector index
//! - [`ProgressCallback`]: `(completed, total)` progress contract
//! - [`Settings`]: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use kbase_types::Record;
//!
//! let record = Record::new("Rust has no garbage collector").with_language("en");
//! assert_eq!(record.language(), Some("en"));
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod name;
pub mod progress;
pub mod record;

pub use config::{
    ChunkingSettings, EmbeddingApi, EmbeddingSettings, IndexingSettings, QuantizationSetting,
    RetrievalSettings, Settings, VectorSettings,
};
pub use error::KbaseError;
pub use health::{HealthReport, HealthStatus};
pub use name::{validate_kb_name, MAX_KB_NAME_LEN};
pub use progress::{LoggingProgress, NoOpProgress, OffsetProgress, ProgressCallback};
pub use record::{Record, KB_KEY, LANGUAGE_KEY, SOURCE_KEY};
