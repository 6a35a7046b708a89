//! Resumable indexing for kbase knowledge bases.
//!
//! This crate keeps the two stores of a knowledge base, the document log and
//! the vector index, reconcilable across crashes, network failures and
//! partially failed batches.
//!
//! ## Key Components
//!
//! - [`IndexingController`]: incremental saves and resume-from-checkpoint
//! - [`Checkpoint`]: implicit progress, equal to the persisted vector count
//! - [`HealthChecker`]: classifies a knowledge base as empty, healthy,
//!   mismatched or corrupted
//! - [`KbLocks`]: one writer per knowledge base at a time
//!
//! ## Example
//!
//! ```ignore
//! let controller = IndexingController::new(layout, provider, hnsw, ControllerConfig::default());
//! controller.save_kb("notes", records, Some("en"), &NoOpProgress).await?;
//!
//! // After an outage, call until caught up
//! let progress = controller.resume_kb_embedding("notes", None, &NoOpProgress).await?;
//! assert!(progress.is_complete());
//! ```

pub mod checkpoint;
pub mod controller;
pub mod error;
pub mod health;
pub mod locks;

pub use checkpoint::{Checkpoint, ResumeProgress};
pub use controller::{ControllerConfig, IndexingController, SaveOutcome};
pub use error::IndexingError;
pub use health::HealthChecker;
pub use locks::KbLocks;
