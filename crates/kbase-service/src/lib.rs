//! # kbase-service
//!
//! The knowledge base engine as front-ends see it: list, save, resume,
//! inspect, search, delete and query, built from [`Settings`] or from an
//! explicit embedding model.
//!
//! [`Settings`]: kbase_types::Settings

pub mod error;
pub mod service;

pub use error::ServiceError;
pub use service::{ChunkMatch, ChunkVector, KnowledgeBaseService, ServiceOptions};

// Types that appear in the service signatures
pub use kbase_indexing::{ResumeProgress, SaveOutcome};
pub use kbase_retrieval::{LoadedKnowledge, RetrievalHit, RetrievalMode, RetrievalResult};
pub use kbase_types::{HealthReport, HealthStatus, ProgressCallback, Record};
