//! Consistency classification of a knowledge base.
//!
//! The document log and the vector index are written by separate steps, so
//! any drift between them is reported as data rather than raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consistency state of a knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// No records and no vectors
    Empty,
    /// Vector index files exist but cannot be loaded
    Corrupted,
    /// Every logged record has a vector
    Healthy,
    /// Record count and vector count disagree
    Mismatch,
}

impl HealthStatus {
    /// Classify from counts alone. Corruption is decided by the caller
    /// before counts are available.
    pub fn from_counts(doc_count: usize, vector_count: usize) -> Self {
        if doc_count == 0 && vector_count == 0 {
            HealthStatus::Empty
        } else if doc_count == vector_count {
            HealthStatus::Healthy
        } else {
            HealthStatus::Mismatch
        }
    }

    /// Whether `resume_kb_embedding` can bring this state to healthy.
    pub fn is_resumable(&self) -> bool {
        matches!(self, HealthStatus::Mismatch)
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Empty => write!(f, "empty"),
            HealthStatus::Corrupted => write!(f, "corrupted"),
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Mismatch => write!(f, "mismatch"),
        }
    }
}

/// Health report for one knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Knowledge base name
    pub name: String,
    /// Records in the document log
    pub doc_count: usize,
    /// Vectors in the index (0 when absent or corrupted)
    pub vector_count: usize,
    /// Classified state
    pub status: HealthStatus,
    /// Records the index lacks (`doc_count - vector_count`, saturating)
    pub missing: usize,
    /// Human-readable detail, e.g. the corruption reason
    #[serde(default)]
    pub detail: Option<String>,
    /// When the check ran (milliseconds since epoch in JSON)
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub checked_at: DateTime<Utc>,
}

impl HealthReport {
    /// Build a report from counts.
    pub fn from_counts(name: impl Into<String>, doc_count: usize, vector_count: usize) -> Self {
        Self {
            name: name.into(),
            doc_count,
            vector_count,
            status: HealthStatus::from_counts(doc_count, vector_count),
            missing: doc_count.saturating_sub(vector_count),
            detail: None,
            checked_at: Utc::now(),
        }
    }

    /// Build a report for an index that failed to load.
    pub fn corrupted(name: impl Into<String>, doc_count: usize, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc_count,
            vector_count: 0,
            status: HealthStatus::Corrupted,
            missing: doc_count,
            detail: Some(reason.into()),
            checked_at: Utc::now(),
        }
    }
}
