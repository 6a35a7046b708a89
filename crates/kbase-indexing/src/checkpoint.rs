//! Checkpoint tracking for resumable indexing.
//!
//! There is no checkpoint file. The persisted vector count is the number of
//! log entries already embedded, and the work left is the log suffix after
//! it.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::IndexingError;

/// Indexing progress of one knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Vectors durably committed
    pub committed: usize,
    /// Records in the document log
    pub total: usize,
}

impl Checkpoint {
    pub fn new(committed: usize, total: usize) -> Self {
        Self { committed, total }
    }

    /// Whether every log entry has a committed vector.
    pub fn is_complete(&self) -> bool {
        self.committed >= self.total
    }

    /// Number of log entries still to embed.
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.committed)
    }

    /// Log positions still to embed.
    pub fn remaining_range(&self) -> Range<usize> {
        self.committed.min(self.total)..self.total
    }

    /// Split the remaining positions into consecutive batches.
    pub fn plan_batches(&self, batch_size: usize) -> Result<Vec<Range<usize>>, IndexingError> {
        if batch_size == 0 {
            return Err(IndexingError::InvalidInput(
                "batch size must be positive".to_string(),
            ));
        }

        let range = self.remaining_range();
        Ok((range.start..range.end)
            .step_by(batch_size)
            .map(|start| start..(start + batch_size).min(range.end))
            .collect())
    }

    /// Record vectors committed by one batch.
    pub fn advance(&mut self, committed: usize) {
        self.committed += committed;
    }
}

/// Result of a resume call: `(current, total)` after the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeProgress {
    pub current: usize,
    pub total: usize,
}

impl ResumeProgress {
    /// Fully caught up; otherwise call resume again.
    pub fn is_complete(&self) -> bool {
        self.current >= self.total
    }
}

impl From<Checkpoint> for ResumeProgress {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            current: checkpoint.committed,
            total: checkpoint.total,
        }
    }
}
