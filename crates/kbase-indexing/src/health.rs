//! Consistency classification of a knowledge base.
//!
//! Compares the document log length with the persisted vector count. Health
//! checks only observe; they never repair.

use tracing::{debug, warn};

use kbase_storage::{DocumentLog, StorageError};
use kbase_types::HealthReport;
use kbase_vector::{HnswConfig, VectorError, VectorStore};

use crate::error::IndexingError;

/// Reads both stores of a knowledge base and reports their agreement.
#[derive(Debug, Clone)]
pub struct HealthChecker {
    log: DocumentLog,
    hnsw: HnswConfig,
}

impl HealthChecker {
    pub fn new(log: DocumentLog, hnsw: HnswConfig) -> Self {
        Self { log, hnsw }
    }

    /// Classify a knowledge base.
    ///
    /// Corruption of either store is reported as data, with the reason in
    /// `detail`. Other IO failures are returned as errors.
    pub fn classify(&self, name: &str) -> Result<HealthReport, IndexingError> {
        let paths = self.log.layout().paths(name)?;

        let doc_count = match self.log.count(name) {
            Ok(count) => count,
            Err(StorageError::Corrupted { reason, .. }) => {
                warn!(kb = %name, %reason, "Document log is corrupted");
                return Ok(HealthReport::corrupted(
                    name,
                    0,
                    format!("document log: {}", reason),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let vector_count = match VectorStore::load(&paths, &self.hnsw) {
            Ok(store) => store.count(),
            Err(VectorError::Missing(_)) => 0,
            Err(VectorError::Corrupted { reason, .. }) => {
                warn!(kb = %name, %reason, "Vector index is corrupted");
                return Ok(HealthReport::corrupted(
                    name,
                    doc_count,
                    format!("vector index: {}", reason),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let report = HealthReport::from_counts(name, doc_count, vector_count);
        debug!(
            kb = %name,
            doc_count,
            vector_count,
            status = %report.status,
            "Classified knowledge base"
        );
        Ok(report)
    }
}
