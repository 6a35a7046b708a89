//! Indexing controller: incremental saves and resumable recovery.
//!
//! The document log is always written before any embedding is attempted, and
//! every extension of the vector index is persisted before the next batch
//! starts. A crash therefore loses at most the batch in flight.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use kbase_embeddings::{Embedding, EmbeddingError, EmbeddingModel, EmbeddingProvider};
use kbase_storage::{DocumentLog, KbLayout, KbPaths};
use kbase_types::{IndexingSettings, OffsetProgress, ProgressCallback, Record};
use kbase_vector::{HnswConfig, VectorError, VectorStore};

use crate::checkpoint::{Checkpoint, ResumeProgress};
use crate::error::IndexingError;
use crate::locks::KbLocks;

/// Controller configuration
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Records per resume batch
    pub batch_size: usize,
    /// Pause between resume batches
    pub batch_delay: Duration,
    /// Language tag used when a save does not name one
    pub default_language: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            batch_delay: Duration::from_millis(500),
            default_language: "en".to_string(),
        }
    }
}

impl ControllerConfig {
    pub fn from_settings(settings: &IndexingSettings) -> Self {
        Self {
            batch_size: settings.batch_size,
            batch_delay: Duration::from_millis(settings.batch_delay_ms),
            default_language: settings.default_language.clone(),
        }
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }
}

/// Result of [`IndexingController::save_kb`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Log length after the append
    pub doc_count: usize,
    /// Persisted vector count after the save
    pub vector_count: usize,
    /// Vectors added by this save
    pub added: usize,
    /// New records whose embedding failed
    pub failed: usize,
}

/// Orchestrates the document log, the embedding provider and the vector
/// index of every knowledge base under one root.
pub struct IndexingController<M: EmbeddingModel> {
    log: DocumentLog,
    provider: Arc<EmbeddingProvider<M>>,
    hnsw: HnswConfig,
    locks: KbLocks,
    config: ControllerConfig,
}

impl<M: EmbeddingModel> IndexingController<M> {
    pub fn new(
        layout: KbLayout,
        provider: Arc<EmbeddingProvider<M>>,
        hnsw: HnswConfig,
        config: ControllerConfig,
    ) -> Self {
        Self {
            log: DocumentLog::new(layout),
            provider,
            hnsw,
            locks: KbLocks::new(),
            config,
        }
    }

    pub fn log(&self) -> &DocumentLog {
        &self.log
    }

    pub fn hnsw(&self) -> &HnswConfig {
        &self.hnsw
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Append records and embed them.
    ///
    /// The records are language-tagged and logged unconditionally. Only the
    /// new records are embedded; those whose embedding fails stay in the log
    /// and show up as missing vectors in the health report.
    pub async fn save_kb(
        &self,
        name: &str,
        records: Vec<Record>,
        language: Option<&str>,
        progress: &dyn ProgressCallback,
    ) -> Result<SaveOutcome, IndexingError> {
        let paths = self.log.layout().paths(name)?;
        let _guard = self.locks.acquire(name).await;

        let language = language.unwrap_or(&self.config.default_language);
        let records: Vec<Record> = records
            .into_iter()
            .map(|record| record.with_language(language))
            .collect();

        let doc_count = self.log.append(name, &records)?;

        if records.is_empty() {
            let vector_count = VectorStore::load_if_present(&paths, &self.hnsw)?
                .map(|store| store.count())
                .unwrap_or(0);
            return Ok(SaveOutcome {
                doc_count,
                vector_count,
                added: 0,
                failed: 0,
            });
        }

        let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
        let vectors = self.provider.embed_documents(&texts, progress).await;
        let valid = pair_valid(records, vectors);
        let failed = texts.len() - valid.len();

        if valid.is_empty() {
            warn!(
                kb = %name,
                failed,
                "No embeddings succeeded; records are logged but not indexed"
            );
            let vector_count = VectorStore::load_if_present(&paths, &self.hnsw)?
                .map(|store| store.count())
                .unwrap_or(0);
            return Ok(SaveOutcome {
                doc_count,
                vector_count,
                added: 0,
                failed,
            });
        }

        let added = valid.len();
        let store = match VectorStore::load_if_present(&paths, &self.hnsw)? {
            Some(mut store) => {
                store.add_entries(valid)?;
                store
            }
            None => VectorStore::from_entries(valid, &self.hnsw)?,
        };
        store.save(&paths)?;

        info!(
            kb = %name,
            doc_count,
            vector_count = store.count(),
            added,
            failed,
            "Saved knowledge base"
        );

        Ok(SaveOutcome {
            doc_count,
            vector_count: store.count(),
            added,
            failed,
        })
    }

    /// Embed whatever the log holds beyond the persisted vector count.
    ///
    /// Returns `(current, total)` after the run. Items that fail are skipped,
    /// and so is a batch in which every item fails for its own reasons; the
    /// run moves on to the next batch and `current` stays below `total`.
    /// Only a multi-item batch in which every call failed to reach the
    /// service stops the run with [`IndexingError::BatchFailed`]. All
    /// earlier batches are already on disk, so calling again continues from
    /// the failed batch. A corrupted index is rebuilt from position 0.
    pub async fn resume_kb_embedding(
        &self,
        name: &str,
        batch_size: Option<usize>,
        progress: &dyn ProgressCallback,
    ) -> Result<ResumeProgress, IndexingError> {
        let paths = self.log.layout().paths(name)?;
        let batch_size = batch_size.unwrap_or(self.config.batch_size);
        let _guard = self.locks.acquire(name).await;

        let records = self.log.read_all(name)?;
        let mut store = self.load_for_resume(&paths)?;

        let mut checkpoint = Checkpoint::new(
            store.as_ref().map(|s| s.count()).unwrap_or(0),
            records.len(),
        );

        if checkpoint.is_complete() {
            debug!(
                kb = %name,
                current = checkpoint.committed,
                total = checkpoint.total,
                "Nothing to resume"
            );
            return Ok(checkpoint.into());
        }

        let batches = checkpoint.plan_batches(batch_size)?;
        info!(
            kb = %name,
            current = checkpoint.committed,
            total = checkpoint.total,
            batches = batches.len(),
            batch_size,
            "Resuming embedding"
        );

        let batch_count = batches.len();
        for (i, range) in batches.into_iter().enumerate() {
            let batch = &records[range.clone()];
            let texts: Vec<String> = batch.iter().map(|r| r.content.clone()).collect();

            let batch_progress = OffsetProgress::new(progress, range.start, records.len());
            let outcomes = self
                .provider
                .embed_documents_detailed(&texts, &batch_progress)
                .await;

            if let Some(reason) = outage_reason(&outcomes) {
                warn!(
                    kb = %name,
                    start = range.start,
                    end = range.end,
                    committed = checkpoint.committed,
                    %reason,
                    "Embedding service unreachable for whole batch, stopping"
                );
                return Err(IndexingError::BatchFailed {
                    start: range.start,
                    end: range.end,
                    reason,
                });
            }

            let vectors = outcomes.into_iter().map(Result::ok).collect();
            let valid = pair_valid(batch.to_vec(), vectors);

            if valid.is_empty() {
                warn!(
                    kb = %name,
                    start = range.start,
                    end = range.end,
                    "Every embedding in batch failed, skipping batch"
                );
            } else {
                let added = valid.len();
                let committed = match store.as_mut() {
                    Some(existing) => existing.add_entries(valid)?,
                    None => {
                        let created = VectorStore::from_entries(valid, &self.hnsw)?;
                        store.insert(created).count()
                    }
                };
                if let Some(current) = store.as_ref() {
                    current.save(&paths)?;
                }
                checkpoint.advance(added);

                info!(
                    kb = %name,
                    batch = i + 1,
                    of = batch_count,
                    added,
                    failed = texts.len() - added,
                    committed,
                    total = checkpoint.total,
                    "Committed batch"
                );
            }

            if i + 1 < batch_count && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        Ok(checkpoint.into())
    }

    /// Remove a knowledge base wholesale. Returns whether it existed.
    pub async fn delete_kb(&self, name: &str) -> Result<bool, IndexingError> {
        let paths = self.log.layout().paths(name)?;
        let guard = self.locks.acquire(name).await;

        let removed = self.remove_files(&paths);
        self.locks.release(name, guard);

        let existed = removed?;
        if existed {
            info!(kb = %name, "Deleted knowledge base");
        }
        Ok(existed)
    }

    fn remove_files(&self, paths: &KbPaths) -> Result<bool, IndexingError> {
        let had_log = self.log.delete(&paths.name)?;
        let had_vectors = VectorStore::delete_files(paths)?;
        let had_dir = self.log.layout().remove(&paths.name)?;
        Ok(had_log || had_vectors || had_dir)
    }

    fn load_for_resume(&self, paths: &KbPaths) -> Result<Option<VectorStore>, IndexingError> {
        match VectorStore::load(paths, &self.hnsw) {
            Ok(store) => Ok(Some(store)),
            Err(VectorError::Missing(_)) => Ok(None),
            Err(VectorError::Corrupted { path, reason }) => {
                warn!(
                    kb = %paths.name,
                    path = ?path,
                    %reason,
                    "Vector index is corrupted, rebuilding from scratch"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Why a batch counts as a service outage, if it does.
///
/// Single items and content-specific failures never do, so one bad record
/// cannot stop a resume.
fn outage_reason(outcomes: &[Result<Embedding, EmbeddingError>]) -> Option<String> {
    if outcomes.len() < 2 {
        return None;
    }
    let mut first = None;
    for outcome in outcomes {
        match outcome {
            Err(e) if e.is_transport() => {
                if first.is_none() {
                    first = Some(e.to_string());
                }
            }
            _ => return None,
        }
    }
    first.map(|e| format!("all {} calls failed to reach the service: {}", outcomes.len(), e))
}

/// Zip records with their embeddings, dropping failed positions.
fn pair_valid(records: Vec<Record>, vectors: Vec<Option<Embedding>>) -> Vec<(Record, Embedding)> {
    records
        .into_iter()
        .zip(vectors)
        .filter_map(|(record, vector)| vector.map(|v| (record, v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_embeddings::{MockEmbedder, ProviderConfig};
    use kbase_types::NoOpProgress;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn build(
        temp: &TempDir,
        mock: MockEmbedder,
    ) -> (IndexingController<MockEmbedder>, Arc<MockEmbedder>) {
        let mock = Arc::new(mock);
        let provider = Arc::new(EmbeddingProvider::new(mock.clone(), ProviderConfig::default()));
        let config = ControllerConfig::default().with_batch_delay(Duration::ZERO);
        let controller = IndexingController::new(
            KbLayout::new(temp.path()),
            provider,
            HnswConfig::default(),
            config,
        );
        (controller, mock)
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::new(format!("doc {}", i))).collect()
    }

    #[tokio::test]
    async fn test_save_tags_language_and_indexes() {
        let temp = TempDir::new().unwrap();
        let (controller, mock) = build(&temp, MockEmbedder::new(8));

        let outcome = controller
            .save_kb("docs", records(3), Some("de"), &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SaveOutcome { doc_count: 3, vector_count: 3, added: 3, failed: 0 }
        );
        assert_eq!(mock.call_count(), 3);

        let logged = controller.log().read_all("docs").unwrap();
        assert!(logged.iter().all(|r| r.language() == Some("de")));

        let outcome = controller
            .save_kb("docs", records(2), None, &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(outcome.doc_count, 5);
        assert_eq!(outcome.vector_count, 5);
        // Only the new records are embedded
        assert_eq!(mock.call_count(), 5);
        let logged = controller.log().read_all("docs").unwrap();
        assert_eq!(logged[4].language(), Some("en"));
    }

    #[tokio::test]
    async fn test_save_total_failure_still_logs() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(&temp, MockEmbedder::new(8).fail_when(|_| true));

        let outcome = controller
            .save_kb("docs", records(4), None, &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            SaveOutcome { doc_count: 4, vector_count: 0, added: 0, failed: 4 }
        );
        let paths = controller.log().layout().paths("docs").unwrap();
        assert!(!paths.has_vector_files());
    }

    #[tokio::test]
    async fn test_save_on_corrupted_index_fails_after_logging() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(&temp, MockEmbedder::new(8));
        let paths = controller.log().layout().paths("docs").unwrap();
        std::fs::create_dir_all(&paths.dir).unwrap();
        std::fs::write(&paths.vector_index, b"garbage").unwrap();

        let err = controller
            .save_kb("docs", records(2), None, &NoOpProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexingError::Vector(VectorError::Corrupted { .. })));
        assert_eq!(controller.log().count("docs").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_resume_fills_gap_with_absolute_progress() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(&temp, MockEmbedder::new(8).fail_when(|_| true));
        controller
            .save_kb("docs", records(7), None, &NoOpProgress)
            .await
            .unwrap();

        let (controller, mock) = build(&temp, MockEmbedder::new(8));
        let seen = Mutex::new(Vec::new());
        let progress = |completed: usize, total: usize| {
            seen.lock().unwrap().push((completed, total));
        };

        let result = controller
            .resume_kb_embedding("docs", Some(3), &progress)
            .await
            .unwrap();
        assert_eq!(result, ResumeProgress { current: 7, total: 7 });
        assert!(result.is_complete());
        assert_eq!(mock.call_count(), 7);

        let seen = seen.into_inner().unwrap();
        let expected: Vec<(usize, usize)> = (1..=7).map(|c| (c, 7)).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_resume_rebuilds_corrupted_index() {
        let temp = TempDir::new().unwrap();
        let (controller, mock) = build(&temp, MockEmbedder::new(8));
        controller.log().append("docs", &records(5)).unwrap();
        let paths = controller.log().layout().paths("docs").unwrap();
        std::fs::write(&paths.vector_index, b"garbage").unwrap();

        let result = controller
            .resume_kb_embedding("docs", None, &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(result, ResumeProgress { current: 5, total: 5 });
        assert_eq!(mock.call_count(), 5);
        assert_eq!(VectorStore::load(&paths, &HnswConfig::default()).unwrap().count(), 5);
    }

    #[tokio::test]
    async fn test_resume_rejects_zero_batch() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(&temp, MockEmbedder::new(8));
        controller.log().append("docs", &records(2)).unwrap();
        assert!(matches!(
            controller.resume_kb_embedding("docs", Some(0), &NoOpProgress).await,
            Err(IndexingError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_resume_on_corrupted_log_fails() {
        let temp = TempDir::new().unwrap();
        let (controller, mock) = build(&temp, MockEmbedder::new(8));
        let paths = controller.log().layout().paths("docs").unwrap();
        std::fs::create_dir_all(&paths.dir).unwrap();
        std::fs::write(&paths.documents, b"[{").unwrap();

        assert!(controller
            .resume_kb_embedding("docs", None, &NoOpProgress)
            .await
            .is_err());
        assert_eq!(mock.call_count(), 0);
        assert_eq!(std::fs::read(&paths.documents).unwrap(), b"[{");
    }

    #[tokio::test]
    async fn test_delete() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(&temp, MockEmbedder::new(8));
        controller
            .save_kb("docs", records(3), None, &NoOpProgress)
            .await
            .unwrap();

        assert!(controller.delete_kb("docs").await.unwrap());
        assert!(controller.locks.is_empty());
        assert!(!controller.delete_kb("docs").await.unwrap());
        assert!(controller.log().layout().list().unwrap().is_empty());
        assert!(controller.locks.is_empty());
    }

    fn persisted_contents(controller: &IndexingController<MockEmbedder>) -> Vec<String> {
        let paths = controller.log().layout().paths("docs").unwrap();
        VectorStore::load(&paths, &HnswConfig::default())
            .unwrap()
            .entries()
            .iter()
            .map(|r| r.content.clone())
            .collect()
    }

    #[tokio::test]
    async fn test_failing_record_does_not_block_later_records() {
        let temp = TempDir::new().unwrap();
        let (controller, mock) = build(&temp, MockEmbedder::new(8).fail_when(|t| t == "doc 3"));
        controller.log().append("docs", &records(6)).unwrap();

        let result = controller
            .resume_kb_embedding("docs", Some(1), &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(result, ResumeProgress { current: 5, total: 6 });
        assert_eq!(mock.call_count(), 6);
        assert_eq!(
            persisted_contents(&controller),
            vec!["doc 0", "doc 1", "doc 2", "doc 4", "doc 5"]
        );
    }

    #[tokio::test]
    async fn test_batch_of_rejected_records_is_skipped() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(
            &temp,
            MockEmbedder::new(8).fail_when(|t| t == "doc 2" || t == "doc 3"),
        );
        controller.log().append("docs", &records(6)).unwrap();

        let result = controller
            .resume_kb_embedding("docs", Some(2), &NoOpProgress)
            .await
            .unwrap();
        assert_eq!(result, ResumeProgress { current: 4, total: 6 });
        assert_eq!(
            persisted_contents(&controller),
            vec!["doc 0", "doc 1", "doc 4", "doc 5"]
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_stops_resume() {
        let temp = TempDir::new().unwrap();
        let (controller, mock) = build(&temp, MockEmbedder::new(8).outage_after(2));
        controller.log().append("docs", &records(6)).unwrap();

        let err = controller
            .resume_kb_embedding("docs", Some(2), &NoOpProgress)
            .await
            .unwrap_err();
        match err {
            IndexingError::BatchFailed { start, end, reason } => {
                assert_eq!((start, end), (2, 4));
                assert!(reason.contains("connection refused"), "{reason}");
            }
            other => panic!("Expected BatchFailed, got {:?}", other),
        }
        // The failed batch is the last one attempted
        assert_eq!(mock.call_count(), 4);
        assert_eq!(persisted_contents(&controller), vec!["doc 0", "doc 1"]);
    }

    #[test]
    fn test_outage_needs_several_transport_failures() {
        let refused = || -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::Http("connection refused".to_string()))
        };
        let rejected = || -> Result<Embedding, EmbeddingError> {
            Err(EmbeddingError::Status {
                status: 500,
                body: String::new(),
            })
        };

        assert!(outage_reason(&[refused()]).is_none());
        assert!(outage_reason(&[refused(), rejected()]).is_none());
        assert!(outage_reason(&[refused(), Ok(Embedding::new(vec![1.0]))]).is_none());
        assert!(outage_reason(&[refused(), refused()]).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_saves_are_serialized() {
        let temp = TempDir::new().unwrap();
        let (controller, _) = build(
            &temp,
            MockEmbedder::new(8).with_random_latency(Duration::from_millis(5)),
        );
        let controller = Arc::new(controller);

        let mut handles = Vec::new();
        for _ in 0..4 {
            let controller = controller.clone();
            handles.push(tokio::spawn(async move {
                controller
                    .save_kb("docs", records(5), None, &NoOpProgress)
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(controller.log().count("docs").unwrap(), 20);
        let paths = controller.log().layout().paths("docs").unwrap();
        assert_eq!(VectorStore::load(&paths, &HnswConfig::default()).unwrap().count(), 20);
    }
}
