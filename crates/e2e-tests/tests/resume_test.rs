//! Resume and checkpoint tests.
//!
//! A resume embeds only what the log holds beyond the persisted vector
//! count, commits batch by batch, and never moves the checkpoint backwards.

use pretty_assertions::assert_eq;

use e2e_tests::{numbered_records, TestHarness, DIMENSION};
use kbase_embeddings::MockEmbedder;
use kbase_indexing::IndexingError;
use kbase_service::{HealthStatus, ServiceError};
use kbase_types::NoOpProgress;

/// Resuming a fully embedded knowledge base reports `(n, n)` and makes no
/// embedding calls.
#[tokio::test]
async fn test_resume_is_idempotent() {
    let harness = TestHarness::new();
    let (service, _) = harness.service(MockEmbedder::new(DIMENSION));
    service
        .save_kb("notes", numbered_records("doc", 9), None, &NoOpProgress)
        .await
        .unwrap();

    let (service, mock) = harness.service(MockEmbedder::new(DIMENSION));
    let progress = service
        .resume_kb_embedding("notes", Some(4), &NoOpProgress)
        .await
        .unwrap();

    assert_eq!((progress.current, progress.total), (9, 9));
    assert_eq!(mock.call_count(), 0);

    let again = service
        .resume_kb_embedding("notes", None, &NoOpProgress)
        .await
        .unwrap();
    assert_eq!((again.current, again.total), (9, 9));
    assert_eq!(mock.call_count(), 0);
}

/// An outage in the middle of a resume keeps every committed batch; the
/// next run picks up exactly where the failed batch started.
#[tokio::test]
async fn test_checkpoint_survives_outage() {
    let harness = TestHarness::new();

    // Log 12 records without any vectors
    let (service, _) = harness.service(MockEmbedder::new(DIMENSION).fail_when(|_| true));
    let outcome = service
        .save_kb("notes", numbered_records("doc", 12), None, &NoOpProgress)
        .await
        .unwrap();
    assert_eq!(outcome.doc_count, 12);
    assert_eq!(outcome.vector_count, 0);
    assert_eq!(outcome.failed, 12);

    // Two batches of 4 succeed, then the service goes down
    let (service, _) = harness.service(MockEmbedder::new(DIMENSION).outage_after(8));
    let err = service
        .resume_kb_embedding("notes", Some(4), &NoOpProgress)
        .await
        .unwrap_err();
    match err {
        ServiceError::Indexing(IndexingError::BatchFailed { start, end, .. }) => {
            assert_eq!((start, end), (8, 12));
        }
        other => panic!("Expected BatchFailed, got {:?}", other),
    }

    let report = service.get_kb_details("notes").unwrap();
    assert_eq!(report.vector_count, 8);
    assert_eq!(report.status, HealthStatus::Mismatch);
    assert_eq!(report.missing, 4);

    // A fresh run embeds only the remaining 4
    let (service, mock) = harness.service(MockEmbedder::new(DIMENSION));
    let progress = service
        .resume_kb_embedding("notes", Some(4), &NoOpProgress)
        .await
        .unwrap();
    assert_eq!((progress.current, progress.total), (12, 12));
    assert_eq!(mock.call_count(), 4);
    assert_eq!(
        service.get_kb_details("notes").unwrap().status,
        HealthStatus::Healthy
    );
}

/// Progress reported during a resume is absolute and never decreases.
#[tokio::test]
async fn test_resume_progress_is_monotonic() {
    use std::sync::Mutex;

    let harness = TestHarness::new();
    let (service, _) = harness.service(MockEmbedder::new(DIMENSION).fail_when(|_| true));
    service
        .save_kb("notes", numbered_records("doc", 10), None, &NoOpProgress)
        .await
        .unwrap();

    let seen = Mutex::new(Vec::new());
    let progress = |completed: usize, total: usize| {
        seen.lock().unwrap().push((completed, total));
    };

    let (service, _) = harness.service(MockEmbedder::new(DIMENSION));
    service
        .resume_kb_embedding("notes", Some(3), &progress)
        .await
        .unwrap();

    let seen = seen.into_inner().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|(_, total)| *total == 10));
    assert!(seen.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(seen.last().map(|(c, _)| *c), Some(10));
}

/// A resume after a partially failed save reconciles the counts, not the
/// positions: it embeds `log[8..10]` a second time and the two failed records
/// stay unembedded. Positions 2 to 7 hold later records than the log does,
/// and the last two positions repeat "doc 8" and "doc 9".
#[tokio::test]
async fn test_partial_failure_then_resume() {
    let harness = TestHarness::new();
    let (service, _) = harness.service(
        MockEmbedder::new(DIMENSION).fail_when(|text| text == "doc 2" || text == "doc 5"),
    );

    let outcome = service
        .save_kb("notes", numbered_records("doc", 10), None, &NoOpProgress)
        .await
        .unwrap();
    assert_eq!(outcome.added, 8);
    assert_eq!(outcome.failed, 2);

    let report = service.get_kb_details("notes").unwrap();
    assert_eq!(report.doc_count, 10);
    assert_eq!(report.vector_count, 8);
    assert_eq!(report.status, HealthStatus::Mismatch);
    assert_eq!(report.missing, 2);

    let (service, mock) = harness.service(MockEmbedder::new(DIMENSION));
    let progress = service
        .resume_kb_embedding("notes", None, &NoOpProgress)
        .await
        .unwrap();
    assert_eq!((progress.current, progress.total), (10, 10));
    assert_eq!(mock.call_count(), 2);
    assert_eq!(
        service.get_kb_details("notes").unwrap().status,
        HealthStatus::Healthy
    );

    let contents: Vec<String> = (0..10)
        .map(|position| service.get_chunk_vector("notes", position).unwrap().content)
        .collect();
    assert_eq!(
        contents,
        vec![
            "doc 0", "doc 1", "doc 3", "doc 4", "doc 6", "doc 7", "doc 8", "doc 9", "doc 8",
            "doc 9",
        ]
    );
}

/// A record the service always rejects is skipped; the records after it
/// are still embedded, even one batch at a time.
#[tokio::test]
async fn test_rejected_record_does_not_block_resume() {
    let harness = TestHarness::new();
    let (service, _) = harness.service(MockEmbedder::new(DIMENSION).fail_when(|_| true));
    service
        .save_kb("notes", numbered_records("doc", 6), None, &NoOpProgress)
        .await
        .unwrap();

    let (service, mock) =
        harness.service(MockEmbedder::new(DIMENSION).fail_when(|text| text == "doc 3"));
    let progress = service
        .resume_kb_embedding("notes", Some(1), &NoOpProgress)
        .await
        .unwrap();
    assert_eq!((progress.current, progress.total), (5, 6));
    assert_eq!(mock.call_count(), 6);

    let report = service.get_kb_details("notes").unwrap();
    assert_eq!(report.status, HealthStatus::Mismatch);
    assert_eq!(report.missing, 1);
    assert_eq!(
        service.get_chunk_vector("notes", 4).unwrap().content,
        "doc 5"
    );
}

/// A corrupted vector index is reported, then rebuilt from scratch.
#[tokio::test]
async fn test_corrupted_index_is_rebuilt() {
    let harness = TestHarness::new();
    let (service, _) = harness.service(MockEmbedder::new(DIMENSION));
    service
        .save_kb("notes", numbered_records("doc", 6), None, &NoOpProgress)
        .await
        .unwrap();

    std::fs::write(harness.paths("notes").vector_meta, b"{ not json").unwrap();

    let report = service.get_kb_details("notes").unwrap();
    assert_eq!(report.status, HealthStatus::Corrupted);
    assert!(report.detail.is_some());

    let (service, mock) = harness.service(MockEmbedder::new(DIMENSION));
    let progress = service
        .resume_kb_embedding("notes", Some(4), &NoOpProgress)
        .await
        .unwrap();
    assert_eq!((progress.current, progress.total), (6, 6));
    assert_eq!(mock.call_count(), 6);
    assert_eq!(
        service.get_kb_details("notes").unwrap().status,
        HealthStatus::Healthy
    );
}
