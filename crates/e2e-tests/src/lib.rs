//! End-to-end test infrastructure for kbase.
//!
//! Provides a shared TestHarness and helper functions for tests covering
//! the save, resume, health and query paths through the service facade.

use std::sync::Arc;
use std::time::Duration;

use kbase_embeddings::MockEmbedder;
use kbase_service::{KnowledgeBaseService, ServiceOptions};
use kbase_storage::{KbLayout, KbPaths};
use kbase_types::Record;

/// Embedding dimension used throughout the end-to-end tests.
pub const DIMENSION: usize = 32;

/// Shared test harness: one knowledge base root in a temp directory.
///
/// Services built from the same harness see the same files, which lets a
/// test simulate a process restart by building a second service.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    pub layout: KbLayout,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let layout = KbLayout::new(temp_dir.path());
        Self {
            _temp_dir: temp_dir,
            layout,
        }
    }

    /// Service options with no inter-batch delay.
    pub fn options(&self) -> ServiceOptions {
        let mut options = ServiceOptions::default();
        options.controller = options.controller.with_batch_delay(Duration::ZERO);
        options
    }

    /// Build a service over the harness root.
    ///
    /// The mock is returned alongside so tests can read its call counters.
    pub fn service(
        &self,
        mock: MockEmbedder,
    ) -> (KnowledgeBaseService<MockEmbedder>, Arc<MockEmbedder>) {
        self.service_with(mock, self.options())
    }

    pub fn service_with(
        &self,
        mock: MockEmbedder,
        options: ServiceOptions,
    ) -> (KnowledgeBaseService<MockEmbedder>, Arc<MockEmbedder>) {
        let mock = Arc::new(mock);
        let service = KnowledgeBaseService::new(self.layout.clone(), mock.clone(), options);
        (service, mock)
    }

    pub fn paths(&self, name: &str) -> KbPaths {
        self.layout.paths(name).expect("Invalid knowledge base name")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// `count` records with content `"{prefix} {i}"`.
pub fn numbered_records(prefix: &str, count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| Record::new(format!("{} {}", prefix, i)))
        .collect()
}
