//! Concurrent, order-preserving embedding provider.
//!
//! Wraps an [`EmbeddingModel`] with a bounded pool of in-flight calls, a
//! per-call timeout, and per-item failure tolerance. Results come back in
//! submission order regardless of completion order.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use kbase_types::{EmbeddingSettings, ProgressCallback};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel};

/// Default number of simultaneous embedding calls.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider configuration
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Fixed worker pool size
    pub concurrency: usize,
    /// Timeout applied to each individual call
    pub request_timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ProviderConfig {
    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            concurrency: settings.concurrency.max(1),
            request_timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Rate-limited adapter around a remote embedding capability.
pub struct EmbeddingProvider<M: EmbeddingModel> {
    model: Arc<M>,
    config: ProviderConfig,
}

impl<M: EmbeddingModel> EmbeddingProvider<M> {
    /// Create a new provider.
    pub fn new(model: Arc<M>, config: ProviderConfig) -> Self {
        Self { model, config }
    }

    /// The wrapped model.
    pub fn model(&self) -> &Arc<M> {
        &self.model
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Embed every text concurrently.
    ///
    /// The output has exactly `texts.len()` entries; position `i` holds the
    /// embedding of `texts[i]`, or `None` if that call failed or timed out.
    /// `progress` is invoked once per completion, in completion order, with a
    /// monotonically increasing count.
    pub async fn embed_documents(
        &self,
        texts: &[String],
        progress: &dyn ProgressCallback,
    ) -> Vec<Option<Embedding>> {
        self.embed_documents_detailed(texts, progress)
            .await
            .into_iter()
            .map(Result::ok)
            .collect()
    }

    /// Like [`embed_documents`](Self::embed_documents), but keeps the reason
    /// each failed item failed.
    ///
    /// A vector whose length differs from the batch majority is replaced by
    /// [`EmbeddingError::DimensionMismatch`].
    pub async fn embed_documents_detailed(
        &self,
        texts: &[String],
        progress: &dyn ProgressCallback,
    ) -> Vec<Result<Embedding, EmbeddingError>> {
        let total = texts.len();
        if total == 0 {
            return Vec::new();
        }

        debug!(
            count = total,
            concurrency = self.config.concurrency,
            "Embedding documents"
        );

        let mut completions = stream::iter(0..total)
            .map(|position| {
                let text = texts[position].as_str();
                async move { (position, self.embed_one(text).await) }
            })
            .buffer_unordered(self.config.concurrency);

        let mut outcomes = Vec::with_capacity(total);
        while let Some((position, outcome)) = completions.next().await {
            if let Err(e) = &outcome {
                warn!(position, error = %e, "Embedding failed, skipping item");
            }
            outcomes.push((position, outcome));
            progress.on_progress(outcomes.len(), total);
        }

        outcomes.sort_by_key(|(position, _)| *position);
        let mut results: Vec<Result<Embedding, EmbeddingError>> =
            outcomes.into_iter().map(|(_, outcome)| outcome).collect();
        reject_odd_dimensions(&mut results);

        let failed = results.iter().filter(|r| r.is_err()).count();
        info!(
            total,
            embedded = total - failed,
            failed,
            "Embedding pass complete"
        );

        results
    }

    /// Embed a single query. Failures are returned, not swallowed.
    pub async fn embed_query(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        self.embed_one(text).await
    }

    async fn embed_one(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        match tokio::time::timeout(self.config.request_timeout, self.model.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(EmbeddingError::Timeout(self.config.request_timeout)),
        }
    }
}

/// Fail every vector whose dimension differs from the most common one.
///
/// Ties go to the dimension seen first in submission order.
fn reject_odd_dimensions(results: &mut [Result<Embedding, EmbeddingError>]) {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for embedding in results.iter().flatten() {
        let dim = embedding.dimension();
        match counts.iter_mut().find(|(d, _)| *d == dim) {
            Some((_, n)) => *n += 1,
            None => counts.push((dim, 1)),
        }
    }
    if counts.len() < 2 {
        return;
    }
    let Some(&(expected, _)) = counts.iter().rev().max_by_key(|(_, n)| *n) else {
        return;
    };

    for (position, result) in results.iter_mut().enumerate() {
        let actual = match result {
            Ok(embedding) if embedding.dimension() != expected => embedding.dimension(),
            _ => continue,
        };
        warn!(position, expected, actual, "Embedding has unexpected dimension");
        *result = Err(EmbeddingError::DimensionMismatch { expected, actual });
    }
}

/// Count the `None` entries of an embedding pass.
pub fn count_failures(vectors: &[Option<Embedding>]) -> usize {
    vectors.iter().filter(|v| v.is_none()).count()
}
