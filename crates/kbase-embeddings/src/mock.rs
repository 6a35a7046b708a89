//! Deterministic in-process embedder for tests and offline runs.
//!
//! Vectors are derived from a hash of the text, so identical texts always
//! embed identically. Failures, outages and latency can be injected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingModel, ModelInfo};

type FailPredicate = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Mock embedder with call accounting and failure injection.
pub struct MockEmbedder {
    info: ModelInfo,
    dimension: usize,
    latency: Duration,
    random_latency: bool,
    fail_when: Option<FailPredicate>,
    outage_after: Option<usize>,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockEmbedder {
    /// Create a mock producing `dimension`-sized vectors.
    pub fn new(dimension: usize) -> Self {
        Self {
            info: ModelInfo {
                name: "mock".to_string(),
                provider: "mock".to_string(),
            },
            dimension,
            latency: Duration::ZERO,
            random_latency: false,
            fail_when: None,
            outage_after: None,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sleep a fixed time in every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self.random_latency = false;
        self
    }

    /// Sleep a random time in `[0, max]` in every call.
    pub fn with_random_latency(mut self, max: Duration) -> Self {
        self.latency = max;
        self.random_latency = true;
        self
    }

    /// Fail every call whose text matches the predicate.
    pub fn fail_when(mut self, predicate: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.fail_when = Some(Box::new(predicate));
        self
    }

    /// Fail every call after the first `calls` calls, simulating a total outage.
    pub fn outage_after(mut self, calls: usize) -> Self {
        self.outage_after = Some(calls);
        self
    }

    /// Embedding dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of `embed` calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls observed running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Number of calls running right now.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// The vector this mock returns for `text`.
    pub fn vector_for(&self, text: &str) -> Embedding {
        // FNV-1a seed, then splitmix64 per component
        let mut state: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in text.as_bytes() {
            state ^= *byte as u64;
            state = state.wrapping_mul(0x0100_0000_01b3);
        }

        let values = (0..self.dimension)
            .map(|_| {
                state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
                let mut z = state;
                z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
                z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
                z ^= z >> 31;
                (z % 2000) as f32 / 1000.0 - 1.0
            })
            .collect();

        Embedding::new(values)
    }

    fn pick_latency(&self) -> Duration {
        if self.random_latency && !self.latency.is_zero() {
            let max_ms = self.latency.as_millis() as u64;
            Duration::from_millis(rand::rng().random_range(0..=max_ms))
        } else {
            self.latency
        }
    }
}

/// Counts a running call until dropped, including when the caller's
/// timeout cancels it mid-sleep.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize, max: &AtomicUsize) -> Self {
        let running = counter.fetch_add(1, Ordering::SeqCst) + 1;
        max.fetch_max(running, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingModel for MockEmbedder {
    fn info(&self) -> &ModelInfo {
        &self.info
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let _running = InFlight::enter(&self.in_flight, &self.max_in_flight);

        let latency = self.pick_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(limit) = self.outage_after {
            if call > limit {
                return Err(EmbeddingError::Http("connection refused".to_string()));
            }
        }

        if let Some(predicate) = &self.fail_when {
            if predicate(text) {
                return Err(EmbeddingError::Status {
                    status: 500,
                    body: "injected failure".to_string(),
                });
            }
        }

        Ok(self.vector_for(text))
    }
}
