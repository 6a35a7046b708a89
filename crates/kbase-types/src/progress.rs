//! Progress reporting contract.
//!
//! The engine emits `(completed, total)` events; whoever renders them owns
//! the presentation. Implementations are called from the task driving the
//! work, never from embedding workers.

use tracing::info;

/// Receiver of `(completed, total)` progress events.
pub trait ProgressCallback: Send + Sync {
    /// Called after each processed item, successful or not.
    fn on_progress(&self, completed: usize, total: usize);
}

impl<F> ProgressCallback for F
where
    F: Fn(usize, usize) + Send + Sync,
{
    fn on_progress(&self, completed: usize, total: usize) {
        self(completed, total)
    }
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _completed: usize, _total: usize) {}
}

/// A callback that logs progress at info level every `every` items.
pub struct LoggingProgress {
    label: String,
    every: usize,
}

impl LoggingProgress {
    /// Create a new logging progress callback.
    pub fn new(label: impl Into<String>, every: usize) -> Self {
        Self {
            label: label.into(),
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LoggingProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        if completed.is_multiple_of(self.every) || completed == total {
            info!(task = %self.label, completed, total, "Progress");
        }
    }
}

/// Shifts a batch-local counter onto a run-wide scale.
///
/// Used by resumable indexing, where each batch reports `1..=batch_len` but
/// the caller wants `offset + k` out of the knowledge base total.
pub struct OffsetProgress<'a> {
    inner: &'a dyn ProgressCallback,
    offset: usize,
    total: usize,
}

impl<'a> OffsetProgress<'a> {
    pub fn new(inner: &'a dyn ProgressCallback, offset: usize, total: usize) -> Self {
        Self {
            inner,
            offset,
            total,
        }
    }
}

impl ProgressCallback for OffsetProgress<'_> {
    fn on_progress(&self, completed: usize, _total: usize) {
        self.inner.on_progress(self.offset + completed, self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_closure_callback() {
        let seen = Mutex::new(Vec::new());
        let callback = |completed: usize, total: usize| {
            seen.lock().unwrap().push((completed, total));
        };
        callback.on_progress(1, 3);
        callback.on_progress(2, 3);
        assert_eq!(*seen.lock().unwrap(), vec![(1, 3), (2, 3)]);
    }

    #[test]
    fn test_offset_progress() {
        let seen = Mutex::new(Vec::new());
        let callback = |completed: usize, total: usize| {
            seen.lock().unwrap().push((completed, total));
        };
        let offset = OffsetProgress::new(&callback, 40, 100);
        offset.on_progress(1, 10);
        offset.on_progress(10, 10);
        assert_eq!(*seen.lock().unwrap(), vec![(41, 100), (50, 100)]);
    }

    #[test]
    fn test_noop_and_logging_do_not_panic() {
        NoOpProgress.on_progress(1, 1);
        let logging = LoggingProgress::new("test", 0);
        logging.on_progress(1, 2);
        logging.on_progress(2, 2);
    }
}
