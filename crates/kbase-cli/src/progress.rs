//! Terminal rendering of indexing progress.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use kbase_types::ProgressCallback;

/// Renders `(completed, total)` events as a single updating stderr line.
pub struct TerminalProgress {
    label: String,
    interactive: bool,
    last_percent: AtomicUsize,
}

impl TerminalProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            interactive: std::io::stderr().is_terminal(),
            last_percent: AtomicUsize::new(usize::MAX),
        }
    }

    /// Terminate the progress line.
    pub fn finish(&self) {
        if self.interactive && self.last_percent.load(Ordering::SeqCst) != usize::MAX {
            eprintln!();
        }
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, completed: usize, total: usize) {
        if !self.interactive || total == 0 {
            return;
        }
        let percent = completed * 100 / total;
        if self.last_percent.swap(percent, Ordering::SeqCst) == percent && completed != total {
            return;
        }
        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r{}: {}/{} ({}%)",
            self.label, completed, total, percent
        );
        let _ = stderr.flush();
    }
}
