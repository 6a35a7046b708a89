//! Per-knowledge-base write locks.
//!
//! Writers of the same knowledge base run one at a time; writers of
//! different knowledge bases do not contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// Registry of named async mutexes.
#[derive(Debug, Clone, Default)]
pub struct KbLocks {
    inner: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl KbLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `name`.
    pub async fn acquire(&self, name: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
            map.entry(name.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        debug!(kb = %name, "Waiting for knowledge base lock");
        lock.lock_owned().await
    }

    /// Release `guard` and forget the name if nobody else holds or awaits
    /// its lock. Used once the knowledge base no longer exists.
    pub fn release(&self, name: &str, guard: OwnedMutexGuard<()>) {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        drop(guard);
        // Waiters hold a clone of the Arc, so a count of one means only the
        // registry refers to it
        if map.get(name).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(name);
            debug!(kb = %name, "Evicted knowledge base lock");
        }
    }

    /// Number of names with a registered lock.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
