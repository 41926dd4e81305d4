//! Keyed debounce registry for persistence writes
//!
//! Each key owns at most one pending task. Scheduling under a key that
//! already has a pending task aborts that task first, so a burst of drag
//! events collapses into a single write once the burst settles.
//!
//! A task unregisters itself when its delay elapses, before its future
//! starts running. Rescheduling can therefore cancel a write that is still
//! waiting, but never a request that is already in flight.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

/// Registry of cancellable delayed tasks keyed by correlation id
#[derive(Default)]
pub struct PersistScheduler {
    pending: Mutex<HashMap<String, Pending>>,
    generation: AtomicU64,
}

impl PersistScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Run `task` after `delay`, replacing any task pending under `key`
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(self: &Arc<Self>, key: impl Into<String>, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let registry: Weak<Self> = Arc::downgrade(self);
        let task_key = key.clone();

        // Held across the spawn so `release` cannot run before the insert.
        let mut pending = self.pending.lock();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(registry) = registry.upgrade() {
                registry.release(&task_key, generation);
            }
            task.await;
        });

        let replaced = pending.insert(key.clone(), Pending { generation, handle });
        drop(pending);
        if let Some(previous) = replaced {
            previous.handle.abort();
            log::debug!("Rescheduled pending write '{}'", key);
        }
    }

    /// Cancel the task pending under `key`. Returns true if one was pending.
    pub fn cancel(&self, key: &str) -> bool {
        match self.pending.lock().remove(key) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every task whose key starts with `prefix`
    pub fn cancel_prefix(&self, prefix: &str) -> usize {
        let mut pending = self.pending.lock();
        let keys: Vec<String> = pending
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            if let Some(p) = pending.remove(key) {
                p.handle.abort();
            }
        }
        keys.len()
    }

    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.lock().contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop the registry entry for `key` if it still belongs to `generation`
    fn release(&self, key: &str, generation: u64) {
        let mut pending = self.pending.lock();
        if pending.get(key).is_some_and(|p| p.generation == generation) {
            pending.remove(key);
        }
    }
}

impl Drop for PersistScheduler {
    fn drop(&mut self) {
        for (_, pending) in self.pending.get_mut().drain() {
            pending.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_collapses_burst() {
        let scheduler = PersistScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        for _ in 0..5 {
            let fired = fired.clone();
            scheduler.schedule("layout:n1", Duration::from_millis(600), async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(scheduler.is_pending("layout:n1"));

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending("layout:n1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_are_independent() {
        let scheduler = PersistScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        for key in ["layout:a", "layout:b", "edges"] {
            let fired = fired.clone();
            scheduler.schedule(key, Duration::from_millis(800), async move {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(scheduler.pending_count(), 3);
        tokio::time::sleep(Duration::from_millis(900)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let scheduler = PersistScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        scheduler.schedule("layouts", Duration::from_millis(800), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(scheduler.cancel("layouts"));
        assert!(!scheduler.cancel("layouts"));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prefix() {
        let scheduler = PersistScheduler::new();
        for key in ["layout:a", "layout:b", "edges"] {
            scheduler.schedule(key, Duration::from_millis(600), async {});
        }
        assert_eq!(scheduler.cancel_prefix("layout:"), 2);
        assert!(scheduler.is_pending("edges"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_does_not_abort_running_write() {
        let scheduler = PersistScheduler::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = finished.clone();
        scheduler.schedule("edges", Duration::from_millis(100), async move {
            // Simulated slow request
            tokio::time::sleep(Duration::from_millis(500)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(200)).await;

        let counter = finished.clone();
        scheduler.schedule("edges", Duration::from_millis(100), async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 2);
    }
}
