use pkg_constants::controller::{BACKOFF_BASE_MILLIS, BACKOFF_MAX_SECS};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

/// Deduplicating work queue with per-key exponential backoff.
///
/// A key is handed to at most one worker at a time. Adding a key that is
/// already queued is a no-op; adding one that is being processed marks it
/// dirty so it is queued again once [`WorkQueue::done`] is called.
#[derive(Clone)]
pub struct WorkQueue {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<QueueState>,
    notify: Notify,
    base_delay: Duration,
    max_delay: Duration,
}

#[derive(Default)]
struct QueueState {
    queue: VecDeque<String>,
    dirty: HashSet<String>,
    processing: HashSet<String>,
    failures: HashMap<String, u32>,
    shutting_down: bool,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(BACKOFF_BASE_MILLIS),
            Duration::from_secs(BACKOFF_MAX_SECS),
        )
    }
}

impl WorkQueue {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                notify: Notify::new(),
                base_delay,
                max_delay,
            }),
        }
    }

    pub async fn add(&self, key: impl Into<String>) {
        let key = key.into();
        let mut state = self.inner.state.lock().await;
        if state.shutting_down || !state.dirty.insert(key.clone()) {
            return;
        }
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.inner.notify.notify_waiters();
    }

    /// Add `key` once `delay` has elapsed.
    pub fn add_after(&self, key: impl Into<String>, delay: Duration) {
        let key = key.into();
        let queue = self.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            queue.add(key).await;
        });
    }

    /// Add `key` after its backoff delay, and grow that delay.
    pub async fn add_rate_limited(&self, key: impl Into<String>) {
        let key = key.into();
        let delay = {
            let mut state = self.inner.state.lock().await;
            let failures = state.failures.entry(key.clone()).or_insert(0);
            let delay = self.backoff(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        self.add_after(key, delay);
    }

    /// Reset the backoff of `key`.
    pub async fn forget(&self, key: &str) {
        self.inner.state.lock().await.failures.remove(key);
    }

    pub async fn num_requeues(&self, key: &str) -> u32 {
        self.inner
            .state
            .lock()
            .await
            .failures
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Wait for the next key. Returns `None` once the queue is shut down.
    /// Every key returned must be handed back through [`WorkQueue::done`].
    pub async fn get(&self) -> Option<String> {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock().await;
                if state.shutting_down {
                    return None;
                }
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    return Some(key);
                }
            }

            notified.await;
        }
    }

    /// Mark `key` as no longer being processed.
    pub async fn done(&self, key: &str) {
        let mut state = self.inner.state.lock().await;
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.to_string());
            drop(state);
            self.inner.notify.notify_waiters();
        }
    }

    /// Stop handing out keys and wake every waiting worker.
    pub async fn shutdown(&self) {
        self.inner.state.lock().await.shutting_down = true;
        self.inner.notify.notify_waiters();
    }

    /// Number of keys waiting to be picked up.
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.queue.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn backoff(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.inner
            .base_delay
            .checked_mul(factor)
            .map_or(self.inner.max_delay, |d| d.min(self.inner.max_delay))
    }
}
