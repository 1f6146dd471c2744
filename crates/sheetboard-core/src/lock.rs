//! Mutual-exclusion lock with a bounded acquisition wait.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{Error, Result};

/// How long writers wait for the post-table lock.
pub const WRITE_LOCK_WAIT: Duration = Duration::from_secs(10);

/// How long drafting requests wait for the generation lock.
pub const GENERATE_LOCK_WAIT: Duration = Duration::from_secs(30);

/// A named lock that gives up after a fixed wait.
///
/// Clones share the same underlying lock. The guard releases on drop, so
/// every exit path of a critical section releases it.
#[derive(Clone)]
pub struct TimedLock {
    name: &'static str,
    wait: Duration,
    inner: Arc<Mutex<()>>,
}

/// Held lock. Dropping it releases the lock.
pub struct TimedLockGuard {
    name: &'static str,
    _guard: OwnedMutexGuard<()>,
}

impl TimedLock {
    pub fn new(name: &'static str, wait: Duration) -> Self {
        Self {
            name,
            wait,
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Acquire the lock, failing with [`Error::Busy`] after the wait bound.
    pub async fn acquire(&self) -> Result<TimedLockGuard> {
        match tokio::time::timeout(self.wait, self.inner.clone().lock_owned()).await {
            Ok(guard) => {
                tracing::trace!(lock = self.name, "lock acquired");
                Ok(TimedLockGuard {
                    name: self.name,
                    _guard: guard,
                })
            }
            Err(_) => {
                metrics::counter!("board_lock_timeouts_total", "lock" => self.name).increment(1);
                tracing::warn!(
                    lock = self.name,
                    wait_ms = self.wait.as_millis() as u64,
                    "lock wait timed out"
                );
                Err(Error::Busy(self.name))
            }
        }
    }
}

impl Drop for TimedLockGuard {
    fn drop(&mut self) {
        tracing::trace!(lock = self.name, "lock released");
    }
}
