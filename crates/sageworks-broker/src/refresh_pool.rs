//! Background refresh pool
//!
//! Runs stale-snapshot refreshes off the caller's path:
//! - At most one pending refresh per category
//! - A semaphore caps concurrent connector calls
//! - Tasks are detached and run to completion; callers wait on a count of
//!   in-flight tasks, so giving up on a wait never cancels a refresh

use crate::category::{Category, CategoryMap};
use crate::error::BrokerError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Semaphore};

/// What a background refresh did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Called the connector and stored a new snapshot
    Refreshed,
    /// Skipped the connector because another refresh made the category fresh
    AlreadyFresh,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Refreshes spawned
    pub launched: usize,
    /// Refreshes that stored a new snapshot
    pub completed: usize,
    /// Refreshes that found the category already fresh and did nothing
    pub already_fresh: usize,
    /// Refreshes whose connector call failed
    pub failed: usize,
    /// Requests dropped because the category already had one pending
    pub skipped: usize,
    /// Refreshes spawned but not yet finished
    pub in_flight: usize,
}

#[derive(Debug)]
struct Shared {
    permits: Semaphore,
    pending: CategoryMap<AtomicBool>,
    launched: AtomicUsize,
    completed: AtomicUsize,
    already_fresh: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
    in_flight: watch::Sender<usize>,
}

/// Releases a task's pending marker and in-flight slot, even if the task
/// panics or is aborted
struct TaskGuard {
    shared: Arc<Shared>,
    category: Category,
}

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.shared.pending[self.category].store(false, Ordering::Release);
        self.shared
            .in_flight
            .send_modify(|n| *n = n.saturating_sub(1));
    }
}

/// Bounded pool of background refresh tasks
#[derive(Debug)]
pub struct RefreshPool {
    max_concurrent: usize,
    shared: Arc<Shared>,
}

impl RefreshPool {
    /// Create pool allowing `max_concurrent` refreshes at once
    #[must_use]
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        let (in_flight, _) = watch::channel(0);
        Self {
            max_concurrent,
            shared: Arc::new(Shared {
                permits: Semaphore::new(max_concurrent),
                pending: CategoryMap::default(),
                launched: AtomicUsize::new(0),
                completed: AtomicUsize::new(0),
                already_fresh: AtomicUsize::new(0),
                failed: AtomicUsize::new(0),
                skipped: AtomicUsize::new(0),
                in_flight,
            }),
        }
    }

    /// Schedule a refresh for `category` unless one is already pending
    ///
    /// Must be called from within a tokio runtime. Returns whether a task
    /// was spawned.
    pub fn try_schedule<F>(&self, category: Category, refresh: F) -> bool
    where
        F: Future<Output = Result<RefreshOutcome, BrokerError>> + Send + 'static,
    {
        if self.shared.pending[category].swap(true, Ordering::AcqRel) {
            self.shared.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%category, "refresh already pending");
            return false;
        }

        self.shared.launched.fetch_add(1, Ordering::Relaxed);
        self.shared.in_flight.send_modify(|n| *n += 1);
        let guard = TaskGuard {
            shared: Arc::clone(&self.shared),
            category,
        };

        tokio::spawn(async move {
            let shared = Arc::clone(&guard.shared);
            let outcome = match shared.permits.acquire().await {
                Ok(_permit) => refresh.await,
                Err(_) => {
                    tracing::error!(%category, "refresh pool closed");
                    Ok(RefreshOutcome::AlreadyFresh)
                }
            };

            match outcome {
                Ok(RefreshOutcome::Refreshed) => shared.completed.fetch_add(1, Ordering::Relaxed),
                Ok(RefreshOutcome::AlreadyFresh) => {
                    shared.already_fresh.fetch_add(1, Ordering::Relaxed)
                }
                Err(e) => {
                    tracing::debug!(%category, error = %e, "background refresh failed");
                    shared.failed.fetch_add(1, Ordering::Relaxed)
                }
            };
            drop(guard);
        });

        true
    }

    /// Wait until no refresh is in flight
    ///
    /// Any number of callers may wait at once. Dropping the returned future
    /// leaves the refreshes running.
    pub async fn drain(&self) {
        let mut in_flight = self.shared.in_flight.subscribe();
        // The pool owns the sender, so this only fails once the pool is gone
        let _ = in_flight.wait_for(|n| *n == 0).await;
    }

    /// Whether a refresh for `category` is pending
    #[inline]
    #[must_use]
    pub fn is_pending(&self, category: Category) -> bool {
        self.shared.pending[category].load(Ordering::Acquire)
    }

    /// Maximum concurrent refreshes
    #[inline]
    #[must_use]
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Get pool statistics
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            launched: self.shared.launched.load(Ordering::Relaxed),
            completed: self.shared.completed.load(Ordering::Relaxed),
            already_fresh: self.shared.already_fresh.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            skipped: self.shared.skipped.load(Ordering::Relaxed),
            in_flight: *self.shared.in_flight.borrow(),
        }
    }
}

impl Default for RefreshPool {
    fn default() -> Self {
        Self::new(4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use std::time::Duration;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn schedule_and_drain() {
        let pool = RefreshPool::new(2);
        let ran = Arc::new(AtomicUsize::new(0));

        for category in [Category::Models, Category::Endpoints] {
            let ran = Arc::clone(&ran);
            assert!(pool.try_schedule(category, async move {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok(RefreshOutcome::Refreshed)
            }));
        }
        pool.drain().await;

        assert_eq!(ran.load(Ordering::SeqCst), 2);
        let stats = pool.stats();
        assert_eq!(stats.launched, 2);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.in_flight, 0);
    }

    #[tokio::test]
    async fn one_pending_refresh_per_category() {
        let pool = RefreshPool::new(4);
        let release = Arc::new(Notify::new());

        let gate = Arc::clone(&release);
        assert!(pool.try_schedule(Category::Models, async move {
            gate.notified().await;
            Ok(RefreshOutcome::Refreshed)
        }));
        assert!(pool.is_pending(Category::Models));
        assert!(!pool.try_schedule(Category::Models, async { Ok(RefreshOutcome::Refreshed) }));
        assert!(pool.try_schedule(Category::Endpoints, async { Ok(RefreshOutcome::Refreshed) }));

        release.notify_one();
        pool.drain().await;

        assert!(!pool.is_pending(Category::Models));
        let stats = pool.stats();
        assert_eq!(stats.launched, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn failures_are_counted() {
        let pool = RefreshPool::new(1);
        pool.try_schedule(Category::DataCatalog, async {
            Err(BrokerError::RefreshFailed {
                category: Category::DataCatalog,
                source: ConnectorError::Malformed("bad table".to_string()),
            })
        });
        pool.drain().await;

        let stats = pool.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.completed, 0);
        assert!(!pool.is_pending(Category::DataCatalog));
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let pool = RefreshPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for category in Category::ALL {
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            pool.try_schedule(category, async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(RefreshOutcome::Refreshed)
            });
        }
        pool.drain().await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert_eq!(pool.stats().completed, Category::COUNT);
    }

    #[tokio::test]
    async fn already_fresh_is_not_completed() {
        let pool = RefreshPool::new(1);
        pool.try_schedule(Category::Models, async { Ok(RefreshOutcome::AlreadyFresh) });
        pool.drain().await;

        let stats = pool.stats();
        assert_eq!(stats.already_fresh, 1);
        assert_eq!(stats.completed, 0);
    }

    #[tokio::test]
    async fn abandoned_wait_leaves_refresh_running() {
        let pool = RefreshPool::new(1);
        let release = Arc::new(Notify::new());
        let gate = Arc::clone(&release);
        pool.try_schedule(Category::Endpoints, async move {
            gate.notified().await;
            Ok(RefreshOutcome::Refreshed)
        });

        let waited = tokio::time::timeout(Duration::from_millis(20), pool.drain()).await;
        assert!(waited.is_err());
        assert_eq!(pool.stats().in_flight, 1);

        release.notify_one();
        pool.drain().await;

        let stats = pool.stats();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.in_flight, 0);
        assert!(!pool.is_pending(Category::Endpoints));
    }

    #[tokio::test]
    async fn concurrent_waiters_all_block() {
        let pool = Arc::new(RefreshPool::new(1));
        let release = Arc::new(Notify::new());
        let gate = Arc::clone(&release);
        pool.try_schedule(Category::Models, async move {
            gate.notified().await;
            Ok(RefreshOutcome::Refreshed)
        });

        let first = {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.drain().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        let second = tokio::time::timeout(Duration::from_millis(50), pool.drain()).await;
        assert!(second.is_err());
        assert!(!first.is_finished());

        release.notify_one();
        first.await.unwrap();
        pool.drain().await;
        assert_eq!(pool.stats().completed, 1);
    }

    #[tokio::test]
    async fn panicking_refresh_releases_category() {
        let pool = RefreshPool::new(1);
        let explode = true;
        pool.try_schedule(Category::FeatureStore, async move {
            if explode {
                panic!("connector blew up");
            }
            Ok(RefreshOutcome::Refreshed)
        });
        pool.drain().await;

        assert!(!pool.is_pending(Category::FeatureStore));
        assert_eq!(pool.stats().in_flight, 0);
        assert!(pool.try_schedule(Category::FeatureStore, async {
            Ok(RefreshOutcome::Refreshed)
        }));
        pool.drain().await;
        assert_eq!(pool.stats().completed, 1);
    }
}
