//! Drain coordination: at most one drain loop per principal, across processes.
//!
//! The draining flag is a lease key in the shared store, acquired with
//! set-if-absent and released with compare-and-delete on a per-loop token.
//! In front of it sits an in-process supervisor registry keyed by principal, so
//! repeated admissions for a principal this process already drains never touch
//! the store. A semaphore caps how many loops execute at once.

use std::collections::HashSet;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use uuid::Uuid;

use super::drain_loop::{DrainLoop, DrainOutcome};
use super::{AtomicStore, KeySpace, Principal, QueueError, TaskProcessor, TaskStore};

/// Abstraction for spawning background work on a runtime.
pub trait Spawn {
    /// Spawn a detached future.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

/// Whether a principal currently has a drain loop anywhere in the deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainState {
    /// No loop holds the drain lease.
    Idle,
    /// Some process holds the drain lease.
    Draining,
}

/// Result of [`DrainCoordinator::ensure_running`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainDispatch {
    /// This call acquired the lease and spawned a loop.
    Started,
    /// A loop was already running, here or in another process.
    AlreadyRunning,
}

/// Drain timing and bounds.
#[derive(Debug, Clone)]
pub struct DrainSettings {
    /// Minimum spacing between the starts of consecutive tasks.
    pub pace_interval: Duration,
    /// Expiry of the drain lease; refreshed before every dequeue and
    /// periodically while a task runs. Also the delay before a loop that
    /// aborted on a store error is retried.
    pub lease_ttl: Duration,
    /// Maximum number of loops executing concurrently in this process.
    pub max_concurrent_drains: usize,
}

impl Default for DrainSettings {
    fn default() -> Self {
        Self {
            pace_interval: Duration::from_millis(1000),
            lease_ttl: Duration::from_secs(30),
            max_concurrent_drains: 1024,
        }
    }
}

/// Snapshot of drain activity in this process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Loops currently supervised by this process.
    pub active_loops: usize,
    /// Loops started (lease acquired).
    pub loops_started: u64,
    /// Loops that drained their queue to empty.
    pub loops_completed: u64,
    /// Loops that ended on an error or panic.
    pub loops_aborted: u64,
    /// Dispatch attempts that found a loop already running.
    pub dispatches_skipped: u64,
    /// Tasks processed successfully.
    pub tasks_completed: u64,
    /// Tasks whose processing failed.
    pub tasks_failed: u64,
}

/// Internal counters for drain statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct DrainCounters {
    pub loops_started: AtomicU64,
    pub loops_completed: AtomicU64,
    pub loops_aborted: AtomicU64,
    pub dispatches_skipped: AtomicU64,
    pub tasks_completed: AtomicU64,
    pub tasks_failed: AtomicU64,
}

impl DrainCounters {
    fn snapshot(&self, active_loops: usize) -> DrainStats {
        DrainStats {
            active_loops,
            loops_started: self.loops_started.load(Ordering::Relaxed),
            loops_completed: self.loops_completed.load(Ordering::Relaxed),
            loops_aborted: self.loops_aborted.load(Ordering::Relaxed),
            dispatches_skipped: self.dispatches_skipped.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
        }
    }
}

/// Lease held by one drain loop.
#[derive(Debug, Clone)]
pub(crate) struct DrainLease {
    pub key: String,
    pub token: String,
}

struct CoordinatorInner {
    store: Arc<dyn AtomicStore>,
    keys: KeySpace,
    tasks: TaskStore,
    processor: Arc<dyn TaskProcessor>,
    settings: DrainSettings,
    registry: Mutex<HashSet<Principal>>,
    permits: Arc<Semaphore>,
    counters: Arc<DrainCounters>,
}

/// Removes a principal from the supervisor registry when dropped.
struct Registration {
    inner: Arc<CoordinatorInner>,
    principal: Principal,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.inner.registry.lock().remove(&self.principal);
    }
}

/// Ensures exactly one drain loop per principal.
///
/// Cheap to clone; clones share the registry, counters, and store handle.
pub struct DrainCoordinator<S> {
    inner: Arc<CoordinatorInner>,
    spawner: S,
}

impl<S: Clone> Clone for DrainCoordinator<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            spawner: self.spawner.clone(),
        }
    }
}

impl<S> DrainCoordinator<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a coordinator from its collaborators.
    pub fn new(
        store: Arc<dyn AtomicStore>,
        keys: KeySpace,
        processor: Arc<dyn TaskProcessor>,
        settings: DrainSettings,
        spawner: S,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_drains.max(1)));
        Self {
            inner: Arc::new(CoordinatorInner {
                tasks: TaskStore::new(Arc::clone(&store), keys.clone()),
                store,
                keys,
                processor,
                settings,
                registry: Mutex::new(HashSet::new()),
                permits,
                counters: Arc::new(DrainCounters::default()),
            }),
            spawner,
        }
    }

    /// Start a drain loop for `principal` unless one is already running.
    ///
    /// Idempotent and safe to call on every admission.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` if the lease could not be attempted.
    pub async fn ensure_running(&self, principal: &Principal) -> Result<DrainDispatch, QueueError> {
        let Some(registration) = self.register(principal) else {
            self.inner.counters.dispatches_skipped.fetch_add(1, Ordering::Relaxed);
            return Ok(DrainDispatch::AlreadyRunning);
        };

        let lease = DrainLease {
            key: self.inner.keys.drain(principal),
            token: Uuid::new_v4().to_string(),
        };
        let acquired = self
            .inner
            .store
            .set_if_absent(&lease.key, &lease.token, Some(self.inner.settings.lease_ttl))
            .await?;
        if !acquired {
            self.inner.counters.dispatches_skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(%principal, "drain lease held elsewhere");
            return Ok(DrainDispatch::AlreadyRunning);
        }

        self.inner.counters.loops_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(%principal, "drain loop started");
        self.spawner
            .spawn(self.clone().supervise(principal.clone(), lease, registration));
        Ok(DrainDispatch::Started)
    }

    /// Whether any process currently drains `principal`.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` on store failure.
    pub async fn state(&self, principal: &Principal) -> Result<DrainState, QueueError> {
        let held = self.inner.store.get(&self.inner.keys.drain(principal)).await?;
        Ok(if held.is_some() {
            DrainState::Draining
        } else {
            DrainState::Idle
        })
    }

    /// Whether this process supervises a loop for `principal`.
    #[must_use]
    pub fn is_running_locally(&self, principal: &Principal) -> bool {
        self.inner.registry.lock().contains(principal)
    }

    /// Number of loops supervised by this process.
    #[must_use]
    pub fn local_active(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Snapshot of drain statistics.
    #[must_use]
    pub fn stats(&self) -> DrainStats {
        self.inner.counters.snapshot(self.local_active())
    }

    fn register(&self, principal: &Principal) -> Option<Registration> {
        let mut registry = self.inner.registry.lock();
        if !registry.insert(principal.clone()) {
            return None;
        }
        Some(Registration {
            inner: Arc::clone(&self.inner),
            principal: principal.clone(),
        })
    }

    /// Run one loop and release its lease on every exit path.
    ///
    /// Boxed so the future type does not recurse through `ensure_running`.
    fn supervise(
        self,
        principal: Principal,
        lease: DrainLease,
        registration: Registration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'static>> {
        Box::pin(async move {
            let outcome = {
                let _permit = Arc::clone(&self.inner.permits).acquire_owned().await.ok();
                let drain = DrainLoop::new(
                    principal.clone(),
                    self.inner.tasks.clone(),
                    Arc::clone(&self.inner.processor),
                    Arc::clone(&self.inner.store),
                    lease.clone(),
                    self.inner.settings.pace_interval,
                    self.inner.settings.lease_ttl,
                    Arc::clone(&self.inner.counters),
                );
                AssertUnwindSafe(drain.run()).catch_unwind().await
            };

            match self
                .inner
                .store
                .delete_if_equals(&lease.key, &lease.token)
                .await
            {
                Ok(true) => tracing::debug!(%principal, "drain lease released"),
                Ok(false) => tracing::warn!(%principal, "drain lease already gone at release"),
                Err(e) => tracing::error!(
                    %principal,
                    error = %e,
                    "failed to release drain lease; it will lapse on expiry"
                ),
            }
            drop(registration);

            match outcome {
                Ok(DrainOutcome::Done { completed, failed }) => {
                    self.inner.counters.loops_completed.fetch_add(1, Ordering::Relaxed);
                    tracing::info!(%principal, completed, failed, "drain loop finished");
                    self.redispatch_if_pending(&principal).await;
                }
                Ok(DrainOutcome::Aborted {
                    completed,
                    failed,
                    error,
                }) => {
                    self.inner.counters.loops_aborted.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(%principal, completed, failed, error = %error, "drain loop aborted");
                    // A lost lease means another loop owns the queue now.
                    if matches!(error, QueueError::Store(_)) {
                        tokio::time::sleep(self.inner.settings.lease_ttl).await;
                        self.redispatch_if_pending(&principal).await;
                    }
                }
                Err(_) => {
                    self.inner.counters.loops_aborted.fetch_add(1, Ordering::Relaxed);
                    tracing::error!(%principal, "drain loop panicked");
                }
            }
        })
    }

    /// Start another loop if tasks are still queued.
    ///
    /// Covers tasks enqueued between the empty dequeue and the lease release
    /// (they found the lease still held), and a backlog left by a loop that
    /// aborted on a store error.
    async fn redispatch_if_pending(&self, principal: &Principal) {
        match self.inner.tasks.len(principal).await {
            Ok(0) => {}
            Ok(pending) => {
                tracing::debug!(%principal, pending, "queue not empty after drain, redispatching");
                if let Err(e) = self.ensure_running(principal).await {
                    tracing::error!(%principal, error = %e, "redispatch failed");
                }
            }
            Err(e) => tracing::error!(%principal, error = %e, "pending check failed after drain"),
        }
    }
}
