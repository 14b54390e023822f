//! Per-principal drain loop state machine.
//!
//! ```text
//!   Fetching ──empty──▶ Done
//!      │  ▲
//!  task│  └──────── Pacing (sleep until processing start + pace interval)
//!      ▼               ▲
//!   Processing ────────┘   (a failed task is logged and skipped)
//! ```
//!
//! The lease is refreshed before every dequeue and periodically while a task
//! runs. Store failures while fetching, and losing the drain lease, end the loop
//! as `Aborted`. Releasing the lease is the caller's job on every exit path.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::{Instant, MissedTickBehavior};

use super::drain::{DrainCounters, DrainLease};
use super::{AtomicStore, Principal, QueueError, Task, TaskProcessor, TaskStore};

/// Current phase of a drain loop.
#[derive(Debug)]
pub enum DrainPhase {
    /// Refresh the lease and dequeue the next task.
    Fetching,
    /// Run the processor on a dequeued task.
    Processing(Task),
    /// Wait out the rest of the pacing interval.
    Pacing {
        /// When the preceding Processing step began.
        started: Instant,
    },
    /// Queue observed empty.
    Done,
    /// Unrecoverable error; remaining tasks stay queued.
    Aborted(QueueError),
}

/// Terminal result of one drain loop.
#[derive(Debug)]
pub enum DrainOutcome {
    /// Queue was drained to empty.
    Done {
        /// Tasks processed successfully.
        completed: u64,
        /// Tasks whose processing failed and were skipped.
        failed: u64,
    },
    /// Loop stopped early.
    Aborted {
        /// Tasks processed successfully before the abort.
        completed: u64,
        /// Tasks whose processing failed before the abort.
        failed: u64,
        /// Cause of the abort.
        error: QueueError,
    },
}

/// Drains one principal's queue, one task at a time, at most one task per
/// pace interval.
pub struct DrainLoop {
    principal: Principal,
    tasks: TaskStore,
    processor: Arc<dyn TaskProcessor>,
    store: Arc<dyn AtomicStore>,
    lease: DrainLease,
    pace_interval: Duration,
    lease_ttl: Duration,
    counters: Arc<DrainCounters>,
    completed: u64,
    failed: u64,
}

impl DrainLoop {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        principal: Principal,
        tasks: TaskStore,
        processor: Arc<dyn TaskProcessor>,
        store: Arc<dyn AtomicStore>,
        lease: DrainLease,
        pace_interval: Duration,
        lease_ttl: Duration,
        counters: Arc<DrainCounters>,
    ) -> Self {
        Self {
            principal,
            tasks,
            processor,
            store,
            lease,
            pace_interval,
            lease_ttl,
            counters,
            completed: 0,
            failed: 0,
        }
    }

    /// Run until the queue is empty or an unrecoverable error occurs.
    pub async fn run(mut self) -> DrainOutcome {
        let mut phase = DrainPhase::Fetching;
        loop {
            phase = match phase {
                DrainPhase::Done => {
                    return DrainOutcome::Done {
                        completed: self.completed,
                        failed: self.failed,
                    }
                }
                DrainPhase::Aborted(error) => {
                    return DrainOutcome::Aborted {
                        completed: self.completed,
                        failed: self.failed,
                        error,
                    }
                }
                active => self.step(active).await,
            };
        }
    }

    async fn step(&mut self, phase: DrainPhase) -> DrainPhase {
        match phase {
            DrainPhase::Fetching => self.fetch().await,
            DrainPhase::Processing(task) => self.process(task).await,
            DrainPhase::Pacing { started } => {
                tokio::time::sleep_until(started + self.pace_interval).await;
                DrainPhase::Fetching
            }
            terminal @ (DrainPhase::Done | DrainPhase::Aborted(_)) => terminal,
        }
    }

    async fn fetch(&mut self) -> DrainPhase {
        match self.refresh_lease().await {
            Ok(true) => {}
            Ok(false) => {
                return DrainPhase::Aborted(QueueError::DrainLeaseLost(
                    self.principal.to_string(),
                ))
            }
            Err(e) => return DrainPhase::Aborted(e),
        }

        match self.tasks.dequeue(&self.principal).await {
            Ok(Some(task)) => DrainPhase::Processing(task),
            Ok(None) => DrainPhase::Done,
            Err(e) => DrainPhase::Aborted(e),
        }
    }

    /// Push the lease expiry out while this loop still owns it.
    async fn refresh_lease(&self) -> Result<bool, QueueError> {
        self.store
            .expire_if_equals(&self.lease.key, &self.lease.token, self.lease_ttl)
            .await
    }

    /// Interval at which a running task keeps the lease alive.
    fn heartbeat_period(&self) -> Duration {
        (self.lease_ttl / 3).max(Duration::from_millis(1))
    }

    async fn process(&mut self, task: Task) -> DrainPhase {
        let started = Instant::now();
        let result = {
            let work = AssertUnwindSafe(self.processor.process(&self.principal, task)).catch_unwind();
            tokio::pin!(work);
            let period = self.heartbeat_period();
            let mut heartbeat = tokio::time::interval_at(started + period, period);
            heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // A task may outlive the lease TTL; keep the lease ours until it ends.
            loop {
                tokio::select! {
                    result = &mut work => break result,
                    _ = heartbeat.tick() => match self.refresh_lease().await {
                        Ok(true) => {}
                        Ok(false) => tracing::warn!(
                            principal = %self.principal,
                            "drain lease lost while a task was running"
                        ),
                        Err(e) => tracing::warn!(
                            principal = %self.principal,
                            error = %e,
                            "failed to refresh drain lease during task"
                        ),
                    },
                }
            }
        };

        let failure = match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(QueueError::TaskProcessing(format!("{e:#}"))),
            Err(_) => Some(QueueError::TaskProcessing("processor panicked".into())),
        };

        if let Some(err) = failure {
            self.failed += 1;
            self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(principal = %self.principal, error = %err, "task failed, continuing drain");
        } else {
            self.completed += 1;
            self.counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
        }

        DrainPhase::Pacing { started }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AppResult, KeySpace};
    use crate::infra::store::InMemoryStore;
    use async_trait::async_trait;

    struct Noop;

    #[async_trait]
    impl TaskProcessor for Noop {
        async fn process(&self, _principal: &Principal, _task: Task) -> AppResult<()> {
            Ok(())
        }
    }

    async fn make_loop(store: Arc<InMemoryStore>, token: &str) -> DrainLoop {
        let principal = Principal::new("u1").unwrap();
        let keys = KeySpace::default();
        let lease = DrainLease {
            key: keys.drain(&principal),
            token: token.into(),
        };
        store
            .set_if_absent(&lease.key, "owner", Some(Duration::from_secs(30)))
            .await
            .unwrap();
        DrainLoop::new(
            principal,
            TaskStore::new(store.clone(), keys),
            Arc::new(Noop),
            store,
            lease,
            Duration::from_millis(1000),
            Duration::from_secs(30),
            Arc::new(DrainCounters::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_queue_is_done() {
        let store = Arc::new(InMemoryStore::new());
        let outcome = make_loop(store, "owner").await.run().await;
        assert!(matches!(outcome, DrainOutcome::Done { completed: 0, failed: 0 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_foreign_lease_aborts() {
        let store = Arc::new(InMemoryStore::new());
        store.list_push("queue:u1", "{}".into()).await.unwrap();
        let outcome = make_loop(store.clone(), "someone-else").await.run().await;
        assert!(matches!(
            outcome,
            DrainOutcome::Aborted { error: QueueError::DrainLeaseLost(_), .. }
        ));
        // task is left for the actual owner
        assert_eq!(store.list_len("queue:u1").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_entry_aborts() {
        let store = Arc::new(InMemoryStore::new());
        store.list_push("queue:u1", "not json".into()).await.unwrap();
        let outcome = make_loop(store, "owner").await.run().await;
        assert!(matches!(
            outcome,
            DrainOutcome::Aborted { error: QueueError::Store(_), .. }
        ));
    }
}
