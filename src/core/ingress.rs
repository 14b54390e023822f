//! Ingress gateway: validate, admit, enqueue, dispatch.

use super::drain::{DrainCoordinator, DrainDispatch, Spawn};
use super::{Principal, QueueError, RateCounter, Task, TaskStore};

/// Successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted {
    /// Post-increment admission count in the current window.
    pub window_count: i64,
    /// What the dispatch step observed; `None` if it failed and was deferred.
    pub dispatch: Option<DrainDispatch>,
}

/// Admits tasks against the per-window cap and hands them to the drain engine.
///
/// Every call costs exactly one counter increment, including rejected calls:
/// a request refused for exceeding the cap still consumes a slot in the window.
/// Draining never increments the counter.
pub struct IngressGateway<S> {
    counter: RateCounter,
    tasks: TaskStore,
    coordinator: DrainCoordinator<S>,
    admission_limit: i64,
}

impl<S: Clone> Clone for IngressGateway<S> {
    fn clone(&self) -> Self {
        Self {
            counter: self.counter.clone(),
            tasks: self.tasks.clone(),
            coordinator: self.coordinator.clone(),
            admission_limit: self.admission_limit,
        }
    }
}

impl<S> IngressGateway<S>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Create a gateway.
    pub const fn new(
        counter: RateCounter,
        tasks: TaskStore,
        coordinator: DrainCoordinator<S>,
        admission_limit: i64,
    ) -> Self {
        Self {
            counter,
            tasks,
            coordinator,
            admission_limit,
        }
    }

    /// Admit a task for `principal`.
    ///
    /// Returns once the task is queued; it is processed later by the drain loop.
    ///
    /// # Errors
    ///
    /// - `QueueError::Validation` if `principal` is empty
    /// - `QueueError::RateLimitExceeded` if the window count exceeds the cap
    /// - `QueueError::Store` if the counter or queue could not be updated
    pub async fn submit(&self, principal: &str, payload: serde_json::Value) -> Result<Accepted, QueueError> {
        let principal = Principal::new(principal)?;

        let window_count = self.counter.increment(&principal).await?;
        if window_count > self.admission_limit {
            tracing::warn!(%principal, window_count, limit = self.admission_limit, "admission rejected");
            return Err(QueueError::RateLimitExceeded {
                count: window_count,
                limit: self.admission_limit,
            });
        }

        self.tasks.enqueue(&principal, &Task::new(payload)).await?;
        tracing::debug!(%principal, window_count, "task queued");

        // The task is already queued, so a failed dispatch only delays it until
        // the next admission for this principal.
        let dispatch = match self.coordinator.ensure_running(&principal).await {
            Ok(dispatch) => Some(dispatch),
            Err(e) => {
                tracing::warn!(%principal, error = %e, "drain dispatch deferred");
                None
            }
        };

        Ok(Accepted {
            window_count,
            dispatch,
        })
    }

    /// Configured admissions per window.
    #[must_use]
    pub const fn admission_limit(&self) -> i64 {
        self.admission_limit
    }

    /// Admission counter.
    #[must_use]
    pub const fn counter(&self) -> &RateCounter {
        &self.counter
    }

    /// Task store.
    #[must_use]
    pub const fn tasks(&self) -> &TaskStore {
        &self.tasks
    }

    /// Drain coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &DrainCoordinator<S> {
        &self.coordinator
    }
}
