//! Per-principal FIFO task store over the shared atomic store.

use std::sync::Arc;

use super::{AtomicStore, KeySpace, Principal, QueueError, Task};

/// FIFO queues keyed by principal.
///
/// Each operation is a single store primitive, so concurrent enqueue and
/// dequeue from many processes never interleave inside one call.
#[derive(Clone)]
pub struct TaskStore {
    store: Arc<dyn AtomicStore>,
    keys: KeySpace,
}

impl TaskStore {
    /// Create a task store over a shared store.
    pub fn new(store: Arc<dyn AtomicStore>, keys: KeySpace) -> Self {
        Self { store, keys }
    }

    /// Append a task at the tail of the principal's queue.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` if the push fails.
    pub async fn enqueue(&self, principal: &Principal, task: &Task) -> Result<(), QueueError> {
        let raw = task.encode()?;
        self.store.list_push(&self.keys.queue(principal), raw).await
    }

    /// Remove and return the earliest task, or `None` when the queue is empty.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` on store failure or an undecodable entry.
    pub async fn dequeue(&self, principal: &Principal) -> Result<Option<Task>, QueueError> {
        match self.store.list_pop(&self.keys.queue(principal)).await? {
            Some(raw) => Task::decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Number of tasks waiting for the principal.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` on store failure.
    pub async fn len(&self, principal: &Principal) -> Result<usize, QueueError> {
        self.store.list_len(&self.keys.queue(principal)).await
    }
}
