//! Task processing traits and the default completion-log processor.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use super::{AppResult, Principal, Task};
use crate::util::clock::now_ms;

/// Abstraction for executing one task's side effect.
///
/// Called from a drain loop, one task at a time per principal. An `Err` (or a
/// panic) marks only this task as failed; the drain moves on to the next task.
/// There are no retries.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_task_queue::core::{AppResult, Principal, Task, TaskProcessor};
///
/// struct Webhook;
///
/// #[async_trait]
/// impl TaskProcessor for Webhook {
///     async fn process(&self, principal: &Principal, task: Task) -> AppResult<()> {
///         post_to_webhook(principal.as_str(), &task.payload).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait TaskProcessor: Send + Sync + 'static {
    /// Execute the task for the given principal.
    async fn process(&self, principal: &Principal, task: Task) -> AppResult<()>;
}

/// Append-only durable log of completion records.
pub trait CompletionSink: Send + Sync + 'static {
    /// Append one line. `line` carries its own trailing newline.
    fn append(&self, line: &str) -> AppResult<()>;
}

/// Processor that records `"<principal>-task completed at-<unix_ms>"` per task.
#[derive(Clone)]
pub struct CompletionLogProcessor {
    sink: Arc<dyn CompletionSink>,
}

impl CompletionLogProcessor {
    /// Create a processor writing to `sink`.
    pub fn new(sink: Arc<dyn CompletionSink>) -> Self {
        Self { sink }
    }

    /// Format a completion record for `principal` at `at_ms`.
    #[must_use]
    pub fn completion_line(principal: &Principal, at_ms: u128) -> String {
        format!("{principal}-task completed at-{at_ms}\n")
    }
}

#[async_trait]
impl TaskProcessor for CompletionLogProcessor {
    async fn process(&self, principal: &Principal, _task: Task) -> AppResult<()> {
        let line = Self::completion_line(principal, now_ms());
        // Sinks may block on disk I/O; keep that off the runtime workers.
        let sink = Arc::clone(&self.sink);
        let record = line.clone();
        tokio::task::spawn_blocking(move || sink.append(&record))
            .await
            .context("completion sink task failed")??;
        tracing::info!(%principal, record = line.trim_end(), "task completed");
        Ok(())
    }
}
