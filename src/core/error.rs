//! Error types for queue, admission, and drain operations.

use thiserror::Error;

/// Errors produced by queue components.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Request was missing a required field or carried an invalid principal.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Admission count for the current window exceeded the configured cap.
    #[error("rate limit exceeded: {count} admissions in window (limit {limit})")]
    RateLimitExceeded {
        /// Post-increment counter value that triggered the rejection.
        count: i64,
        /// Configured cap per window.
        limit: i64,
    },
    /// Shared store was unreachable, timed out, or returned malformed data.
    #[error("store error: {0}")]
    Store(String),
    /// Task processor failed on a single task.
    #[error("task processing failed: {0}")]
    TaskProcessing(String),
    /// Drain lease was no longer owned by the loop refreshing it.
    #[error("drain lease lost for principal {0}")]
    DrainLeaseLost(String),
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl QueueError {
    /// Build a store error from any displayable backend failure.
    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
