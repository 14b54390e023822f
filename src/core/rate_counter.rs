//! Fixed-window admission counter.
//!
//! The first increment after the counter is absent opens a window; every
//! increment inside the window shares one counter, and the counter only
//! disappears once the whole window has elapsed. Bursts of up to twice the cap
//! are possible across two adjacent windows.

use std::sync::Arc;
use std::time::Duration;

use super::{AtomicStore, KeySpace, KeyTtl, Principal, QueueError};

/// Per-principal atomic counter with expiry.
#[derive(Clone)]
pub struct RateCounter {
    store: Arc<dyn AtomicStore>,
    keys: KeySpace,
    window: Duration,
}

impl RateCounter {
    /// Create a counter over a shared store.
    pub fn new(store: Arc<dyn AtomicStore>, keys: KeySpace, window: Duration) -> Self {
        Self {
            store,
            keys,
            window,
        }
    }

    /// Length of one counting window.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Increment the principal's counter and return the post-increment value.
    ///
    /// A value of 1 means this call opened a fresh window, so the expiry is set.
    /// A later increment that finds the counter without an expiry (the opening
    /// `EXPIRE` failed or its caller crashed) sets it, so every counter expires.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` if any store call fails.
    pub async fn increment(&self, principal: &Principal) -> Result<i64, QueueError> {
        let key = self.keys.rate(principal);
        let count = self.store.incr(&key).await?;
        if count == 1 {
            self.store.expire(&key, self.window).await?;
            tracing::debug!(%principal, window_secs = self.window.as_secs(), "opened admission window");
        } else if self.store.ttl(&key).await? == KeyTtl::Persistent {
            self.store.expire(&key, self.window).await?;
            tracing::warn!(%principal, count, "admission counter had no expiry, window restarted");
        }
        Ok(count)
    }

    /// Current count, or `None` when no window is open.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` on store failure or a non-integer value.
    pub async fn peek(&self, principal: &Principal) -> Result<Option<i64>, QueueError> {
        let key = self.keys.rate(principal);
        self.store
            .get(&key)
            .await?
            .map(|raw| {
                raw.parse::<i64>()
                    .map_err(|e| QueueError::Store(format!("counter {key} is not an integer: {e}")))
            })
            .transpose()
    }

    /// Time left in the principal's current window.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` on store failure.
    pub async fn remaining_window(
        &self,
        principal: &Principal,
    ) -> Result<Option<Duration>, QueueError> {
        match self.store.ttl(&self.keys.rate(principal)).await? {
            KeyTtl::Expires(left) => Ok(Some(left)),
            KeyTtl::Missing | KeyTtl::Persistent => Ok(None),
        }
    }
}
