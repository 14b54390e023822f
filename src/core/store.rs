//! Shared atomic store abstraction.
//!
//! Every queue, counter, and drain-lease mutation goes through exactly one of
//! these primitives. Implementations must make each call atomic with respect to
//! every other process using the same store; no component performs a
//! read-modify-write across two calls.

use std::time::Duration;

use async_trait::async_trait;

use super::QueueError;

/// Remaining lifetime of a key, mirroring `TTL` semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    /// Key does not exist (or has expired).
    Missing,
    /// Key exists without an expiry.
    Persistent,
    /// Key expires after the given duration.
    Expires(Duration),
}

/// Atomic key-value/list store shared by every server process.
///
/// Lists push at the head and pop from the tail, so push + pop is FIFO.
#[async_trait]
pub trait AtomicStore: Send + Sync + 'static {
    /// Push a value at the head of a list, creating it if absent.
    async fn list_push(&self, key: &str, value: String) -> Result<(), QueueError>;

    /// Pop the value at the tail of a list. Returns `None` when empty.
    async fn list_pop(&self, key: &str) -> Result<Option<String>, QueueError>;

    /// Number of values in a list (0 when absent).
    async fn list_len(&self, key: &str) -> Result<usize, QueueError>;

    /// Increment an integer key by one, creating it at 0 first if absent.
    async fn incr(&self, key: &str) -> Result<i64, QueueError>;

    /// Set an expiry on an existing key. Returns `false` if the key is absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, QueueError>;

    /// Remaining lifetime of a key.
    async fn ttl(&self, key: &str) -> Result<KeyTtl, QueueError>;

    /// Read a string key.
    async fn get(&self, key: &str) -> Result<Option<String>, QueueError>;

    /// Set `key` to `value` only if absent, optionally with an expiry.
    /// Returns `true` if this call created the key.
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, QueueError>;

    /// Reset the expiry of `key` only while it still holds `expected`.
    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, QueueError>;

    /// Delete `key` only while it still holds `expected`.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, QueueError>;
}
