//! Principal identity, task payloads, and the store key layout.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::QueueError;

/// Opaque tenant identifier partitioning queues, counters, and drain state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Principal(String);

impl Principal {
    /// Create a principal, rejecting empty identifiers.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Validation` when `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, QueueError> {
        let id = id.into();
        if id.is_empty() {
            return Err(QueueError::Validation("missing principal id".into()));
        }
        Ok(Self(id))
    }

    /// Borrow the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Principal {
    type Error = QueueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Principal> for String {
    fn from(value: Principal) -> Self {
        value.0
    }
}

/// Opaque task payload. Arrival order is its only identity.
///
/// Serialized transparently so the store holds the submitted JSON body as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Task {
    /// Submitted body, including the principal field.
    pub payload: serde_json::Value,
}

impl Task {
    /// Wrap a JSON payload.
    #[must_use]
    pub const fn new(payload: serde_json::Value) -> Self {
        Self { payload }
    }

    pub(crate) fn encode(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(QueueError::store)
    }

    pub(crate) fn decode(raw: &str) -> Result<Self, QueueError> {
        serde_json::from_str(raw)
            .map_err(|e| QueueError::Store(format!("malformed queue entry: {e}")))
    }
}

/// Key layout in the shared store.
///
/// Defaults match `queue:<id>`, `rate:<id>`, `drain:<id>`; a prefix namespaces
/// several deployments on one store.
#[derive(Debug, Clone, Default)]
pub struct KeySpace {
    prefix: String,
}

impl KeySpace {
    /// Create a key space with the given prefix (may be empty).
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// List key holding the principal's FIFO queue.
    #[must_use]
    pub fn queue(&self, principal: &Principal) -> String {
        format!("{}queue:{principal}", self.prefix)
    }

    /// Counter key for the principal's admission window.
    #[must_use]
    pub fn rate(&self, principal: &Principal) -> String {
        format!("{}rate:{principal}", self.prefix)
    }

    /// Lease key marking the principal as draining.
    #[must_use]
    pub fn drain(&self, principal: &Principal) -> String {
        format!("{}drain:{principal}", self.prefix)
    }
}
