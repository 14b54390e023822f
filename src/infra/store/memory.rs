//! In-memory atomic store for development, tests, and single-process use.
//!
//! Every operation runs under one mutex, which gives the same per-call
//! atomicity a shared store provides across processes. Expiry is evaluated
//! lazily on access against `tokio::time::Instant`, so paused-clock tests can
//! step through windows without real waiting.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::core::{AtomicStore, KeyTtl, QueueError};

#[derive(Debug)]
enum Value {
    Str(String),
    List(VecDeque<String>),
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

fn wrong_type(key: &str) -> QueueError {
    QueueError::Store(format!("WRONGTYPE operation against key {key}"))
}

/// Store backed by a mutex-guarded map.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    #[must_use]
    pub fn key_count(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Run `f` on the live entry for `key`, dropping it first if expired.
    fn with_live<R>(
        &self,
        key: &str,
        f: impl FnOnce(&mut HashMap<String, Entry>, Instant) -> R,
    ) -> R {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        f(&mut entries, now)
    }
}

#[async_trait]
impl AtomicStore for InMemoryStore {
    async fn list_push(&self, key: &str, value: String) -> Result<(), QueueError> {
        self.with_live(key, |entries, _| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::List(list) => {
                    list.push_front(value);
                    Ok(())
                }
                Value::Str(_) => Err(wrong_type(key)),
            }
        })
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.with_live(key, |entries, _| {
            let Some(entry) = entries.get_mut(key) else {
                return Ok(None);
            };
            let Value::List(list) = &mut entry.value else {
                return Err(wrong_type(key));
            };
            let popped = list.pop_back();
            if list.is_empty() {
                entries.remove(key);
            }
            Ok(popped)
        })
    }

    async fn list_len(&self, key: &str) -> Result<usize, QueueError> {
        self.with_live(key, |entries, _| match entries.get(key) {
            None => Ok(0),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.len()),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn incr(&self, key: &str) -> Result<i64, QueueError> {
        self.with_live(key, |entries, _| {
            let entry = entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Str("0".into()),
                expires_at: None,
            });
            let Value::Str(raw) = &mut entry.value else {
                return Err(wrong_type(key));
            };
            let next = raw
                .parse::<i64>()
                .map_err(|_| QueueError::Store(format!("value at {key} is not an integer")))?
                .checked_add(1)
                .ok_or_else(|| QueueError::Store(format!("increment at {key} would overflow")))?;
            *raw = next.to_string();
            Ok(next)
        })
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, QueueError> {
        self.with_live(key, |entries, now| {
            Ok(entries.get_mut(key).is_some_and(|entry| {
                entry.expires_at = Some(now + ttl);
                true
            }))
        })
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, QueueError> {
        self.with_live(key, |entries, now| {
            Ok(match entries.get(key) {
                None => KeyTtl::Missing,
                Some(Entry {
                    expires_at: None, ..
                }) => KeyTtl::Persistent,
                Some(Entry {
                    expires_at: Some(at),
                    ..
                }) => KeyTtl::Expires(at.saturating_duration_since(now)),
            })
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.with_live(key, |entries, _| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(raw),
                ..
            }) => Ok(Some(raw.clone())),
            Some(_) => Err(wrong_type(key)),
        })
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, QueueError> {
        self.with_live(key, |entries, now| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: ttl.map(|ttl| now + ttl),
                },
            );
            Ok(true)
        })
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, QueueError> {
        self.with_live(key, |entries, now| match entries.get_mut(key) {
            Some(entry) if matches!(&entry.value, Value::Str(v) if v == expected) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            _ => Ok(false),
        })
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, QueueError> {
        self.with_live(key, |entries, _| {
            let owned = entries
                .get(key)
                .is_some_and(|e| matches!(&e.value, Value::Str(v) if v == expected));
            if owned {
                entries.remove(key);
            }
            Ok(owned)
        })
    }
}
