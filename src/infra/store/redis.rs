//! Redis-backed atomic store shared by every server process.
//!
//! Plain primitives map to single commands (`LPUSH`, `RPOP`, `LLEN`, `INCR`,
//! `EXPIRE`, `TTL`, `GET`, `SET NX PX`). Owner-checked lease operations run as
//! Lua scripts so the compare and the write happen in one server-side step.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use crate::core::{AtomicStore, KeyTtl, QueueError};

const EXPIRE_IF_EQUALS: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 0
";

const DELETE_IF_EQUALS: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
";

/// Store backed by a multiplexed, auto-reconnecting Redis connection.
///
/// Cloning is cheap and shares the underlying connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    expire_if_equals: Script,
    delete_if_equals: Script,
}

impl RedisStore {
    /// Connect to Redis at `url` (e.g. `redis://127.0.0.1:6379`).
    ///
    /// # Errors
    ///
    /// Returns `QueueError::Store` if the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(QueueError::store)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(QueueError::store)?;
        tracing::info!(url, "connected to redis");
        Ok(Self {
            conn,
            expire_if_equals: Script::new(EXPIRE_IF_EQUALS),
            delete_if_equals: Script::new(DELETE_IF_EQUALS),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn ttl_secs(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX)
}

fn ttl_millis(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_millis().max(1)).unwrap_or(i64::MAX)
}

#[async_trait]
impl AtomicStore for RedisStore {
    async fn list_push(&self, key: &str, value: String) -> Result<(), QueueError> {
        let _: i64 = self
            .conn()
            .lpush(key, value)
            .await
            .map_err(QueueError::store)?;
        Ok(())
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.conn()
            .rpop(key, None)
            .await
            .map_err(QueueError::store)
    }

    async fn list_len(&self, key: &str) -> Result<usize, QueueError> {
        self.conn().llen(key).await.map_err(QueueError::store)
    }

    async fn incr(&self, key: &str) -> Result<i64, QueueError> {
        self.conn().incr(key, 1_i64).await.map_err(QueueError::store)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, QueueError> {
        self.conn()
            .expire(key, ttl_secs(ttl))
            .await
            .map_err(QueueError::store)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, QueueError> {
        let secs: i64 = self.conn().ttl(key).await.map_err(QueueError::store)?;
        Ok(match secs {
            -2 => KeyTtl::Missing,
            -1 => KeyTtl::Persistent,
            s => KeyTtl::Expires(Duration::from_secs(u64::try_from(s).unwrap_or_default())),
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.conn().get(key).await.map_err(QueueError::store)
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, QueueError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX");
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let mut conn = self.conn();
        let reply: Option<String> = cmd.query_async(&mut conn).await.map_err(QueueError::store)?;
        Ok(reply.is_some())
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, QueueError> {
        let mut conn = self.conn();
        let updated: i64 = self
            .expire_if_equals
            .key(key)
            .arg(expected)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(QueueError::store)?;
        Ok(updated == 1)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, QueueError> {
        let mut conn = self.conn();
        let deleted: i64 = self
            .delete_if_equals
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(QueueError::store)?;
        Ok(deleted == 1)
    }
}
