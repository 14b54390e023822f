//! Tests for the fixed-window rate counter

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prometheus_task_queue::core::{AtomicStore, KeySpace, KeyTtl, Principal, QueueError, RateCounter};
use prometheus_task_queue::infra::InMemoryStore;

/// In-memory store whose first `expire` call times out.
#[derive(Default)]
struct FirstExpireFails {
    inner: InMemoryStore,
    expire_failed: AtomicBool,
}

#[async_trait]
impl AtomicStore for FirstExpireFails {
    async fn list_push(&self, key: &str, value: String) -> Result<(), QueueError> {
        self.inner.list_push(key, value).await
    }

    async fn list_pop(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.inner.list_pop(key).await
    }

    async fn list_len(&self, key: &str) -> Result<usize, QueueError> {
        self.inner.list_len(key).await
    }

    async fn incr(&self, key: &str) -> Result<i64, QueueError> {
        self.inner.incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, QueueError> {
        if !self.expire_failed.swap(true, Ordering::SeqCst) {
            return Err(QueueError::Store("timeout".into()));
        }
        self.inner.expire(key, ttl).await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl, QueueError> {
        self.inner.ttl(key).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, QueueError> {
        self.inner.get(key).await
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, QueueError> {
        self.inner.set_if_absent(key, value, ttl).await
    }

    async fn expire_if_equals(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, QueueError> {
        self.inner.expire_if_equals(key, expected, ttl).await
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, QueueError> {
        self.inner.delete_if_equals(key, expected).await
    }
}

fn counter() -> RateCounter {
    RateCounter::new(
        Arc::new(InMemoryStore::new()),
        KeySpace::default(),
        Duration::from_secs(60),
    )
}

#[tokio::test(start_paused = true)]
async fn test_first_increment_opens_window() {
    let counter = counter();
    let p = Principal::new("u1").unwrap();

    assert_eq!(counter.peek(&p).await.unwrap(), None);
    assert_eq!(counter.remaining_window(&p).await.unwrap(), None);

    assert_eq!(counter.increment(&p).await.unwrap(), 1);
    assert_eq!(
        counter.remaining_window(&p).await.unwrap(),
        Some(Duration::from_secs(60))
    );
}

#[tokio::test(start_paused = true)]
async fn test_window_is_fixed_not_sliding() {
    let counter = counter();
    let p = Principal::new("u1").unwrap();

    counter.increment(&p).await.unwrap();
    tokio::time::advance(Duration::from_secs(50)).await;
    // later increments do not push the expiry out
    assert_eq!(counter.increment(&p).await.unwrap(), 2);
    assert_eq!(
        counter.remaining_window(&p).await.unwrap(),
        Some(Duration::from_secs(10))
    );

    tokio::time::advance(Duration::from_secs(10)).await;
    assert_eq!(counter.peek(&p).await.unwrap(), None);
    assert_eq!(counter.increment(&p).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_counter_without_expiry_gets_one() {
    let counter = RateCounter::new(
        Arc::new(FirstExpireFails::default()),
        KeySpace::default(),
        Duration::from_secs(60),
    );
    let p = Principal::new("u1").unwrap();

    // INCR landed, the opening EXPIRE did not
    assert!(matches!(counter.increment(&p).await, Err(QueueError::Store(_))));
    assert_eq!(counter.peek(&p).await.unwrap(), Some(1));
    assert_eq!(counter.remaining_window(&p).await.unwrap(), None);

    assert_eq!(counter.increment(&p).await.unwrap(), 2);
    assert_eq!(
        counter.remaining_window(&p).await.unwrap(),
        Some(Duration::from_secs(60))
    );

    for _ in 0..25 {
        counter.increment(&p).await.unwrap();
    }
    tokio::time::advance(Duration::from_secs(60)).await;
    assert_eq!(counter.peek(&p).await.unwrap(), None);
    assert_eq!(counter.increment(&p).await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_principals_are_independent() {
    let counter = counter();
    let a = Principal::new("a").unwrap();
    let b = Principal::new("b").unwrap();

    for _ in 0..3 {
        counter.increment(&a).await.unwrap();
    }
    assert_eq!(counter.increment(&b).await.unwrap(), 1);
    assert_eq!(counter.peek(&a).await.unwrap(), Some(3));
}
