//! Tests for the per-principal task store

use std::sync::Arc;

use prometheus_task_queue::core::{AtomicStore, KeySpace, Principal, Task, TaskStore};
use prometheus_task_queue::infra::InMemoryStore;
use serde_json::json;

#[tokio::test]
async fn test_fifo_per_principal() {
    let store = TaskStore::new(Arc::new(InMemoryStore::new()), KeySpace::default());
    let a = Principal::new("a").unwrap();
    let b = Principal::new("b").unwrap();

    for i in 0..5 {
        store.enqueue(&a, &Task::new(json!({ "seq": i }))).await.unwrap();
        store.enqueue(&b, &Task::new(json!({ "seq": 100 + i }))).await.unwrap();
    }
    assert_eq!(store.len(&a).await.unwrap(), 5);

    for i in 0..5 {
        let task = store.dequeue(&a).await.unwrap().unwrap();
        assert_eq!(task.payload["seq"], i);
    }
    assert!(store.dequeue(&a).await.unwrap().is_none());
    assert_eq!(store.len(&b).await.unwrap(), 5);
}

#[tokio::test]
async fn test_dequeue_empty_does_not_block() {
    let store = TaskStore::new(Arc::new(InMemoryStore::new()), KeySpace::default());
    let p = Principal::new("nobody").unwrap();
    assert!(store.dequeue(&p).await.unwrap().is_none());
    assert_eq!(store.len(&p).await.unwrap(), 0);
}

#[tokio::test]
async fn test_uses_prefixed_queue_key() {
    let raw = Arc::new(InMemoryStore::new());
    let store = TaskStore::new(raw.clone(), KeySpace::new("t:"));
    let p = Principal::new("u1").unwrap();
    store.enqueue(&p, &Task::new(json!({"user_id": "u1"}))).await.unwrap();

    assert_eq!(raw.list_len("t:queue:u1").await.unwrap(), 1);
    assert_eq!(
        raw.list_pop("t:queue:u1").await.unwrap().as_deref(),
        Some(r#"{"user_id":"u1"}"#)
    );
}
