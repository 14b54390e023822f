//! Tests for builder modules

use std::sync::Arc;

use prometheus_task_queue::builders::{build_gateway, build_processor};
use prometheus_task_queue::config::ServiceConfig;
use prometheus_task_queue::core::{Principal, QueueError};
use prometheus_task_queue::infra::InMemoryStore;
use prometheus_task_queue::runtime::TokioSpawner;

#[tokio::test]
async fn test_build_gateway_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServiceConfig {
        admission_limit: 7,
        task_log_path: dir.path().join("task.log"),
        ..ServiceConfig::default()
    };
    let processor = build_processor(&cfg).unwrap();
    let gateway = build_gateway(
        &cfg,
        Arc::new(InMemoryStore::new()),
        processor,
        TokioSpawner::current(),
    )
    .unwrap();

    assert_eq!(gateway.admission_limit(), 7);
    let p = Principal::new("u1").unwrap();
    assert_eq!(gateway.tasks().len(&p).await.unwrap(), 0);
}

#[tokio::test]
async fn test_build_gateway_rejects_invalid_config() {
    let cfg = ServiceConfig {
        pace_interval_ms: 0,
        ..ServiceConfig::default()
    };
    let dir = tempfile::tempdir().unwrap();
    let processor = build_processor(&ServiceConfig {
        task_log_path: dir.path().join("task.log"),
        ..ServiceConfig::default()
    })
    .unwrap();
    let result = build_gateway(
        &cfg,
        Arc::new(InMemoryStore::new()),
        processor,
        TokioSpawner::current(),
    );
    assert!(matches!(result, Err(QueueError::InvalidConfig(_))));
}
