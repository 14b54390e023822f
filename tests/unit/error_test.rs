//! Tests for error types

use prometheus_task_queue::core::QueueError;

#[test]
fn test_validation_error() {
    let err = QueueError::Validation("missing user_id".to_string());
    assert_eq!(format!("{}", err), "validation failed: missing user_id");
}

#[test]
fn test_rate_limit_error() {
    let err = QueueError::RateLimitExceeded { count: 21, limit: 20 };
    assert_eq!(
        format!("{}", err),
        "rate limit exceeded: 21 admissions in window (limit 20)"
    );
}

#[test]
fn test_store_error() {
    let err = QueueError::store("connection refused");
    assert_eq!(format!("{}", err), "store error: connection refused");
}

#[test]
fn test_drain_lease_lost_error() {
    let err = QueueError::DrainLeaseLost("u1".to_string());
    assert_eq!(format!("{}", err), "drain lease lost for principal u1");
}
