//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use prometheus_task_queue::config::ServiceConfig;

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |name: &str| vars.get(name).cloned()
}

#[test]
fn test_defaults_are_valid() {
    let cfg = ServiceConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.admission_limit, 20);
    assert_eq!(cfg.admission_window(), Duration::from_secs(60));
    assert_eq!(cfg.drain_settings().pace_interval, Duration::from_millis(1000));
}

#[test]
fn test_invalid_admission_limit() {
    let cfg = ServiceConfig {
        admission_limit: 0,
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_lease_must_outlast_pacing() {
    let cfg = ServiceConfig {
        pace_interval_ms: 5000,
        drain_lease_secs: 5,
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_invalid_window_and_drains() {
    let cfg = ServiceConfig {
        admission_window_secs: 0,
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = ServiceConfig {
        max_concurrent_drains: 0,
        ..ServiceConfig::default()
    };
    assert!(cfg.validate().is_err());
}

#[test]
fn test_from_lookup_overrides() {
    let cfg = ServiceConfig::from_lookup(lookup(&[
        ("PORT", "8080"),
        ("REDIS_URL", "redis://cache:6379"),
        ("ADMISSION_LIMIT", "5"),
        ("KEY_PREFIX", "staging:"),
    ]))
    .unwrap();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.redis_url, "redis://cache:6379");
    assert_eq!(cfg.admission_limit, 5);
    assert_eq!(cfg.key_prefix, "staging:");
    assert_eq!(cfg.pace_interval_ms, 1000);
}

#[test]
fn test_from_lookup_rejects_garbage() {
    let err = ServiceConfig::from_lookup(lookup(&[("PORT", "not-a-port")])).unwrap_err();
    assert!(err.starts_with("PORT"));
}

#[test]
fn test_from_json_partial() {
    let json = r#"{ "port": 4000, "pace_interval_ms": 250 }"#;
    let cfg = ServiceConfig::from_json_str(json).unwrap();
    assert_eq!(cfg.port, 4000);
    assert_eq!(cfg.pace_interval_ms, 250);
    assert_eq!(cfg.admission_limit, 20);
}

#[test]
fn test_from_json_invalid() {
    assert!(ServiceConfig::from_json_str(r#"{ "admission_limit": -1 }"#).is_err());
    assert!(ServiceConfig::from_json_str("{ nope").is_err());
}
