//! Service configuration structures.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::DrainSettings;

/// Root service configuration.
///
/// Every field has a default, so partial JSON documents and sparse
/// environments are both valid sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP listening port.
    pub port: u16,
    /// Shared store connection URL.
    pub redis_url: String,
    /// Completion log path.
    pub task_log_path: PathBuf,
    /// Admissions allowed per principal per window.
    pub admission_limit: i64,
    /// Admission window length in seconds.
    pub admission_window_secs: u64,
    /// Minimum spacing between task starts during a drain, in milliseconds.
    pub pace_interval_ms: u64,
    /// Drain lease expiry in seconds.
    pub drain_lease_secs: u64,
    /// Loops allowed to execute concurrently in one process.
    pub max_concurrent_drains: usize,
    /// Prefix prepended to every store key.
    pub key_prefix: String,
    /// Runtime worker threads for the server binary.
    pub worker_threads: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            redis_url: "redis://127.0.0.1:6379".into(),
            task_log_path: PathBuf::from("task.log"),
            admission_limit: 20,
            admission_window_secs: 60,
            pace_interval_ms: 1000,
            drain_lease_secs: 30,
            max_concurrent_drains: 1024,
            key_prefix: String::new(),
            worker_threads: num_cpus::get(),
        }
    }
}

impl ServiceConfig {
    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.admission_limit <= 0 {
            return Err("admission_limit must be greater than 0".into());
        }
        if self.admission_window_secs == 0 {
            return Err("admission_window_secs must be greater than 0".into());
        }
        if self.pace_interval_ms == 0 {
            return Err("pace_interval_ms must be greater than 0".into());
        }
        if self.drain_lease_secs.saturating_mul(1000) <= self.pace_interval_ms {
            return Err("drain_lease_secs must exceed the pace interval".into());
        }
        if self.max_concurrent_drains == 0 {
            return Err("max_concurrent_drains must be greater than 0".into());
        }
        if self.worker_threads == 0 {
            return Err("worker_threads must be greater than 0".into());
        }
        if self.redis_url.is_empty() {
            return Err("redis_url must not be empty".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a message on parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration from the process environment, reading a `.env` file
    /// first if one exists.
    ///
    /// # Errors
    ///
    /// Returns a message on an unparsable variable or failed validation.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build configuration from a variable lookup, starting from defaults.
    ///
    /// Recognized variables: `PORT`, `REDIS_URL`, `TASK_LOG_PATH`,
    /// `ADMISSION_LIMIT`, `ADMISSION_WINDOW_SECS`, `PACE_INTERVAL_MS`,
    /// `DRAIN_LEASE_SECS`, `MAX_CONCURRENT_DRAINS`, `KEY_PREFIX`,
    /// `WORKER_THREADS`.
    ///
    /// # Errors
    ///
    /// Returns a message on an unparsable variable or failed validation.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        fn parse<T: std::str::FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, String>
        where
            T::Err: std::fmt::Display,
        {
            raw.map(|v| v.trim().parse::<T>().map_err(|e| format!("{name}: {e}")))
                .transpose()
        }

        let mut cfg = Self::default();
        if let Some(port) = parse("PORT", lookup("PORT"))? {
            cfg.port = port;
        }
        if let Some(url) = lookup("REDIS_URL") {
            cfg.redis_url = url;
        }
        if let Some(path) = lookup("TASK_LOG_PATH") {
            cfg.task_log_path = PathBuf::from(path);
        }
        if let Some(limit) = parse("ADMISSION_LIMIT", lookup("ADMISSION_LIMIT"))? {
            cfg.admission_limit = limit;
        }
        if let Some(secs) = parse("ADMISSION_WINDOW_SECS", lookup("ADMISSION_WINDOW_SECS"))? {
            cfg.admission_window_secs = secs;
        }
        if let Some(ms) = parse("PACE_INTERVAL_MS", lookup("PACE_INTERVAL_MS"))? {
            cfg.pace_interval_ms = ms;
        }
        if let Some(secs) = parse("DRAIN_LEASE_SECS", lookup("DRAIN_LEASE_SECS"))? {
            cfg.drain_lease_secs = secs;
        }
        if let Some(n) = parse("MAX_CONCURRENT_DRAINS", lookup("MAX_CONCURRENT_DRAINS"))? {
            cfg.max_concurrent_drains = n;
        }
        if let Some(prefix) = lookup("KEY_PREFIX") {
            cfg.key_prefix = prefix;
        }
        if let Some(n) = parse("WORKER_THREADS", lookup("WORKER_THREADS"))? {
            cfg.worker_threads = n;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Admission window as a duration.
    #[must_use]
    pub const fn admission_window(&self) -> Duration {
        Duration::from_secs(self.admission_window_secs)
    }

    /// Drain timing derived from this configuration.
    #[must_use]
    pub const fn drain_settings(&self) -> DrainSettings {
        DrainSettings {
            pace_interval: Duration::from_millis(self.pace_interval_ms),
            lease_ttl: Duration::from_secs(self.drain_lease_secs),
            max_concurrent_drains: self.max_concurrent_drains,
        }
    }
}
