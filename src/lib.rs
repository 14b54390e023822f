//! # Prometheus Task Queue
//!
//! A rate-limited, per-principal task queue with a drain engine backed by a
//! shared atomic store.
//!
//! Many server processes may accept tasks for the same principal. The shared
//! store (Redis in production) is the single source of truth for each
//! principal's FIFO queue, admission counter, and drain lease, so the
//! guarantees below hold across processes, not just within one.
//!
//! ## Guarantees
//!
//! - **FIFO per principal**: tasks complete in submission order.
//! - **Admission cap**: at most 20 admissions per principal per 60 s fixed
//!   window. Rejected requests still count against the window.
//! - **Pacing**: a drain starts at most one task per second per principal.
//! - **Single drain**: at most one drain loop per principal at any instant,
//!   enforced with a compare-and-set lease in the shared store.
//! - **Failure isolation**: a task whose processing fails is logged and
//!   skipped; the rest of the queue still drains.
//!
//! Tasks are processed at most once: a task dequeued by a process that then
//! crashes is lost. There are no retries.
//!
//! ## Flow
//!
//! ```text
//! submit ─▶ RateCounter::increment ─▶ TaskStore::enqueue ─▶ DrainCoordinator::ensure_running
//!                                                                   │ (lease acquired)
//!                                                                   ▼
//!                                 DrainLoop: Fetching ─▶ Processing ─▶ Pacing ─▶ … ─▶ Done
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_task_queue::builders::build_gateway;
//! use prometheus_task_queue::config::ServiceConfig;
//! use prometheus_task_queue::core::CompletionLogProcessor;
//! use prometheus_task_queue::infra::{InMemorySink, InMemoryStore};
//! use prometheus_task_queue::runtime::TokioSpawner;
//!
//! let sink = Arc::new(InMemorySink::new());
//! let gateway = build_gateway(
//!     &ServiceConfig::default(),
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(CompletionLogProcessor::new(sink.clone())),
//!     TokioSpawner::current(),
//! )?;
//!
//! gateway.submit("u1", serde_json::json!({"user_id": "u1"})).await?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core queueing abstractions: admission, queues, and draining.
pub mod core;
/// Configuration models for limits, timing, and backends.
pub mod config;
/// Builders to construct the pipeline from configuration.
pub mod builders;
/// Infrastructure adapters for the shared store and completion sinks.
pub mod infra;
/// Runtime adapters (tokio) and the HTTP surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
