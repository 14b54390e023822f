//! Wire the gateway, coordinator, and stores from a [`ServiceConfig`].

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::core::{
    AtomicStore, CompletionLogProcessor, DrainCoordinator, IngressGateway, KeySpace, QueueError,
    RateCounter, Spawn, TaskProcessor, TaskStore,
};
use crate::infra::FileSink;

/// Build an ingress gateway (and its drain coordinator) over `store`.
///
/// The store handle is injected so tests and alternative deployments can
/// substitute their own backend.
///
/// # Errors
///
/// Returns `QueueError::InvalidConfig` if `cfg` fails validation.
pub fn build_gateway<S>(
    cfg: &ServiceConfig,
    store: Arc<dyn AtomicStore>,
    processor: Arc<dyn TaskProcessor>,
    spawner: S,
) -> Result<IngressGateway<S>, QueueError>
where
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate().map_err(QueueError::InvalidConfig)?;

    let keys = KeySpace::new(cfg.key_prefix.clone());
    let counter = RateCounter::new(Arc::clone(&store), keys.clone(), cfg.admission_window());
    let tasks = TaskStore::new(Arc::clone(&store), keys.clone());
    let coordinator = DrainCoordinator::new(store, keys, processor, cfg.drain_settings(), spawner);

    tracing::info!(
        admission_limit = cfg.admission_limit,
        window_secs = cfg.admission_window_secs,
        pace_interval_ms = cfg.pace_interval_ms,
        max_concurrent_drains = cfg.max_concurrent_drains,
        "ingress gateway initialized"
    );

    Ok(IngressGateway::new(counter, tasks, coordinator, cfg.admission_limit))
}

/// Build the default processor: completion records appended to
/// `cfg.task_log_path`.
///
/// # Errors
///
/// Returns `QueueError::InvalidConfig` if the log location is unusable.
pub fn build_processor(cfg: &ServiceConfig) -> Result<Arc<dyn TaskProcessor>, QueueError> {
    let sink = FileSink::new(&cfg.task_log_path)
        .map_err(|e| QueueError::InvalidConfig(format!("task_log_path: {e:#}")))?;
    Ok(Arc::new(CompletionLogProcessor::new(Arc::new(sink))))
}
