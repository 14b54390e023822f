//! HTTP server admitting tasks into the Redis-backed per-principal queue.
//!
//! Configuration comes from the environment (and `.env`); see
//! [`ServiceConfig::from_lookup`] for the recognized variables.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use prometheus_task_queue::builders::{build_gateway, build_processor};
use prometheus_task_queue::config::ServiceConfig;
use prometheus_task_queue::core::AppResult;
use prometheus_task_queue::infra::RedisStore;
use prometheus_task_queue::runtime::{task_router, TokioSpawner};
use prometheus_task_queue::util::init_tracing;

fn main() -> AppResult<()> {
    init_tracing();
    let cfg = ServiceConfig::from_env().map_err(anyhow::Error::msg)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(cfg.worker_threads)
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(serve(cfg))
}

async fn serve(cfg: ServiceConfig) -> AppResult<()> {
    let store = RedisStore::connect(&cfg.redis_url)
        .await
        .context("connecting to redis")?;
    let processor = build_processor(&cfg)?;
    let gateway = build_gateway(&cfg, Arc::new(store), processor, TokioSpawner::current())?;

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "server running");

    axum::serve(listener, task_router(gateway))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
