//! shellcache worker entry point.
//!
//! Loads configuration and the resource manifest, opens the cache database
//! and serves the worker's events as MCP tools on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::{Context, Result};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{FetchConfig, HttpNetwork};
use shellcache_core::worker::WorkerSignal;
use shellcache_core::{AppConfig, CacheDb, Worker, WorkerConfig};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;
    let worker_config = WorkerConfig::from_app_config(&config).context("failed to build worker configuration")?;

    let db = CacheDb::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open cache database {}", config.db_path.display()))?;
    let network = HttpNetwork::new(FetchConfig::from(&config))?;

    let worker = Worker::new(worker_config, Arc::new(db), Arc::new(network));
    tokio::spawn(log_signals(worker.clone()));

    tracing::info!(
        origin = %worker.config().origin,
        resources = worker.config().manifest.len(),
        shell = worker.config().shell.len(),
        "Starting shellcache worker on stdio transport"
    );

    let handler = handler::ShellcacheServer::new(worker);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}

/// Surface worker signals to the host log. The stdio host has no page
/// clients to claim, so signals are informational.
async fn log_signals(worker: Worker) {
    let mut signals = worker.subscribe();
    loop {
        match signals.recv().await {
            Ok(WorkerSignal::SkipWaiting) => tracing::info!(state = %worker.state(), "worker requested skip waiting"),
            Ok(WorkerSignal::ClaimClients) => tracing::info!(state = %worker.state(), "worker claimed clients"),
            Err(RecvError::Lagged(missed)) => tracing::warn!(missed, "signal log lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
