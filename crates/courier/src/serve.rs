// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Starts the full dispatch daemon: SQLite storage, the device-bridge
//! transport, the session manager (with restart recovery), and the
//! single-consumer bulk-send worker. Supports graceful shutdown via
//! signal handlers.

use std::sync::Arc;

use courier_bridge::BridgeTransport;
use courier_config::CourierConfig;
use courier_core::error::CourierError;
use courier_core::types::HealthStatus;
use courier_core::{PluginAdapter, StorageAdapter, TransportClient};
use courier_session::SessionManager;
use courier_storage::SqliteStorage;
use courier_worker::{JobQueue, Worker};
use tracing::{info, warn};

use crate::shutdown;

/// Runs the `courier serve` command.
///
/// Initializes storage and transport, resumes previously ready sessions,
/// then enters the worker loop until a shutdown signal arrives.
pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.daemon.log_level);

    info!(name = config.daemon.name.as_str(), "starting courier serve");

    // Initialize storage.
    let storage = Arc::new(SqliteStorage::new(config.storage.clone()));
    storage.initialize().await?;
    let storage_dyn: Arc<dyn StorageAdapter + Send + Sync> = storage.clone();

    // Initialize the device-bridge transport. An unreachable bridge is not
    // fatal at startup; sessions will fail to register until it comes up.
    let transport = Arc::new(BridgeTransport::new(&config.transport)?);
    match transport.health_check().await {
        Ok(HealthStatus::Healthy) => info!("device bridge reachable"),
        Ok(HealthStatus::Degraded(detail)) | Ok(HealthStatus::Unhealthy(detail)) => {
            warn!(detail = detail.as_str(), "device bridge not healthy");
        }
        Err(e) => warn!(error = %e, "device bridge health check failed"),
    }
    let transport_dyn: Arc<dyn TransportClient + Send + Sync> = transport;

    let sessions = Arc::new(SessionManager::new(
        storage_dyn.clone(),
        transport_dyn,
        config.transport.clone(),
        config.worker.clone(),
    ));

    let queue = JobQueue::new(storage_dyn.clone(), &config.worker.queue_name);
    match queue.len().await {
        Ok(depth) if depth > 0 => info!(depth, "queued jobs waiting from previous run"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to read queue depth"),
    }

    let worker = Worker::new(
        storage_dyn.clone(),
        sessions,
        queue,
        config.worker.clone(),
    );

    // Install signal handler and run the worker until cancelled.
    let cancel = shutdown::install_signal_handler();
    worker.run(cancel).await;

    // Flush pending writes before exit.
    StorageAdapter::close(storage.as_ref()).await?;

    info!("courier serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber with the given log level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("courier={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
