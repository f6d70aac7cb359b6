//! Run the acquisition service as an HTTP server.

use crate::config::ForageConfig;
use crate::maintenance;
use crate::rest;
use crate::service::AcquisitionService;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Notify;

/// Build the service and serve it until the process is interrupted.
pub async fn run(port_override: Option<u16>) -> Result<()> {
    let mut config = ForageConfig::from_env();
    if let Some(port) = port_override {
        config.http_port = port;
    }
    let port = config.http_port;

    let service = Arc::new(AcquisitionService::build(config).await?);
    let shutdown = Arc::new(Notify::new());
    let maintenance_handle = maintenance::spawn(Arc::clone(&service), Arc::clone(&shutdown));

    let result = tokio::select! {
        r = rest::start(port, Arc::clone(&service)) => r,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
            Ok(())
        }
    };

    shutdown.notify_waiters();
    let _ = maintenance_handle.await;
    result
}
