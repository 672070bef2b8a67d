//! Helpers for running the orchestrator as a long-lived process.

pub mod background_tasks;

use berth_utils::logging::prelude::*;
use tokio::sync::oneshot;

/// Resolves once a shutdown has been requested.
pub async fn shutdown(shutdown_rx: oneshot::Receiver<()>) {
    let _ = shutdown_rx.await;
    info!("Shutdown requested, draining in-flight requests");
}
