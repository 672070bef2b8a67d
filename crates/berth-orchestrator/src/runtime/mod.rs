//! Container runtime interface.
//!
//! Four operations are all the orchestrator needs from a runtime: bring a
//! descriptor up, tear it down, ask whether a container is running and take
//! a point-in-time resource sample.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::OrchestratorError;

mod docker;
pub mod stats;

pub use docker::DockerRuntime;

/// Live state of a container as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeStatus {
    Running,
    Stopped,
    Unknown,
}

/// A normalized resource sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub cpu_percent: f64,
    pub memory_usage_mb: f64,
    pub memory_limit_mb: f64,
    pub network_rx_bytes: i64,
    pub network_tx_bytes: i64,
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Brings up the descriptor and returns the runtime-assigned container id.
    ///
    /// `project` names the descriptor's resources; the tenant's container name is used.
    async fn up(&self, descriptor: &Path, project: &str) -> Result<String, OrchestratorError>;

    /// Tears down everything the descriptor brought up.
    async fn down(&self, descriptor: &Path, project: &str) -> Result<(), OrchestratorError>;

    async fn query_status(&self, container_id: &str) -> Result<RuntimeStatus, OrchestratorError>;

    async fn query_stats(&self, container_id: &str) -> Result<ContainerStats, OrchestratorError>;
}
