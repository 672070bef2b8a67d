//! Resource Metrics Collector
//!
//! Samples CPU, memory and network usage of a running tenant container and
//! appends a [`ResourceUsageRecord`] covering the trailing sampling window.

use std::sync::Arc;

use berth_models::models::{ContainerStatus, NewResourceUsageRecord, ResourceUsageRecord};
use berth_utils::logging::prelude::*;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::metrics;
use crate::runtime::{ContainerRuntime, ContainerStats};
use crate::store::TenantStore;

pub const DEFAULT_WINDOW_SECONDS: i64 = 60;

/// A persisted resource sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    #[serde(flatten)]
    pub stats: ContainerStats,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

impl From<&ResourceUsageRecord> for ResourceMetrics {
    fn from(record: &ResourceUsageRecord) -> Self {
        ResourceMetrics {
            stats: ContainerStats {
                cpu_percent: record.cpu_percent,
                memory_usage_mb: record.memory_usage_mb,
                memory_limit_mb: record.memory_limit_mb,
                network_rx_bytes: record.network_rx_bytes,
                network_tx_bytes: record.network_tx_bytes,
            },
            period_start: record.period_start,
            period_end: record.period_end,
        }
    }
}

pub struct MetricsCollector {
    store: Arc<dyn TenantStore>,
    runtime: Arc<dyn ContainerRuntime>,
    window: Duration,
}

impl MetricsCollector {
    pub fn new(
        store: Arc<dyn TenantStore>,
        runtime: Arc<dyn ContainerRuntime>,
        window_seconds: i64,
    ) -> Self {
        Self {
            store,
            runtime,
            window: Duration::seconds(window_seconds.max(1)),
        }
    }

    /// Samples a running container and records the result.
    ///
    /// Requires persisted status `running` and a runtime container id.
    pub async fn collect(&self, tenant_id: Uuid) -> Result<ResourceMetrics, OrchestratorError> {
        let container = self
            .store
            .get_container(tenant_id)?
            .ok_or(OrchestratorError::TenantNotFound(tenant_id))?;

        let container_id = match (&container.status, container.container_id.as_deref()) {
            (ContainerStatus::Running, Some(id)) => id.to_string(),
            _ => return Err(OrchestratorError::ContainerNotRunning(tenant_id)),
        };

        let stats = self.runtime.query_stats(&container_id).await.map_err(|e| match e {
            OrchestratorError::RuntimeQuery(_) => e,
            other => OrchestratorError::RuntimeQuery(other.to_string()),
        })?;

        let period_end = Utc::now();
        let record = NewResourceUsageRecord::new(
            container.id,
            period_end - self.window,
            period_end,
            stats.cpu_percent,
            stats.memory_usage_mb,
            stats.memory_limit_mb,
            stats.network_rx_bytes,
            stats.network_tx_bytes,
        )
        .map_err(OrchestratorError::RuntimeQuery)?;
        let stored = self.store.insert_resource_usage(&record)?;
        metrics::resource_samples_total().inc();

        debug!(
            tenant_id = %tenant_id,
            cpu_percent = stored.cpu_percent,
            memory_usage_mb = stored.memory_usage_mb,
            "resource sample recorded"
        );
        Ok(ResourceMetrics::from(&stored))
    }
}
