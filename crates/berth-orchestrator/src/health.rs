//! Health Monitor Module
//!
//! Probes a tenant's health endpoint and keeps an unbroken history of the
//! results. Every call appends exactly one [`HealthCheckRecord`] and stamps
//! the container's `health_status`/`last_health_check_at`, whatever the
//! outcome.
//!
//! Whether a container is running is asked of the runtime, not read from
//! the persisted status; the two can diverge after a host restart.

use std::sync::Arc;
use std::time::{Duration, Instant};

use berth_models::models::{
    ContainerStatus, HealthCheckRecord, HealthCheckStatus, NewHealthCheckRecord, TenantContainer,
};
use berth_utils::logging::prelude::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::metrics;
use crate::runtime::{ContainerRuntime, RuntimeStatus};
use crate::store::TenantStore;

pub const NOT_RUNNING: &str = "not running";

/// Outcome of one health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub healthy: bool,
    pub status: HealthCheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl From<&HealthCheckRecord> for HealthReport {
    fn from(record: &HealthCheckRecord) -> Self {
        HealthReport {
            healthy: record.status == HealthCheckStatus::Healthy,
            status: record.status,
            response_time_ms: record.response_time_ms,
            http_status_code: record.http_status_code,
            error: record.error_message.clone(),
            checked_at: record.checked_at,
        }
    }
}

/// Probe outcome before it is persisted.
struct Probe {
    status: HealthCheckStatus,
    response_time_ms: Option<i64>,
    http_status_code: Option<i32>,
    error: Option<String>,
}

impl Probe {
    fn unhealthy(error: impl Into<String>) -> Self {
        Probe {
            status: HealthCheckStatus::Unhealthy,
            response_time_ms: None,
            http_status_code: None,
            error: Some(error.into()),
        }
    }
}

pub struct HealthMonitor {
    store: Arc<dyn TenantStore>,
    runtime: Arc<dyn ContainerRuntime>,
    client: reqwest::Client,
    path: String,
    timeout: Duration,
}

impl HealthMonitor {
    pub fn new(
        store: Arc<dyn TenantStore>,
        runtime: Arc<dyn ContainerRuntime>,
        path: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OrchestratorError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OrchestratorError::RuntimeQuery(format!("http client: {}", e)))?;
        Ok(Self {
            store,
            runtime,
            client,
            path: path.into(),
            timeout,
        })
    }

    /// URL probed for a container.
    pub fn health_url(&self, container: &TenantContainer) -> String {
        let path = self.path.trim_start_matches('/');
        format!("{}/{}", container.tenant_url.trim_end_matches('/'), path)
    }

    /// Checks a tenant's health and records the outcome.
    pub async fn check_health(&self, tenant_id: Uuid) -> Result<HealthReport, OrchestratorError> {
        let container = self
            .store
            .get_container(tenant_id)?
            .ok_or(OrchestratorError::TenantNotFound(tenant_id))?;

        let timer = Instant::now();
        let probe = match self.live_status(&container).await {
            Ok(RuntimeStatus::Running) => self.probe(&container).await,
            Ok(_) => Probe::unhealthy(NOT_RUNNING),
            Err(e) => Probe::unhealthy(e.to_string()),
        };
        metrics::health_check_duration_seconds().observe(timer.elapsed().as_secs_f64());
        metrics::health_checks_total()
            .with_label_values(&[probe.status.as_str()])
            .inc();

        let record = NewHealthCheckRecord::new(
            container.id,
            Utc::now(),
            probe.status,
            probe.response_time_ms,
            probe.http_status_code,
            probe.error,
        )
        .map_err(OrchestratorError::Persistence)?;
        let stored = self
            .store
            .record_health_check(&record, record.status.container_health())?;

        debug!(
            tenant_id = %tenant_id,
            status = stored.status.as_str(),
            response_time_ms = ?stored.response_time_ms,
            "health check recorded"
        );
        Ok(HealthReport::from(&stored))
    }

    /// Asks the runtime whether the container is up, warning when it disagrees
    /// with the persisted status.
    async fn live_status(
        &self,
        container: &TenantContainer,
    ) -> Result<RuntimeStatus, OrchestratorError> {
        let Some(container_id) = container.container_id.as_deref() else {
            return Ok(RuntimeStatus::Stopped);
        };
        let live = self.runtime.query_status(container_id).await?;

        let persisted_running = container.status == ContainerStatus::Running;
        let live_running = live == RuntimeStatus::Running;
        if persisted_running != live_running {
            warn!(
                tenant_id = %container.tenant_id,
                persisted = %container.status,
                live = ?live,
                "persisted status disagrees with runtime"
            );
        }
        Ok(live)
    }

    async fn probe(&self, container: &TenantContainer) -> Probe {
        let url = self.health_url(container);
        let started = Instant::now();
        let response = self.client.get(&url).send().await;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        match response {
            Ok(resp) if resp.status() == reqwest::StatusCode::OK => Probe {
                status: HealthCheckStatus::Healthy,
                response_time_ms: Some(elapsed_ms),
                http_status_code: Some(200),
                error: None,
            },
            Ok(resp) => {
                let code = resp.status().as_u16() as i32;
                Probe {
                    status: HealthCheckStatus::Unhealthy,
                    response_time_ms: Some(elapsed_ms),
                    http_status_code: Some(code),
                    error: Some(format!("health endpoint returned HTTP {}", code)),
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("health probe timed out after {}ms", self.timeout.as_millis())
                } else {
                    format!("health probe failed: {}", e)
                };
                warn!(tenant_id = %container.tenant_id, url = %url, error = %error, "health probe failed");
                Probe {
                    status: HealthCheckStatus::Timeout,
                    response_time_ms: None,
                    http_status_code: None,
                    error: Some(error),
                }
            }
        }
    }
}
