//! # Tenant Service
//!
//! The single entry point used by the HTTP API, the CLI and the background
//! pollers. It wires the components together, takes the per-tenant lock
//! around every operation and turns every outcome into an
//! [`OperationResult`]: callers never see a bare error.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use berth_models::models::{
    ContainerStatus, DeploymentRecord, HealthCheckRecord, ResourceUsageRecord, TenantConfig,
    TenantContainer,
};
use berth_utils::logging::prelude::*;
use berth_utils::Settings;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::descriptor::DescriptorRenderer;
use crate::error::OrchestratorError;
use crate::health::{HealthMonitor, HealthReport};
use crate::lifecycle::Orchestrator;
use crate::locks::{TenantLockGuard, TenantLocks};
use crate::metrics;
use crate::metrics_collector::{MetricsCollector, ResourceMetrics};
use crate::ports::PortAllocator;
use crate::provisioner::{ProvisionResult, Provisioner};
use crate::runtime::ContainerRuntime;
use crate::store::{TenantLease, TenantStore};

/// Default number of history rows returned by the list operations.
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Pause between attempts to take a lease held by another process.
const LEASE_RETRY_INTERVAL: Duration = Duration::from_millis(25);

/// Error half of the operation envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OperationError {
    /// Stable machine-readable error kind, e.g. `validation_error`.
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// HTTP status the API answers with for this error.
    #[serde(skip)]
    pub http_status: u16,
}

impl From<&OrchestratorError> for OperationError {
    fn from(e: &OrchestratorError) -> Self {
        OperationError {
            kind: e.kind().to_string(),
            message: e.to_string(),
            field: e.field().map(String::from),
            http_status: e.status_code().as_u16(),
        }
    }
}

/// `{success, data?, error?}` envelope returned by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationError>,
}

impl<T> OperationResult<T> {
    pub fn ok(data: T) -> Self {
        OperationResult {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: &OrchestratorError) -> Self {
        OperationResult {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn error_kind(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.kind.as_str())
    }
}

impl<T> From<Result<T, OrchestratorError>> for OperationResult<T> {
    fn from(result: Result<T, OrchestratorError>) -> Self {
        match result {
            Ok(data) => OperationResult::ok(data),
            Err(e) => OperationResult::err(&e),
        }
    }
}

/// Snapshot returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantStatus {
    pub container: TenantContainer,
    pub latest_health_check: Option<HealthCheckRecord>,
    pub latest_deployment: Option<DeploymentRecord>,
}

/// Everything the service needs besides its store and runtime.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_port: u16,
    pub internal_port: u16,
    pub public_host: String,
    pub image: String,
    pub descriptor_dir: PathBuf,
    pub template: String,
    pub passthrough_env: Vec<String>,
    pub health_path: String,
    pub health_timeout: Duration,
    pub metrics_window_seconds: i64,
    /// Lifetime of a tenant lease in the store.
    pub lease_ttl: Duration,
    /// How long to wait for a tenant another process is working on.
    pub lease_wait: Duration,
}

impl ServiceConfig {
    pub fn from_settings(settings: &Settings) -> Result<Self, OrchestratorError> {
        let orchestrator = &settings.orchestrator;
        url::Url::parse(&format!("http://{}:{}", orchestrator.public_host, orchestrator.base_port))
            .map_err(|e| OrchestratorError::Validation {
                field: "orchestrator.public_host".to_string(),
                reason: e.to_string(),
            })?;
        Ok(ServiceConfig {
            base_port: orchestrator.base_port,
            internal_port: orchestrator.internal_port,
            public_host: orchestrator.public_host.clone(),
            image: orchestrator.image.clone(),
            descriptor_dir: PathBuf::from(&orchestrator.descriptor_dir),
            template: DescriptorRenderer::load_template(orchestrator.template_path.as_deref())?,
            passthrough_env: orchestrator.passthrough_env.clone(),
            health_path: settings.health.path.clone(),
            health_timeout: Duration::from_secs(settings.health.timeout_seconds),
            metrics_window_seconds: settings.metrics.window_seconds,
            lease_ttl: Duration::from_secs(orchestrator.lease_ttl_seconds),
            lease_wait: Duration::from_secs(orchestrator.lease_wait_seconds),
        })
    }
}

/// Both halves of a tenant's exclusion: the store lease orders processes,
/// the in-process lock orders tasks.
struct TenantGuard {
    _lease: TenantLease,
    _local: TenantLockGuard,
}

pub struct TenantService {
    store: Arc<dyn TenantStore>,
    locks: TenantLocks,
    lease_ttl: Duration,
    lease_wait: Duration,
    provisioner: Provisioner,
    orchestrator: Orchestrator,
    health: HealthMonitor,
    collector: MetricsCollector,
}

impl TenantService {
    pub fn new(
        config: ServiceConfig,
        store: Arc<dyn TenantStore>,
        runtime: Arc<dyn ContainerRuntime>,
    ) -> Result<Self, OrchestratorError> {
        let descriptors = Arc::new(DescriptorRenderer::new(
            &config.template,
            config.descriptor_dir,
            config.image.clone(),
            config.internal_port,
            config.passthrough_env,
        )?);
        let ports = PortAllocator::new(store.clone(), config.base_port);

        Ok(Self {
            provisioner: Provisioner::new(store.clone(), ports, descriptors, config.public_host),
            orchestrator: Orchestrator::new(store.clone(), runtime.clone(), config.image),
            health: HealthMonitor::new(
                store.clone(),
                runtime.clone(),
                config.health_path,
                config.health_timeout,
            )?,
            collector: MetricsCollector::new(store.clone(), runtime, config.metrics_window_seconds),
            locks: TenantLocks::new(),
            lease_ttl: config.lease_ttl,
            lease_wait: config.lease_wait,
            store,
        })
    }

    /// Waits for exclusive access to a tenant, in this process and in every
    /// other process sharing the store.
    async fn lock(&self, tenant_id: Uuid) -> Result<TenantGuard, OrchestratorError> {
        let local = self.locks.acquire(tenant_id).await;
        let deadline = tokio::time::Instant::now() + self.lease_wait;
        loop {
            if let Some(lease) = self.store.try_lease(tenant_id, self.lease_ttl)? {
                return Ok(TenantGuard {
                    _lease: lease,
                    _local: local,
                });
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(OrchestratorError::TenantBusy(tenant_id));
            }
            tokio::time::sleep(LEASE_RETRY_INTERVAL).await;
        }
    }

    /// Number of tenants with an operation holding or awaiting their lock.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    fn find(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        self.store
            .get_container(tenant_id)?
            .ok_or(OrchestratorError::TenantNotFound(tenant_id))
    }

    pub async fn provision(&self, config: &TenantConfig) -> OperationResult<ProvisionResult> {
        // Malformed ids are reported by validation; only lock real tenants.
        let _guard = match Uuid::parse_str(config.organization_id.trim()) {
            Ok(tenant_id) => match self.lock(tenant_id).await {
                Ok(guard) => Some(guard),
                Err(e) => return report("provision", Err(e)),
            },
            Err(_) => None,
        };
        let timer = std::time::Instant::now();
        let result = self.provisioner.provision(config).await;
        record_provision(&result, timer);
        report("provision", result)
    }

    pub async fn start(&self, tenant_id: Uuid) -> OperationResult<TenantContainer> {
        let _guard = match self.lock(tenant_id).await {
            Ok(guard) => guard,
            Err(e) => return report("start", Err(e)),
        };
        report("start", self.orchestrator.start(tenant_id).await)
    }

    pub async fn stop(&self, tenant_id: Uuid) -> OperationResult<TenantContainer> {
        let _guard = match self.lock(tenant_id).await {
            Ok(guard) => guard,
            Err(e) => return report("stop", Err(e)),
        };
        report("stop", self.orchestrator.stop(tenant_id).await)
    }

    pub async fn restart(&self, tenant_id: Uuid) -> OperationResult<TenantContainer> {
        let _guard = match self.lock(tenant_id).await {
            Ok(guard) => guard,
            Err(e) => return report("restart", Err(e)),
        };
        report("restart", self.orchestrator.restart(tenant_id).await)
    }

    pub async fn check_health(&self, tenant_id: Uuid) -> OperationResult<HealthReport> {
        let _guard = match self.lock(tenant_id).await {
            Ok(guard) => guard,
            Err(e) => return report("check_health", Err(e)),
        };
        report("check_health", self.health.check_health(tenant_id).await)
    }

    pub async fn get_resource_metrics(&self, tenant_id: Uuid) -> OperationResult<ResourceMetrics> {
        let _guard = match self.lock(tenant_id).await {
            Ok(guard) => guard,
            Err(e) => return report("get_resource_metrics", Err(e)),
        };
        report("get_resource_metrics", self.collector.collect(tenant_id).await)
    }

    pub async fn get_status(&self, tenant_id: Uuid) -> OperationResult<TenantStatus> {
        let result = self.find(tenant_id).and_then(|container| {
            let latest_health_check = self
                .store
                .list_health_checks(container.id, 1)?
                .into_iter()
                .next();
            let latest_deployment = self
                .store
                .list_deployments(container.id, 1)?
                .into_iter()
                .next();
            Ok(TenantStatus {
                container,
                latest_health_check,
                latest_deployment,
            })
        });
        report("get_status", result)
    }

    pub fn list_tenants(&self) -> OperationResult<Vec<TenantContainer>> {
        report("list_tenants", self.store.list_containers())
    }

    pub fn health_history(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> OperationResult<Vec<HealthCheckRecord>> {
        let result = self
            .find(tenant_id)
            .and_then(|c| self.store.list_health_checks(c.id, limit));
        report("health_history", result)
    }

    pub fn deployment_history(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> OperationResult<Vec<DeploymentRecord>> {
        let result = self
            .find(tenant_id)
            .and_then(|c| self.store.list_deployments(c.id, limit));
        report("deployment_history", result)
    }

    pub fn resource_usage_history(
        &self,
        tenant_id: Uuid,
        limit: i64,
    ) -> OperationResult<Vec<ResourceUsageRecord>> {
        let result = self
            .find(tenant_id)
            .and_then(|c| self.store.list_resource_usage(c.id, limit));
        report("resource_usage_history", result)
    }

    /// Tenants whose persisted status is `running`.
    pub fn running_tenants(&self) -> Result<Vec<Uuid>, OrchestratorError> {
        Ok(self
            .store
            .list_containers_by_status(ContainerStatus::Running)?
            .into_iter()
            .map(|c| c.tenant_id)
            .collect())
    }

    /// Checks every running tenant concurrently, one worker per tenant.
    pub async fn check_all_health(&self) -> Vec<(Uuid, OperationResult<HealthReport>)> {
        let tenants = match self.running_tenants() {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(error = %e, "failed to list running tenants for health polling");
                return Vec::new();
            }
        };
        let workers = tenants.len().max(1);
        stream::iter(tenants)
            .map(|tenant_id| async move { (tenant_id, self.check_health(tenant_id).await) })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    /// Samples every running tenant concurrently, one worker per tenant.
    pub async fn collect_all_metrics(&self) -> Vec<(Uuid, OperationResult<ResourceMetrics>)> {
        let tenants = match self.running_tenants() {
            Ok(tenants) => tenants,
            Err(e) => {
                error!(error = %e, "failed to list running tenants for metrics polling");
                return Vec::new();
            }
        };
        let workers = tenants.len().max(1);
        stream::iter(tenants)
            .map(|tenant_id| async move { (tenant_id, self.get_resource_metrics(tenant_id).await) })
            .buffer_unordered(workers)
            .collect()
            .await
    }

    /// Refreshes the per-status tenant gauge.
    pub fn refresh_status_gauge(&self) -> Result<(), OrchestratorError> {
        let containers = self.store.list_containers()?;
        let gauge = metrics::tenants_by_status();
        for status in [
            ContainerStatus::Pending,
            ContainerStatus::Provisioning,
            ContainerStatus::Running,
            ContainerStatus::Stopped,
            ContainerStatus::Failed,
        ] {
            let count = containers.iter().filter(|c| c.status == status).count();
            gauge
                .with_label_values(&[status.as_str()])
                .set(count as i64);
        }
        Ok(())
    }
}

fn record_provision(result: &Result<ProvisionResult, OrchestratorError>, timer: std::time::Instant) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::lifecycle_operations_total()
        .with_label_values(&["provision", outcome])
        .inc();
    metrics::lifecycle_duration_seconds()
        .with_label_values(&["provision"])
        .observe(timer.elapsed().as_secs_f64());
}

/// Logs a failed operation and wraps the outcome.
fn report<T>(operation: &str, result: Result<T, OrchestratorError>) -> OperationResult<T> {
    if let Err(e) = &result {
        match e {
            OrchestratorError::Persistence(_) | OrchestratorError::Descriptor(_) => {
                error!(operation, kind = e.kind(), error = %e, "operation failed")
            }
            _ => info!(operation, kind = e.kind(), error = %e, "operation rejected"),
        }
    }
    result.into()
}
