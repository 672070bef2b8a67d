//! # Lifecycle Orchestrator
//!
//! Start, stop and restart of provisioned tenant containers.
//!
//! ```text
//! pending -> provisioning -> running <-> stopped
//!                 \             |          /
//!                  +-------> failed <-----+
//! ```
//!
//! Every operation writes a pending [`DeploymentRecord`] before touching the
//! runtime and completes it afterwards. Runtime failures are recorded and
//! returned, never retried. When an operation fails part-way the persisted
//! status is set from what the runtime reports, not from what was intended.
//!
//! Callers must hold the tenant's lock from [`crate::locks::TenantLocks`].

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use berth_models::models::{
    ContainerStateChange, ContainerStatus, DeploymentOutcome, DeploymentRecord, DeploymentType,
    HealthStatus, NewDeploymentRecord, TenantContainer,
};
use berth_utils::logging::prelude::*;
use chrono::Utc;
use uuid::Uuid;

use crate::error::OrchestratorError;
use crate::metrics;
use crate::runtime::{ContainerRuntime, RuntimeStatus};
use crate::store::TenantStore;

pub struct Orchestrator {
    store: Arc<dyn TenantStore>,
    runtime: Arc<dyn ContainerRuntime>,
    image: String,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn TenantStore>,
        runtime: Arc<dyn ContainerRuntime>,
        image: impl Into<String>,
    ) -> Self {
        Self {
            store,
            runtime,
            image: image.into(),
        }
    }

    fn load(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        self.store
            .get_container(tenant_id)?
            .ok_or(OrchestratorError::TenantNotFound(tenant_id))
    }

    /// Starts a provisioned, stopped or failed container.
    pub async fn start(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        let timer = Instant::now();
        let result = self.start_inner(tenant_id).await;
        observe(DeploymentType::Start, timer, &result);
        result
    }

    async fn start_inner(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        let container = self.load(tenant_id)?;
        match container.status {
            ContainerStatus::Running => return Err(OrchestratorError::AlreadyRunning(tenant_id)),
            status if !status.can_start() => {
                return Err(OrchestratorError::InvalidState {
                    tenant_id,
                    operation: "start",
                    status: status.to_string(),
                })
            }
            _ => {}
        }

        let (record, previous) = self.begin(&container, DeploymentType::Start)?;
        match self.bring_up(&container).await {
            Ok(started) => {
                self.finish(&record, DeploymentOutcome::completed(previous.as_deref()));
                info!(tenant_id = %tenant_id, container_id = ?started.container_id, "tenant started");
                Ok(started)
            }
            Err(e) => {
                self.finish(&record, DeploymentOutcome::failed(e.to_string()));
                error!(tenant_id = %tenant_id, error = %e, "tenant failed to start");
                Err(e)
            }
        }
    }

    /// Stops a running container.
    pub async fn stop(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        let timer = Instant::now();
        let result = self.stop_inner(tenant_id).await;
        observe(DeploymentType::Stop, timer, &result);
        result
    }

    async fn stop_inner(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        let container = self.load(tenant_id)?;
        ensure_running(&container)?;

        let (record, previous) = self.begin(&container, DeploymentType::Stop)?;
        match self.tear_down(&container).await {
            Ok(stopped) => {
                self.finish(&record, DeploymentOutcome::completed(previous.as_deref()));
                info!(tenant_id = %tenant_id, "tenant stopped");
                Ok(stopped)
            }
            Err(e) => {
                self.finish(&record, DeploymentOutcome::failed(e.to_string()));
                error!(tenant_id = %tenant_id, error = %e, "tenant failed to stop");
                Err(e)
            }
        }
    }

    /// Stops then starts a running container under one deployment record.
    ///
    /// If the stop half fails the start half is not attempted.
    pub async fn restart(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        let timer = Instant::now();
        let result = self.restart_inner(tenant_id).await;
        observe(DeploymentType::Restart, timer, &result);
        result
    }

    async fn restart_inner(&self, tenant_id: Uuid) -> Result<TenantContainer, OrchestratorError> {
        let container = self.load(tenant_id)?;
        ensure_running(&container)?;

        let (record, previous) = self.begin(&container, DeploymentType::Restart)?;

        let stopped = match self.tear_down(&container).await {
            Ok(stopped) => stopped,
            Err(e) => {
                self.finish(&record, DeploymentOutcome::failed(format!("stop failed: {}", e)));
                error!(tenant_id = %tenant_id, error = %e, "restart aborted, stop failed");
                return Err(e);
            }
        };

        match self.bring_up(&stopped).await {
            Ok(started) => {
                self.finish(&record, DeploymentOutcome::completed(previous.as_deref()));
                info!(tenant_id = %tenant_id, container_id = ?started.container_id, "tenant restarted");
                Ok(started)
            }
            Err(e) => {
                self.finish(&record, DeploymentOutcome::failed(format!("start failed: {}", e)));
                error!(tenant_id = %tenant_id, error = %e, "restart failed, start failed");
                Err(e)
            }
        }
    }

    /// Writes the pending record for an operation.
    ///
    /// Returns the record with the image of the last completed deployment.
    fn begin(
        &self,
        container: &TenantContainer,
        deployment_type: DeploymentType,
    ) -> Result<(DeploymentRecord, Option<String>), OrchestratorError> {
        let previous = self.store.last_deployed_image(container.id)?;
        let record = self.store.insert_deployment(&NewDeploymentRecord::pending(
            container.id,
            deployment_type,
            previous.clone(),
            Some(self.image.clone()),
        ))?;
        debug!(
            tenant_id = %container.tenant_id,
            deployment_id = %record.id,
            operation = %deployment_type,
            "deployment started"
        );
        Ok((record, previous))
    }

    fn finish(&self, record: &DeploymentRecord, outcome: DeploymentOutcome) {
        if let Err(e) = self.store.complete_deployment(record.id, &outcome) {
            error!(deployment_id = %record.id, error = %e, "failed to complete deployment record");
        }
    }

    /// Runs `up` and persists the resulting state on both paths.
    async fn bring_up(
        &self,
        container: &TenantContainer,
    ) -> Result<TenantContainer, OrchestratorError> {
        match self
            .runtime
            .up(Path::new(&container.descriptor_path), &container.container_name)
            .await
        {
            Ok(container_id) => self.store.update_container_state(
                container.id,
                &ContainerStateChange {
                    status: Some(ContainerStatus::Running),
                    container_id: Some(Some(container_id)),
                    last_started_at: Some(Utc::now()),
                    health_status: Some(HealthStatus::Starting),
                    ..Default::default()
                },
            ),
            Err(e) => {
                self.persist_after_failure(
                    container,
                    &ContainerStateChange::status(ContainerStatus::Failed),
                );
                Err(e)
            }
        }
    }

    /// Runs `down` and persists the resulting state on both paths.
    async fn tear_down(
        &self,
        container: &TenantContainer,
    ) -> Result<TenantContainer, OrchestratorError> {
        match self
            .runtime
            .down(Path::new(&container.descriptor_path), &container.container_name)
            .await
        {
            Ok(()) => self.store.update_container_state(
                container.id,
                &ContainerStateChange {
                    status: Some(ContainerStatus::Stopped),
                    last_stopped_at: Some(Utc::now()),
                    ..Default::default()
                },
            ),
            Err(e) => {
                let observed = self.observe_status(container).await;
                warn!(
                    tenant_id = %container.tenant_id,
                    observed = %observed,
                    "stop failed, recording observed status"
                );
                self.persist_after_failure(container, &ContainerStateChange::status(observed));
                Err(e)
            }
        }
    }

    /// Status the runtime actually reports for a container.
    async fn observe_status(&self, container: &TenantContainer) -> ContainerStatus {
        let Some(container_id) = container.container_id.as_deref() else {
            return ContainerStatus::Failed;
        };
        match self.runtime.query_status(container_id).await {
            Ok(RuntimeStatus::Running) => ContainerStatus::Running,
            Ok(RuntimeStatus::Stopped) => ContainerStatus::Stopped,
            Ok(RuntimeStatus::Unknown) => ContainerStatus::Failed,
            Err(e) => {
                warn!(tenant_id = %container.tenant_id, error = %e, "runtime status query failed");
                ContainerStatus::Failed
            }
        }
    }

    fn persist_after_failure(&self, container: &TenantContainer, change: &ContainerStateChange) {
        if let Err(e) = self.store.update_container_state(container.id, change) {
            error!(tenant_id = %container.tenant_id, error = %e, "failed to persist container state");
        }
    }
}

fn ensure_running(container: &TenantContainer) -> Result<(), OrchestratorError> {
    if container.status.can_stop() {
        Ok(())
    } else {
        Err(OrchestratorError::NotRunning {
            tenant_id: container.tenant_id,
            status: container.status.to_string(),
        })
    }
}

fn observe<T>(operation: DeploymentType, timer: Instant, result: &Result<T, OrchestratorError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::lifecycle_operations_total()
        .with_label_values(&[operation.as_str(), outcome])
        .inc();
    metrics::lifecycle_duration_seconds()
        .with_label_values(&[operation.as_str()])
        .observe(timer.elapsed().as_secs_f64());
}
