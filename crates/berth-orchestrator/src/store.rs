//! Persistence interface for the four entities the orchestrator owns.
//!
//! [`TenantStore`] is implemented by the PostgreSQL [`crate::dal::DAL`] and by
//! [`MemoryStore`], which keeps everything in process behind a single mutex.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use berth_models::models::{
    ContainerStateChange, ContainerStatus, DeploymentOutcome, DeploymentRecord,
    DeploymentStatus, HealthCheckRecord, HealthStatus, NewDeploymentRecord,
    NewHealthCheckRecord, NewResourceUsageRecord, NewTenantContainer, ResourceUsageRecord,
    TenantContainer, DeploymentType,
};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::OrchestratorError;

pub type StoreResult<T> = Result<T, OrchestratorError>;

/// Highest port number a tenant can be given.
pub const MAX_PORT: i64 = 65535;

/// Computes the port following `current_max`, or `base_port` when nothing is allocated.
pub fn next_port(current_max: Option<i32>, base_port: i32) -> StoreResult<i32> {
    let candidate = match current_max {
        Some(max) => (max as i64 + 1).max(base_port as i64),
        None => base_port as i64,
    };
    if candidate > MAX_PORT {
        return Err(OrchestratorError::ExhaustedRange(candidate));
    }
    Ok(candidate as i32)
}

/// Exclusive hold on one tenant shared by every process using the same store.
/// Released when dropped; an abandoned lease expires after its TTL.
pub struct TenantLease {
    _held: Box<dyn Send>,
}

impl TenantLease {
    pub fn new(held: impl Send + 'static) -> Self {
        Self {
            _held: Box::new(held),
        }
    }
}

fn lease_expiry(ttl: Duration) -> StoreResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .map(|ttl| Utc::now() + ttl)
        .map_err(|e| OrchestratorError::Persistence(format!("invalid lease ttl: {}", e)))
}

/// Builds the container row for an allocated port.
pub type ContainerBuilder<'a> = dyn FnMut(i32) -> StoreResult<NewTenantContainer> + 'a;

pub trait TenantStore: Send + Sync {
    /// Takes the tenant's lease unless a live one is held elsewhere.
    ///
    /// Returns `None` without waiting when the tenant is busy.
    fn try_lease(&self, tenant_id: Uuid, ttl: Duration) -> StoreResult<Option<TenantLease>>;

    /// Container belonging to `tenant_id`, if one was provisioned.
    fn get_container(&self, tenant_id: Uuid) -> StoreResult<Option<TenantContainer>>;

    fn list_containers(&self) -> StoreResult<Vec<TenantContainer>>;

    fn list_containers_by_status(&self, status: ContainerStatus)
        -> StoreResult<Vec<TenantContainer>>;

    /// Highest external port currently allocated.
    fn max_external_port(&self) -> StoreResult<Option<i32>>;

    /// Atomically allocates the next external port and inserts the container.
    ///
    /// Within one serialized unit of work this rejects a second container for
    /// `tenant_id`, computes `max(external_port) + 1` (or `base_port`), calls
    /// `build` with that port, inserts the row and appends a pending
    /// `provision` deployment record.
    fn create_with_next_port(
        &self,
        tenant_id: Uuid,
        base_port: i32,
        new_image_tag: Option<&str>,
        build: &mut ContainerBuilder<'_>,
    ) -> StoreResult<TenantContainer>;

    /// Applies a lifecycle change to the container row with primary key `id`.
    fn update_container_state(
        &self,
        id: Uuid,
        change: &ContainerStateChange,
    ) -> StoreResult<TenantContainer>;

    /// Appends a health record and stamps the container's health fields.
    fn record_health_check(
        &self,
        record: &NewHealthCheckRecord,
        health: HealthStatus,
    ) -> StoreResult<HealthCheckRecord>;

    fn insert_resource_usage(
        &self,
        record: &NewResourceUsageRecord,
    ) -> StoreResult<ResourceUsageRecord>;

    fn insert_deployment(&self, record: &NewDeploymentRecord) -> StoreResult<DeploymentRecord>;

    fn complete_deployment(
        &self,
        id: Uuid,
        outcome: &DeploymentOutcome,
    ) -> StoreResult<DeploymentRecord>;

    /// Image of the most recent completed deployment, if any.
    fn last_deployed_image(&self, tenant_container_id: Uuid) -> StoreResult<Option<String>>;

    /// Newest first.
    fn list_health_checks(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<HealthCheckRecord>>;

    /// Newest first.
    fn list_deployments(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<DeploymentRecord>>;

    /// Newest first.
    fn list_resource_usage(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ResourceUsageRecord>>;
}

#[derive(Default)]
struct Tables {
    containers: Vec<TenantContainer>,
    health_checks: Vec<HealthCheckRecord>,
    resource_usage: Vec<ResourceUsageRecord>,
    deployments: Vec<DeploymentRecord>,
}

/// Live leases: tenant id to (lease id, expiry).
type LeaseTable = Mutex<HashMap<Uuid, (Uuid, DateTime<Utc>)>>;

/// In-process store. Every operation holds one mutex, so the allocate-and-insert
/// primitive is serialized across all tenants.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    leases: Arc<LeaseTable>,
}

struct MemoryLease {
    tenant_id: Uuid,
    lease_id: Uuid,
    leases: Arc<LeaseTable>,
}

impl Drop for MemoryLease {
    fn drop(&mut self) {
        if let Ok(mut leases) = self.leases.lock() {
            if leases.get(&self.tenant_id).map(|(id, _)| *id) == Some(self.lease_id) {
                leases.remove(&self.tenant_id);
            }
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| OrchestratorError::Persistence("memory store lock poisoned".to_string()))
    }
}

fn newest_first<T: Clone, K: Ord>(rows: impl Iterator<Item = T>, key: impl Fn(&T) -> K, limit: i64) -> Vec<T> {
    // Reversed first so that rows with equal keys keep newest-inserted first.
    let mut rows: Vec<T> = rows.collect();
    rows.reverse();
    rows.sort_by_key(|r| std::cmp::Reverse(key(r)));
    rows.truncate(limit.max(0) as usize);
    rows
}

impl TenantStore for MemoryStore {
    fn try_lease(&self, tenant_id: Uuid, ttl: Duration) -> StoreResult<Option<TenantLease>> {
        let expires_at = lease_expiry(ttl)?;
        let mut leases = self
            .leases
            .lock()
            .map_err(|_| OrchestratorError::Persistence("lease table lock poisoned".to_string()))?;

        if let Some((_, held_until)) = leases.get(&tenant_id) {
            if *held_until > Utc::now() {
                return Ok(None);
            }
        }
        let lease_id = Uuid::new_v4();
        leases.insert(tenant_id, (lease_id, expires_at));
        Ok(Some(TenantLease::new(MemoryLease {
            tenant_id,
            lease_id,
            leases: self.leases.clone(),
        })))
    }

    fn get_container(&self, tenant_id: Uuid) -> StoreResult<Option<TenantContainer>> {
        Ok(self
            .lock()?
            .containers
            .iter()
            .find(|c| c.tenant_id == tenant_id)
            .cloned())
    }

    fn list_containers(&self) -> StoreResult<Vec<TenantContainer>> {
        let mut containers = self.lock()?.containers.clone();
        containers.sort_by_key(|c| c.external_port);
        Ok(containers)
    }

    fn list_containers_by_status(
        &self,
        status: ContainerStatus,
    ) -> StoreResult<Vec<TenantContainer>> {
        Ok(self
            .list_containers()?
            .into_iter()
            .filter(|c| c.status == status)
            .collect())
    }

    fn max_external_port(&self) -> StoreResult<Option<i32>> {
        Ok(self.lock()?.containers.iter().map(|c| c.external_port).max())
    }

    fn create_with_next_port(
        &self,
        tenant_id: Uuid,
        base_port: i32,
        new_image_tag: Option<&str>,
        build: &mut ContainerBuilder<'_>,
    ) -> StoreResult<TenantContainer> {
        let mut tables = self.lock()?;

        if tables.containers.iter().any(|c| c.tenant_id == tenant_id) {
            return Err(OrchestratorError::DuplicateTenant(tenant_id));
        }

        let current_max = tables.containers.iter().map(|c| c.external_port).max();
        let port = next_port(current_max, base_port)?;
        let new = build(port)?;

        let now = Utc::now();
        let container = TenantContainer {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            tenant_id: new.tenant_id,
            tenant_name: new.tenant_name,
            container_name: new.container_name,
            container_id: None,
            external_port: new.external_port,
            internal_port: new.internal_port,
            tenant_url: new.tenant_url,
            cpu_limit: new.cpu_limit,
            memory_limit_mb: new.memory_limit_mb,
            disk_limit_mb: new.disk_limit_mb,
            descriptor_path: new.descriptor_path,
            status: new.status,
            last_started_at: None,
            last_stopped_at: None,
            health_status: new.health_status,
            last_health_check_at: None,
        };

        let provision = NewDeploymentRecord::pending(
            container.id,
            DeploymentType::Provision,
            None,
            new_image_tag.map(String::from),
        );
        tables.deployments.push(pending_row(&provision));
        tables.containers.push(container.clone());
        Ok(container)
    }

    fn update_container_state(
        &self,
        id: Uuid,
        change: &ContainerStateChange,
    ) -> StoreResult<TenantContainer> {
        let mut tables = self.lock()?;
        let container = tables
            .containers
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| OrchestratorError::Persistence(format!("container {} not found", id)))?;
        change.apply_to(container);
        container.updated_at = Utc::now();
        Ok(container.clone())
    }

    fn record_health_check(
        &self,
        record: &NewHealthCheckRecord,
        health: HealthStatus,
    ) -> StoreResult<HealthCheckRecord> {
        let mut tables = self.lock()?;
        let container = tables
            .containers
            .iter_mut()
            .find(|c| c.id == record.tenant_container_id)
            .ok_or_else(|| {
                OrchestratorError::Persistence(format!(
                    "container {} not found",
                    record.tenant_container_id
                ))
            })?;
        container.health_status = health;
        container.last_health_check_at = Some(record.checked_at);
        container.updated_at = Utc::now();

        let row = HealthCheckRecord {
            id: Uuid::new_v4(),
            tenant_container_id: record.tenant_container_id,
            checked_at: record.checked_at,
            status: record.status,
            response_time_ms: record.response_time_ms,
            http_status_code: record.http_status_code,
            error_message: record.error_message.clone(),
        };
        tables.health_checks.push(row.clone());
        Ok(row)
    }

    fn insert_resource_usage(
        &self,
        record: &NewResourceUsageRecord,
    ) -> StoreResult<ResourceUsageRecord> {
        let row = ResourceUsageRecord {
            id: Uuid::new_v4(),
            tenant_container_id: record.tenant_container_id,
            period_start: record.period_start,
            period_end: record.period_end,
            cpu_percent: record.cpu_percent,
            memory_usage_mb: record.memory_usage_mb,
            memory_limit_mb: record.memory_limit_mb,
            network_rx_bytes: record.network_rx_bytes,
            network_tx_bytes: record.network_tx_bytes,
        };
        self.lock()?.resource_usage.push(row.clone());
        Ok(row)
    }

    fn insert_deployment(&self, record: &NewDeploymentRecord) -> StoreResult<DeploymentRecord> {
        let row = pending_row(record);
        self.lock()?.deployments.push(row.clone());
        Ok(row)
    }

    fn complete_deployment(
        &self,
        id: Uuid,
        outcome: &DeploymentOutcome,
    ) -> StoreResult<DeploymentRecord> {
        let mut tables = self.lock()?;
        let record = tables
            .deployments
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| {
                OrchestratorError::Persistence(format!("deployment record {} not found", id))
            })?;
        outcome.apply_to(record);
        Ok(record.clone())
    }

    fn last_deployed_image(&self, tenant_container_id: Uuid) -> StoreResult<Option<String>> {
        Ok(self
            .lock()?
            .deployments
            .iter()
            .filter(|d| {
                d.tenant_container_id == tenant_container_id
                    && d.status == DeploymentStatus::Completed
            })
            .max_by_key(|d| d.started_at)
            .and_then(|d| d.new_image_tag.clone()))
    }

    fn list_health_checks(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<HealthCheckRecord>> {
        let tables = self.lock()?;
        Ok(newest_first(
            tables
                .health_checks
                .iter()
                .filter(|r| r.tenant_container_id == tenant_container_id)
                .cloned(),
            |r| r.checked_at,
            limit,
        ))
    }

    fn list_deployments(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<DeploymentRecord>> {
        let tables = self.lock()?;
        Ok(newest_first(
            tables
                .deployments
                .iter()
                .filter(|r| r.tenant_container_id == tenant_container_id)
                .cloned(),
            |r| r.started_at,
            limit,
        ))
    }

    fn list_resource_usage(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ResourceUsageRecord>> {
        let tables = self.lock()?;
        Ok(newest_first(
            tables
                .resource_usage
                .iter()
                .filter(|r| r.tenant_container_id == tenant_container_id)
                .cloned(),
            |r| r.period_end,
            limit,
        ))
    }
}

fn pending_row(record: &NewDeploymentRecord) -> DeploymentRecord {
    DeploymentRecord {
        id: Uuid::new_v4(),
        tenant_container_id: record.tenant_container_id,
        deployment_type: record.deployment_type,
        status: record.status,
        previous_image_tag: record.previous_image_tag.clone(),
        new_image_tag: record.new_image_tag.clone(),
        started_at: record.started_at,
        completed_at: None,
        error_message: None,
        can_rollback: record.can_rollback,
    }
}
