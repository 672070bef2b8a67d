//! Data Access Layer backed by PostgreSQL.
//!
//! Each table gets its own accessor struct borrowing the shared [`DAL`]; the
//! [`TenantStore`] implementation at the bottom of this module stitches them
//! together into the persistence interface the orchestrator consumes.

use berth_models::models::{
    ContainerStateChange, ContainerStatus, DeploymentOutcome, DeploymentRecord,
    HealthCheckRecord, HealthStatus, NewDeploymentRecord, NewHealthCheckRecord,
    NewResourceUsageRecord, ResourceUsageRecord, TenantContainer,
};
use std::time::Duration;

use uuid::Uuid;

use crate::db::ConnectionPool;
use crate::store::{ContainerBuilder, StoreResult, TenantLease, TenantStore};

mod deployments;
mod health_checks;
mod resource_usage;
mod tenant_containers;
mod tenant_leases;

pub use deployments::DeploymentsDAL;
pub use health_checks::HealthChecksDAL;
pub use resource_usage::ResourceUsageDAL;
pub use tenant_containers::TenantContainersDAL;
pub use tenant_leases::TenantLeasesDAL;

/// The main Data Access Layer struct.
#[derive(Clone)]
pub struct DAL {
    /// A connection pool for PostgreSQL database connections.
    pub pool: ConnectionPool,
}

impl DAL {
    pub fn new(pool: ConnectionPool) -> Self {
        DAL { pool }
    }

    pub fn tenant_containers(&self) -> TenantContainersDAL {
        TenantContainersDAL { dal: self }
    }

    pub fn tenant_leases(&self) -> TenantLeasesDAL {
        TenantLeasesDAL { dal: self }
    }

    pub fn health_checks(&self) -> HealthChecksDAL {
        HealthChecksDAL { dal: self }
    }

    pub fn resource_usage(&self) -> ResourceUsageDAL {
        ResourceUsageDAL { dal: self }
    }

    pub fn deployments(&self) -> DeploymentsDAL {
        DeploymentsDAL { dal: self }
    }
}

impl TenantStore for DAL {
    fn try_lease(&self, tenant_id: Uuid, ttl: Duration) -> StoreResult<Option<TenantLease>> {
        self.tenant_leases().try_acquire(tenant_id, ttl)
    }

    fn get_container(&self, tenant_id: Uuid) -> StoreResult<Option<TenantContainer>> {
        self.tenant_containers().get_by_tenant(tenant_id)
    }

    fn list_containers(&self) -> StoreResult<Vec<TenantContainer>> {
        self.tenant_containers().list()
    }

    fn list_containers_by_status(
        &self,
        status: ContainerStatus,
    ) -> StoreResult<Vec<TenantContainer>> {
        self.tenant_containers().list_by_status(status)
    }

    fn max_external_port(&self) -> StoreResult<Option<i32>> {
        self.tenant_containers().max_external_port()
    }

    fn create_with_next_port(
        &self,
        tenant_id: Uuid,
        base_port: i32,
        new_image_tag: Option<&str>,
        build: &mut ContainerBuilder<'_>,
    ) -> StoreResult<TenantContainer> {
        self.tenant_containers()
            .create_with_next_port(tenant_id, base_port, new_image_tag, build)
    }

    fn update_container_state(
        &self,
        id: Uuid,
        change: &ContainerStateChange,
    ) -> StoreResult<TenantContainer> {
        self.tenant_containers().update_state(id, change)
    }

    fn record_health_check(
        &self,
        record: &NewHealthCheckRecord,
        health: HealthStatus,
    ) -> StoreResult<HealthCheckRecord> {
        self.health_checks().record(record, health)
    }

    fn insert_resource_usage(
        &self,
        record: &NewResourceUsageRecord,
    ) -> StoreResult<ResourceUsageRecord> {
        self.resource_usage().create(record)
    }

    fn insert_deployment(&self, record: &NewDeploymentRecord) -> StoreResult<DeploymentRecord> {
        self.deployments().create(record)
    }

    fn complete_deployment(
        &self,
        id: Uuid,
        outcome: &DeploymentOutcome,
    ) -> StoreResult<DeploymentRecord> {
        self.deployments().complete(id, outcome)
    }

    fn last_deployed_image(&self, tenant_container_id: Uuid) -> StoreResult<Option<String>> {
        self.deployments().last_deployed_image(tenant_container_id)
    }

    fn list_health_checks(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<HealthCheckRecord>> {
        self.health_checks()
            .list_for_container(tenant_container_id, limit)
    }

    fn list_deployments(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<DeploymentRecord>> {
        self.deployments()
            .list_for_container(tenant_container_id, limit)
    }

    fn list_resource_usage(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ResourceUsageRecord>> {
        self.resource_usage()
            .list_for_container(tenant_container_id, limit)
    }
}
