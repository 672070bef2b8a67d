//! Data Access Layer for TenantContainer operations.
//!
//! Port allocation happens here: the duplicate check, `max(external_port)`
//! lookup and row insertion run in one SERIALIZABLE transaction, and the
//! unique constraints on `tenant_id` and `external_port` back it up.

use berth_models::models::{
    ContainerStateChange, ContainerStatus, DeploymentType, NewDeploymentRecord, TenantContainer,
};
use berth_models::schema::{deployment_records, tenant_containers};
use berth_utils::logging::prelude::*;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::OrchestratorError;
use crate::store::{next_port, ContainerBuilder, StoreResult};

/// Serialization failures are retried this many times before giving up.
const MAX_ALLOCATION_ATTEMPTS: usize = 5;

/// Error raised inside the allocation transaction.
enum AllocationError {
    Database(DieselError),
    Orchestrator(OrchestratorError),
}

impl From<DieselError> for AllocationError {
    fn from(e: DieselError) -> Self {
        AllocationError::Database(e)
    }
}

impl From<OrchestratorError> for AllocationError {
    fn from(e: OrchestratorError) -> Self {
        AllocationError::Orchestrator(e)
    }
}

/// Data Access Layer for TenantContainer operations.
pub struct TenantContainersDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl TenantContainersDAL<'_> {
    /// Retrieves the container for a tenant.
    pub fn get_by_tenant(&self, tenant_id: Uuid) -> StoreResult<Option<TenantContainer>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(tenant_containers::table
            .filter(tenant_containers::tenant_id.eq(tenant_id))
            .first(conn)
            .optional()?)
    }

    /// Lists all containers ordered by external port.
    pub fn list(&self) -> StoreResult<Vec<TenantContainer>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(tenant_containers::table
            .order(tenant_containers::external_port.asc())
            .load(conn)?)
    }

    pub fn list_by_status(&self, status: ContainerStatus) -> StoreResult<Vec<TenantContainer>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(tenant_containers::table
            .filter(tenant_containers::status.eq(status))
            .order(tenant_containers::external_port.asc())
            .load(conn)?)
    }

    pub fn max_external_port(&self) -> StoreResult<Option<i32>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(tenant_containers::table
            .select(max(tenant_containers::external_port))
            .get_result(conn)?)
    }

    /// Allocates the next port and inserts the container with its pending
    /// `provision` deployment record.
    ///
    /// # Returns
    ///
    /// The inserted container, `DuplicateTenant` if the tenant already has one,
    /// or `ExhaustedRange` when no port above the current maximum is left.
    pub fn create_with_next_port(
        &self,
        tenant_id: Uuid,
        base_port: i32,
        new_image_tag: Option<&str>,
        build: &mut ContainerBuilder<'_>,
    ) -> StoreResult<TenantContainer> {
        let conn = &mut self.dal.pool.get()?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = conn
                .build_transaction()
                .serializable()
                .run::<TenantContainer, AllocationError, _>(|conn| {
                    let existing: i64 = tenant_containers::table
                        .filter(tenant_containers::tenant_id.eq(tenant_id))
                        .count()
                        .get_result(conn)?;
                    if existing > 0 {
                        return Err(OrchestratorError::DuplicateTenant(tenant_id).into());
                    }

                    let current_max: Option<i32> = tenant_containers::table
                        .select(max(tenant_containers::external_port))
                        .get_result(conn)?;
                    let port = next_port(current_max, base_port)?;
                    let new_container = build(port)?;

                    let container: TenantContainer =
                        diesel::insert_into(tenant_containers::table)
                            .values(&new_container)
                            .get_result(conn)?;

                    let provision = NewDeploymentRecord::pending(
                        container.id,
                        DeploymentType::Provision,
                        None,
                        new_image_tag.map(String::from),
                    );
                    diesel::insert_into(deployment_records::table)
                        .values(&provision)
                        .execute(conn)?;

                    Ok(container)
                });

            match result {
                Ok(container) => return Ok(container),
                Err(AllocationError::Orchestrator(e)) => return Err(e),
                Err(AllocationError::Database(DieselError::DatabaseError(
                    DatabaseErrorKind::SerializationFailure,
                    _,
                ))) if attempt < MAX_ALLOCATION_ATTEMPTS => {
                    debug!(tenant_id = %tenant_id, attempt, "port allocation conflicted, retrying");
                }
                Err(AllocationError::Database(DieselError::DatabaseError(
                    DatabaseErrorKind::UniqueViolation,
                    info,
                ))) => {
                    if info.constraint_name() == Some("unique_tenant_container_tenant") {
                        return Err(OrchestratorError::DuplicateTenant(tenant_id));
                    }
                    if attempt < MAX_ALLOCATION_ATTEMPTS {
                        debug!(tenant_id = %tenant_id, attempt, "port taken concurrently, retrying");
                        continue;
                    }
                    return Err(OrchestratorError::Persistence(info.message().to_string()));
                }
                Err(AllocationError::Database(e)) => return Err(e.into()),
            }
        }
    }

    /// Applies a lifecycle change to the container with primary key `id`.
    pub fn update_state(
        &self,
        id: Uuid,
        change: &ContainerStateChange,
    ) -> StoreResult<TenantContainer> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::update(tenant_containers::table.find(id))
            .set(change)
            .get_result(conn)?)
    }
}
