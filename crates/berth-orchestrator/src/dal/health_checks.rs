//! Data Access Layer for HealthCheckRecord operations.
//!
//! Health records are append-only. Recording one also stamps the owning
//! container's `health_status` and `last_health_check_at` in the same
//! transaction so the two never disagree.

use berth_models::models::{HealthCheckRecord, HealthStatus, NewHealthCheckRecord};
use berth_models::schema::{health_check_records, tenant_containers};
use diesel::prelude::*;
use uuid::Uuid;

use crate::dal::DAL;
use crate::error::OrchestratorError;
use crate::store::StoreResult;

/// Data Access Layer for HealthCheckRecord operations.
pub struct HealthChecksDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl HealthChecksDAL<'_> {
    /// Appends a health record and updates the container's health fields.
    ///
    /// # Arguments
    ///
    /// * `record` - The probe outcome to append.
    /// * `health` - The container-level health implied by the outcome.
    pub fn record(
        &self,
        record: &NewHealthCheckRecord,
        health: HealthStatus,
    ) -> StoreResult<HealthCheckRecord> {
        let conn = &mut self.dal.pool.get()?;
        conn.transaction::<_, OrchestratorError, _>(|conn| {
            let inserted: HealthCheckRecord = diesel::insert_into(health_check_records::table)
                .values(record)
                .get_result(conn)?;

            diesel::update(tenant_containers::table.find(record.tenant_container_id))
                .set((
                    tenant_containers::health_status.eq(health),
                    tenant_containers::last_health_check_at.eq(Some(record.checked_at)),
                ))
                .execute(conn)?;

            Ok(inserted)
        })
    }

    /// Lists the newest health records of a container.
    pub fn list_for_container(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<HealthCheckRecord>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(health_check_records::table
            .filter(health_check_records::tenant_container_id.eq(tenant_container_id))
            .order(health_check_records::checked_at.desc())
            .limit(limit)
            .load(conn)?)
    }
}
