//! Data Access Layer for DeploymentRecord operations.
//!
//! Records are inserted as `pending` when a lifecycle operation begins and
//! completed exactly once when it ends.

use berth_models::models::{
    DeploymentOutcome, DeploymentRecord, DeploymentStatus, NewDeploymentRecord,
};
use berth_models::schema::deployment_records;
use diesel::prelude::*;
use uuid::Uuid;

use crate::dal::DAL;
use crate::store::StoreResult;

/// Data Access Layer for DeploymentRecord operations.
pub struct DeploymentsDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl DeploymentsDAL<'_> {
    pub fn create(&self, record: &NewDeploymentRecord) -> StoreResult<DeploymentRecord> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::insert_into(deployment_records::table)
            .values(record)
            .get_result(conn)?)
    }

    /// Writes the final status of a record.
    pub fn complete(&self, id: Uuid, outcome: &DeploymentOutcome) -> StoreResult<DeploymentRecord> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::update(deployment_records::table.find(id))
            .set(outcome)
            .get_result(conn)?)
    }

    /// Image tag of the most recent completed deployment of a container.
    pub fn last_deployed_image(&self, tenant_container_id: Uuid) -> StoreResult<Option<String>> {
        let conn = &mut self.dal.pool.get()?;
        let tag: Option<Option<String>> = deployment_records::table
            .filter(deployment_records::tenant_container_id.eq(tenant_container_id))
            .filter(deployment_records::status.eq(DeploymentStatus::Completed))
            .order(deployment_records::started_at.desc())
            .select(deployment_records::new_image_tag)
            .first(conn)
            .optional()?;
        Ok(tag.flatten())
    }

    /// Lists the newest records of a container.
    pub fn list_for_container(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<DeploymentRecord>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(deployment_records::table
            .filter(deployment_records::tenant_container_id.eq(tenant_container_id))
            .order(deployment_records::started_at.desc())
            .limit(limit)
            .load(conn)?)
    }
}
