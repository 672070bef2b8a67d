//! Data Access Layer for ResourceUsageRecord operations.

use berth_models::models::{NewResourceUsageRecord, ResourceUsageRecord};
use berth_models::schema::resource_usage_records;
use diesel::prelude::*;
use uuid::Uuid;

use crate::dal::DAL;
use crate::store::StoreResult;

/// Data Access Layer for ResourceUsageRecord operations.
pub struct ResourceUsageDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl ResourceUsageDAL<'_> {
    pub fn create(&self, record: &NewResourceUsageRecord) -> StoreResult<ResourceUsageRecord> {
        let conn = &mut self.dal.pool.get()?;
        Ok(diesel::insert_into(resource_usage_records::table)
            .values(record)
            .get_result(conn)?)
    }

    /// Lists the newest samples of a container.
    pub fn list_for_container(
        &self,
        tenant_container_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<ResourceUsageRecord>> {
        let conn = &mut self.dal.pool.get()?;
        Ok(resource_usage_records::table
            .filter(resource_usage_records::tenant_container_id.eq(tenant_container_id))
            .order(resource_usage_records::period_end.desc())
            .limit(limit)
            .load(conn)?)
    }
}
