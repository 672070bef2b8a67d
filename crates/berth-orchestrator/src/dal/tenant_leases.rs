//! Data Access Layer for tenant leases.
//!
//! A lease row marks a tenant as busy for every process sharing the database.
//! Taking one is a single upsert that only overwrites an expired row, so two
//! processes can never both see themselves as the holder.

use std::time::Duration;

use berth_models::schema::tenant_leases;
use berth_utils::logging::prelude::*;
use diesel::prelude::*;
use diesel::sql_types::{Double, Uuid as SqlUuid};
use uuid::Uuid;

use crate::dal::DAL;
use crate::db::ConnectionPool;
use crate::store::{StoreResult, TenantLease};

const ACQUIRE_SQL: &str = "
    INSERT INTO tenant_leases (tenant_id, lease_id, expires_at)
    VALUES ($1, $2, NOW() + make_interval(secs => $3))
    ON CONFLICT (tenant_id) DO UPDATE
        SET lease_id = EXCLUDED.lease_id, expires_at = EXCLUDED.expires_at
        WHERE tenant_leases.expires_at < NOW()
    RETURNING lease_id";

#[derive(QueryableByName, Debug)]
struct Acquired {
    #[diesel(sql_type = SqlUuid)]
    lease_id: Uuid,
}

/// Lease row owned by this process; deleted on drop.
struct HeldLease {
    pool: ConnectionPool,
    tenant_id: Uuid,
    lease_id: Uuid,
}

impl Drop for HeldLease {
    fn drop(&mut self) {
        let released = self.pool.get().and_then(|mut conn| {
            diesel::delete(
                tenant_leases::table
                    .filter(tenant_leases::tenant_id.eq(self.tenant_id))
                    .filter(tenant_leases::lease_id.eq(self.lease_id)),
            )
            .execute(&mut conn)
            .map_err(Into::into)
        });
        if let Err(e) = released {
            // The row expires on its own; until then the tenant stays busy.
            error!(tenant_id = %self.tenant_id, error = %e, "Failed to release tenant lease");
        }
    }
}

/// Data Access Layer for tenant lease operations.
pub struct TenantLeasesDAL<'a> {
    /// Reference to the main DAL instance.
    pub dal: &'a DAL,
}

impl TenantLeasesDAL<'_> {
    /// Takes the lease for `tenant_id` unless another holder's lease is live.
    pub fn try_acquire(&self, tenant_id: Uuid, ttl: Duration) -> StoreResult<Option<TenantLease>> {
        let conn = &mut self.dal.pool.get()?;
        let lease_id = Uuid::new_v4();
        let acquired: Vec<Acquired> = diesel::sql_query(ACQUIRE_SQL)
            .bind::<SqlUuid, _>(tenant_id)
            .bind::<SqlUuid, _>(lease_id)
            .bind::<Double, _>(ttl.as_secs_f64())
            .load(conn)?;

        if !acquired.iter().any(|row| row.lease_id == lease_id) {
            debug!(tenant_id = %tenant_id, "Tenant lease is held by another process");
            return Ok(None);
        }
        Ok(Some(TenantLease::new(HeldLease {
            pool: self.dal.pool.clone(),
            tenant_id,
            lease_id,
        })))
    }

    /// Number of lease rows, live or expired.
    pub fn count(&self) -> StoreResult<i64> {
        let conn = &mut self.dal.pool.get()?;
        Ok(tenant_leases::table.count().get_result(conn)?)
    }
}
