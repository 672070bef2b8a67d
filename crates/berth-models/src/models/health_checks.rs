//! # Health Check Records Module
//!
//! Append-only history of health probes, one row per probe.
//!
//! - `id`: UUID, primary key
//! - `tenant_container_id`: UUID, foreign key referencing `tenant_containers`
//! - `checked_at`: when the probe ran
//! - `status`: healthy, unhealthy or timeout
//! - `response_time_ms`: round trip of the probe, when a response arrived
//! - `http_status_code`: status returned by the tenant, when a response arrived
//! - `error_message`: why the probe failed, when it did
//!
//! Rows are never updated or deleted; the history is authoritative.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::tenant_containers::HealthStatus;

/// Outcome of a single probe.
#[derive(DbEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[ExistingTypePath = "crate::schema::sql_types::HealthCheckStatus"]
#[serde(rename_all = "snake_case")]
pub enum HealthCheckStatus {
    Healthy,
    Unhealthy,
    Timeout,
}

impl HealthCheckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Timeout => "timeout",
        }
    }

    /// The container-level health implied by this probe outcome.
    pub fn container_health(&self) -> HealthStatus {
        match self {
            Self::Healthy => HealthStatus::Healthy,
            Self::Unhealthy | Self::Timeout => HealthStatus::Unhealthy,
        }
    }
}

/// Represents a health check record in the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::health_check_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct HealthCheckRecord {
    pub id: Uuid,
    pub tenant_container_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub status: HealthCheckStatus,
    pub response_time_ms: Option<i64>,
    pub http_status_code: Option<i32>,
    pub error_message: Option<String>,
}

/// Represents a new health check record to be inserted into the database.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[diesel(table_name = crate::schema::health_check_records)]
pub struct NewHealthCheckRecord {
    pub tenant_container_id: Uuid,
    pub checked_at: DateTime<Utc>,
    pub status: HealthCheckStatus,
    pub response_time_ms: Option<i64>,
    pub http_status_code: Option<i32>,
    pub error_message: Option<String>,
}

impl NewHealthCheckRecord {
    /// Creates a new `NewHealthCheckRecord` instance.
    ///
    /// # Returns
    ///
    /// Returns an `Err` if the container id is nil or a healthy record carries an error.
    pub fn new(
        tenant_container_id: Uuid,
        checked_at: DateTime<Utc>,
        status: HealthCheckStatus,
        response_time_ms: Option<i64>,
        http_status_code: Option<i32>,
        error_message: Option<String>,
    ) -> Result<Self, String> {
        if tenant_container_id.is_nil() {
            return Err("Invalid tenant container ID".to_string());
        }
        if status == HealthCheckStatus::Healthy && error_message.is_some() {
            return Err("A healthy check cannot carry an error message".to_string());
        }

        Ok(NewHealthCheckRecord {
            tenant_container_id,
            checked_at,
            status,
            response_time_ms,
            http_status_code,
            error_message,
        })
    }
}
