//! # Resource Usage Records Module
//!
//! Append-only samples of a tenant container's CPU, memory and network usage,
//! one row per sampling window.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Represents a resource usage record in the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::resource_usage_records)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ResourceUsageRecord {
    pub id: Uuid,
    pub tenant_container_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_usage_mb: f64,
    pub memory_limit_mb: f64,
    pub network_rx_bytes: i64,
    pub network_tx_bytes: i64,
}

/// Represents a new resource usage record to be inserted into the database.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[diesel(table_name = crate::schema::resource_usage_records)]
pub struct NewResourceUsageRecord {
    pub tenant_container_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_usage_mb: f64,
    pub memory_limit_mb: f64,
    pub network_rx_bytes: i64,
    pub network_tx_bytes: i64,
}

impl NewResourceUsageRecord {
    /// Creates a new `NewResourceUsageRecord` instance.
    ///
    /// # Returns
    ///
    /// Returns an `Err` if the window is inverted or any measurement is negative.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_container_id: Uuid,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        cpu_percent: f64,
        memory_usage_mb: f64,
        memory_limit_mb: f64,
        network_rx_bytes: i64,
        network_tx_bytes: i64,
    ) -> Result<Self, String> {
        if tenant_container_id.is_nil() {
            return Err("Invalid tenant container ID".to_string());
        }
        if period_end < period_start {
            return Err("Sampling window ends before it starts".to_string());
        }
        if cpu_percent < 0.0 || memory_usage_mb < 0.0 || memory_limit_mb < 0.0 {
            return Err("Resource measurements cannot be negative".to_string());
        }
        if network_rx_bytes < 0 || network_tx_bytes < 0 {
            return Err("Network counters cannot be negative".to_string());
        }

        Ok(NewResourceUsageRecord {
            tenant_container_id,
            period_start,
            period_end,
            cpu_percent,
            memory_usage_mb,
            memory_limit_mb,
            network_rx_bytes,
            network_tx_bytes,
        })
    }
}
