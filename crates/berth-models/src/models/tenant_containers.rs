//! # Tenant Containers Module
//!
//! One row per tenant: the container that runs the tenant's application.
//!
//! ## Data Model
//!
//! - `id`: UUID, primary key
//! - `tenant_id`: UUID of the owning organization, unique
//! - `container_name`: name derived from the tenant id, unique
//! - `container_id`: runtime-assigned identifier, null until first started
//! - `external_port`: host port, globally unique, assigned once
//! - `internal_port`: port the application listens on inside the container
//! - `tenant_url`: URL derived from the external port
//! - `cpu_limit`, `memory_limit_mb`, `disk_limit_mb`: resource limits
//! - `descriptor_path`: location of the rendered deployment descriptor
//! - `status`: lifecycle state (pending, provisioning, running, stopped, failed)
//! - `health_status`: last known health (unknown, healthy, unhealthy, starting)
//!
//! ## Lifecycle
//!
//! ```text
//! pending -> provisioning -> running <-> stopped
//!                 \             |          /
//!                  +-------> failed <-----+
//! ```
//!
//! `failed` is reachable from any state on an unrecoverable runtime error and a
//! failed container can be started again.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_derive_enum::DbEnum;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of a tenant container.
#[derive(DbEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[ExistingTypePath = "crate::schema::sql_types::ContainerStatus"]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Pending,
    Provisioning,
    Running,
    Stopped,
    Failed,
}

impl ContainerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Provisioning => "provisioning",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }

    /// Whether a `start` transition is legal from this state.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Provisioning | Self::Stopped | Self::Failed)
    }

    /// Whether a `stop` transition is legal from this state.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for ContainerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last known health of a tenant container.
#[derive(DbEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[ExistingTypePath = "crate::schema::sql_types::HealthStatus"]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unknown,
    Healthy,
    Unhealthy,
    Starting,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::Starting => "starting",
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Represents a tenant container in the database.
#[derive(
    Queryable, Selectable, Identifiable, Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema,
)]
#[diesel(table_name = crate::schema::tenant_containers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TenantContainer {
    /// Unique identifier for the row.
    pub id: Uuid,
    /// Timestamp when the row was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp when the row was last updated.
    pub updated_at: DateTime<Utc>,
    /// Owning organization.
    pub tenant_id: Uuid,
    /// Display name of the tenant.
    pub tenant_name: String,
    /// Name of the container, derived from the tenant id.
    pub container_name: String,
    /// Runtime-assigned container identifier.
    pub container_id: Option<String>,
    /// Host port mapped to the tenant application.
    pub external_port: i32,
    /// Port the application listens on inside the container.
    pub internal_port: i32,
    /// Public URL of the tenant application.
    pub tenant_url: String,
    /// CPU limit in cores.
    pub cpu_limit: f64,
    /// Memory limit in MB.
    pub memory_limit_mb: i32,
    /// Disk limit in MB.
    pub disk_limit_mb: i32,
    /// Path of the rendered deployment descriptor.
    pub descriptor_path: String,
    /// Lifecycle state.
    pub status: ContainerStatus,
    /// When the container was last started.
    pub last_started_at: Option<DateTime<Utc>>,
    /// When the container was last stopped.
    pub last_stopped_at: Option<DateTime<Utc>>,
    /// Last known health.
    pub health_status: HealthStatus,
    /// When health was last probed.
    pub last_health_check_at: Option<DateTime<Utc>>,
}

/// Represents a new tenant container to be inserted into the database.
#[derive(Insertable, Debug, Clone, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::tenant_containers)]
pub struct NewTenantContainer {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub container_name: String,
    pub external_port: i32,
    pub internal_port: i32,
    pub tenant_url: String,
    pub cpu_limit: f64,
    pub memory_limit_mb: i32,
    pub disk_limit_mb: i32,
    pub descriptor_path: String,
    pub status: ContainerStatus,
    pub health_status: HealthStatus,
}

impl NewTenantContainer {
    /// Creates a new `NewTenantContainer` instance.
    ///
    /// Rows are born in `provisioning` with `unknown` health.
    ///
    /// # Returns
    ///
    /// Returns `Ok(NewTenantContainer)` if all parameters are valid,
    /// otherwise returns an `Err` with a description of the validation failure.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tenant_id: Uuid,
        tenant_name: String,
        container_name: String,
        external_port: i32,
        internal_port: i32,
        tenant_url: String,
        cpu_limit: f64,
        memory_limit_mb: i32,
        disk_limit_mb: i32,
        descriptor_path: String,
    ) -> Result<Self, String> {
        if tenant_id.is_nil() {
            return Err("Invalid tenant ID".to_string());
        }
        if container_name.trim().is_empty() {
            return Err("Container name cannot be empty".to_string());
        }
        if !(1..=65535).contains(&external_port) {
            return Err(format!("External port {} is out of range", external_port));
        }
        if !(1..=65535).contains(&internal_port) {
            return Err(format!("Internal port {} is out of range", internal_port));
        }

        Ok(NewTenantContainer {
            tenant_id,
            tenant_name,
            container_name,
            external_port,
            internal_port,
            tenant_url,
            cpu_limit,
            memory_limit_mb,
            disk_limit_mb,
            descriptor_path,
            status: ContainerStatus::Provisioning,
            health_status: HealthStatus::Unknown,
        })
    }
}

/// Partial update applied to a tenant container by the lifecycle orchestrator.
///
/// `None` fields are left untouched. `container_id: Some(None)` clears the column.
#[derive(AsChangeset, Debug, Clone, Default, PartialEq)]
#[diesel(table_name = crate::schema::tenant_containers)]
pub struct ContainerStateChange {
    pub status: Option<ContainerStatus>,
    pub container_id: Option<Option<String>>,
    pub last_started_at: Option<DateTime<Utc>>,
    pub last_stopped_at: Option<DateTime<Utc>>,
    pub health_status: Option<HealthStatus>,
}

impl ContainerStateChange {
    /// Change that only moves the lifecycle state.
    pub fn status(status: ContainerStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Applies the change to an in-memory copy of the row.
    pub fn apply_to(&self, container: &mut TenantContainer) {
        if let Some(status) = self.status {
            container.status = status;
        }
        if let Some(container_id) = &self.container_id {
            container.container_id = container_id.clone();
        }
        if let Some(at) = self.last_started_at {
            container.last_started_at = Some(at);
        }
        if let Some(at) = self.last_stopped_at {
            container.last_stopped_at = Some(at);
        }
        if let Some(health) = self.health_status {
            container.health_status = health;
        }
    }
}

/// Derives the container name for a tenant.
pub fn container_name_for(tenant_id: Uuid) -> String {
    format!("tenant-{}", tenant_id.simple())
}
