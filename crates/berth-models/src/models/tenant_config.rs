//! # Tenant Configuration Module
//!
//! The payload accepted by `provision`, and its validation.
//!
//! Validation is a pure function: [`TenantConfig::validate`] either returns a
//! [`ValidTenantConfig`] whose fields are known to be in range, or the first
//! [`ConfigValidationError`] naming the offending field.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MIN_CPU_LIMIT: f64 = 0.0;
pub const MAX_CPU_LIMIT: f64 = 4.0;
pub const MIN_MEMORY_LIMIT_MB: i32 = 256;
pub const MAX_MEMORY_LIMIT_MB: i32 = 8192;
pub const MIN_DISK_LIMIT_MB: i32 = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 100;

/// Raw tenant configuration as submitted by a caller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    /// Identifier of the owning organization.
    #[schema(example = "2f0c6f5e-6a36-4c55-9d3a-0c0c2f9c3f11")]
    pub organization_id: String,
    /// Display name of the tenant.
    #[schema(example = "Acme Corp")]
    pub tenant_name: String,
    /// CPU limit in cores, (0, 4.0].
    #[serde(default = "default_cpu_limit")]
    #[schema(example = 0.5)]
    pub cpu_limit: f64,
    /// Memory limit in MB, [256, 8192].
    #[serde(default = "default_memory_limit_mb")]
    #[schema(example = 512)]
    pub memory_limit_mb: i32,
    /// Disk limit in MB, at least 1024.
    #[serde(default = "default_disk_limit_mb")]
    #[schema(example = 10240)]
    pub disk_limit_mb: i32,
}

fn default_cpu_limit() -> f64 {
    1.0
}

fn default_memory_limit_mb() -> i32 {
    1024
}

fn default_disk_limit_mb() -> i32 {
    10240
}

/// A tenant configuration whose fields have been range-checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTenantConfig {
    pub tenant_id: Uuid,
    pub tenant_name: String,
    pub cpu_limit: f64,
    pub memory_limit_mb: i32,
    pub disk_limit_mb: i32,
}

/// A field that failed validation and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ConfigValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl std::error::Error for ConfigValidationError {}

impl TenantConfig {
    /// A configuration with the default resource limits.
    pub fn new(organization_id: impl Into<String>, tenant_name: impl Into<String>) -> Self {
        TenantConfig {
            organization_id: organization_id.into(),
            tenant_name: tenant_name.into(),
            cpu_limit: default_cpu_limit(),
            memory_limit_mb: default_memory_limit_mb(),
            disk_limit_mb: default_disk_limit_mb(),
        }
    }

    /// Checks every field and returns the typed configuration.
    pub fn validate(&self) -> Result<ValidTenantConfig, ConfigValidationError> {
        let tenant_id = Uuid::parse_str(self.organization_id.trim()).map_err(|_| {
            ConfigValidationError::new("organizationId", "must be a well-formed UUID")
        })?;
        if tenant_id.is_nil() {
            return Err(ConfigValidationError::new(
                "organizationId",
                "must not be the nil UUID",
            ));
        }

        let tenant_name = self.tenant_name.trim();
        let name_len = tenant_name.chars().count();
        if name_len == 0 || name_len > MAX_TENANT_NAME_LEN {
            return Err(ConfigValidationError::new(
                "tenantName",
                format!("length must be between 1 and {}", MAX_TENANT_NAME_LEN),
            ));
        }

        if !(self.cpu_limit > MIN_CPU_LIMIT && self.cpu_limit <= MAX_CPU_LIMIT) {
            return Err(ConfigValidationError::new(
                "cpuLimit",
                format!(
                    "CPU limit must be greater than {} and at most {} cores, got {}",
                    MIN_CPU_LIMIT, MAX_CPU_LIMIT, self.cpu_limit
                ),
            ));
        }

        if !(MIN_MEMORY_LIMIT_MB..=MAX_MEMORY_LIMIT_MB).contains(&self.memory_limit_mb) {
            return Err(ConfigValidationError::new(
                "memoryLimitMb",
                format!(
                    "memory limit must be between {} and {} MB, got {}",
                    MIN_MEMORY_LIMIT_MB, MAX_MEMORY_LIMIT_MB, self.memory_limit_mb
                ),
            ));
        }

        if self.disk_limit_mb < MIN_DISK_LIMIT_MB {
            return Err(ConfigValidationError::new(
                "diskLimitMb",
                format!(
                    "disk limit must be at least {} MB, got {}",
                    MIN_DISK_LIMIT_MB, self.disk_limit_mb
                ),
            ));
        }

        Ok(ValidTenantConfig {
            tenant_id,
            tenant_name: tenant_name.to_string(),
            cpu_limit: self.cpu_limit,
            memory_limit_mb: self.memory_limit_mb,
            disk_limit_mb: self.disk_limit_mb,
        })
    }
}
