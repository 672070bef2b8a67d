//! Data models for the four entities the orchestrator owns
pub mod deployments;
pub mod health_checks;
pub mod resource_usage;
pub mod tenant_config;
pub mod tenant_containers;

pub use deployments::{
    DeploymentOutcome, DeploymentRecord, DeploymentStatus, DeploymentType, NewDeploymentRecord,
};
pub use health_checks::{HealthCheckRecord, HealthCheckStatus, NewHealthCheckRecord};
pub use resource_usage::{NewResourceUsageRecord, ResourceUsageRecord};
pub use tenant_config::{ConfigValidationError, TenantConfig, ValidTenantConfig};
pub use tenant_containers::{
    container_name_for, ContainerStateChange, ContainerStatus, HealthStatus, NewTenantContainer,
    TenantContainer,
};
