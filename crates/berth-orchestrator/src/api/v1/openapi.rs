use berth_models::models::{
    ContainerStatus, DeploymentRecord, DeploymentStatus, DeploymentType, HealthCheckRecord,
    HealthCheckStatus, HealthStatus, ResourceUsageRecord, TenantConfig, TenantContainer,
};
use utoipa::OpenApi;

use crate::api::v1::tenants;
use crate::health::HealthReport;
use crate::metrics_collector::ResourceMetrics;
use crate::provisioner::ProvisionResult;
use crate::runtime::ContainerStats;
use crate::service::{OperationError, TenantStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        tenants::provision_tenant,
        tenants::list_tenants,
        tenants::get_tenant_status,
        tenants::start_tenant,
        tenants::stop_tenant,
        tenants::restart_tenant,
        tenants::check_tenant_health,
        tenants::get_tenant_metrics,
        tenants::list_health_checks,
        tenants::list_deployments,
        tenants::list_resource_usage,
    ),
    components(schemas(
        TenantConfig,
        TenantContainer,
        ContainerStatus,
        HealthStatus,
        HealthCheckRecord,
        HealthCheckStatus,
        DeploymentRecord,
        DeploymentType,
        DeploymentStatus,
        ResourceUsageRecord,
        ProvisionResult,
        HealthReport,
        ResourceMetrics,
        ContainerStats,
        TenantStatus,
        OperationError,
    )),
    tags(
        (name = "tenants", description = "Tenant container lifecycle")
    ),
    info(title = "berth orchestrator API")
)]
pub struct ApiDoc;
