//! Tenant lifecycle endpoints.
//!
//! Every handler answers with the `{success, data?, error?}` envelope. The
//! HTTP status mirrors the error kind so plain HTTP clients can branch on it.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use berth_models::models::{
    DeploymentRecord, HealthCheckRecord, ResourceUsageRecord, TenantConfig, TenantContainer,
};
use berth_utils::logging::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::IntoParams;
use uuid::Uuid;

use super::extract::{ApiJson, ApiPath, ApiQuery};
use crate::api::AppState;
use crate::health::HealthReport;
use crate::metrics_collector::ResourceMetrics;
use crate::provisioner::ProvisionResult;
use crate::service::{OperationResult, TenantStatus, DEFAULT_HISTORY_LIMIT};

type Envelope<T> = (StatusCode, Json<OperationResult<T>>);

pub fn routes() -> Router<AppState> {
    info!("Setting up tenant routes");
    Router::new()
        .route("/tenants", get(list_tenants).post(provision_tenant))
        .route("/tenants/:tenant_id", get(get_tenant_status))
        .route("/tenants/:tenant_id/start", post(start_tenant))
        .route("/tenants/:tenant_id/stop", post(stop_tenant))
        .route("/tenants/:tenant_id/restart", post(restart_tenant))
        .route("/tenants/:tenant_id/health-check", post(check_tenant_health))
        .route("/tenants/:tenant_id/metrics", post(get_tenant_metrics))
        .route("/tenants/:tenant_id/health-checks", get(list_health_checks))
        .route("/tenants/:tenant_id/deployments", get(list_deployments))
        .route("/tenants/:tenant_id/resource-usage", get(list_resource_usage))
}

/// Maximum number of rows a history endpoint returns.
#[derive(Debug, Deserialize, Serialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct HistoryQuery {
    /// Defaults to 50, capped at 1000.
    pub limit: Option<i64>,
}

impl HistoryQuery {
    fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, 1000)
    }
}

fn respond<T>(result: OperationResult<T>, success: StatusCode) -> Envelope<T> {
    let status = match &result.error {
        None => success,
        Some(e) => StatusCode::from_u16(e.http_status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    };
    (status, Json(result))
}

/// Provisions a container for a new tenant.
#[utoipa::path(
    post,
    path = "/api/v1/tenants",
    tag = "tenants",
    request_body = TenantConfig,
    responses(
        (status = 201, description = "Tenant provisioned; `data` holds the result", body = ProvisionResult),
        (status = 400, description = "Invalid tenant configuration"),
        (status = 409, description = "Tenant already has a container"),
        (status = 507, description = "External port range exhausted"),
    )
)]
pub async fn provision_tenant(
    State(service): State<AppState>,
    ApiJson(config): ApiJson<TenantConfig>,
) -> Envelope<ProvisionResult> {
    info!("Handling request to provision tenant {}", config.organization_id);
    respond(service.provision(&config).await, StatusCode::CREATED)
}

/// Lists every tenant container.
#[utoipa::path(
    get,
    path = "/api/v1/tenants",
    tag = "tenants",
    responses(
        (status = 200, description = "All tenant containers", body = [TenantContainer]),
    )
)]
pub async fn list_tenants(State(service): State<AppState>) -> Envelope<Vec<TenantContainer>> {
    respond(service.list_tenants(), StatusCode::OK)
}

/// Returns a tenant's container with its latest health check and deployment.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id")),
    responses(
        (status = 200, description = "Tenant status", body = TenantStatus),
        (status = 404, description = "Tenant not found"),
    )
)]
pub async fn get_tenant_status(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
) -> Envelope<TenantStatus> {
    respond(service.get_status(tenant_id).await, StatusCode::OK)
}

/// Starts a provisioned, stopped or failed tenant container.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/start",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id")),
    responses(
        (status = 200, description = "Container started", body = TenantContainer),
        (status = 404, description = "Tenant not found"),
        (status = 409, description = "Container already running"),
        (status = 502, description = "Container runtime failed"),
    )
)]
pub async fn start_tenant(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
) -> Envelope<TenantContainer> {
    info!("Handling request to start tenant {}", tenant_id);
    respond(service.start(tenant_id).await, StatusCode::OK)
}

/// Stops a running tenant container.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/stop",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id")),
    responses(
        (status = 200, description = "Container stopped", body = TenantContainer),
        (status = 404, description = "Tenant not found"),
        (status = 409, description = "Container not running"),
        (status = 502, description = "Container runtime failed"),
    )
)]
pub async fn stop_tenant(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
) -> Envelope<TenantContainer> {
    info!("Handling request to stop tenant {}", tenant_id);
    respond(service.stop(tenant_id).await, StatusCode::OK)
}

/// Stops and starts a running tenant container.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/restart",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id")),
    responses(
        (status = 200, description = "Container restarted", body = TenantContainer),
        (status = 404, description = "Tenant not found"),
        (status = 409, description = "Container not running"),
        (status = 502, description = "Container runtime failed"),
    )
)]
pub async fn restart_tenant(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
) -> Envelope<TenantContainer> {
    info!("Handling request to restart tenant {}", tenant_id);
    respond(service.restart(tenant_id).await, StatusCode::OK)
}

/// Probes the tenant's health endpoint and records the outcome.
///
/// An unhealthy tenant is still a successful check.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/health-check",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id")),
    responses(
        (status = 200, description = "Health check recorded", body = HealthReport),
        (status = 404, description = "Tenant not found"),
    )
)]
pub async fn check_tenant_health(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
) -> Envelope<HealthReport> {
    respond(service.check_health(tenant_id).await, StatusCode::OK)
}

/// Samples the tenant container's resource usage and records it.
#[utoipa::path(
    post,
    path = "/api/v1/tenants/{tenant_id}/metrics",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id")),
    responses(
        (status = 200, description = "Resource sample recorded", body = ResourceMetrics),
        (status = 404, description = "Tenant not found"),
        (status = 422, description = "Container not running"),
        (status = 502, description = "Runtime statistics unavailable"),
    )
)]
pub async fn get_tenant_metrics(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
) -> Envelope<ResourceMetrics> {
    respond(service.get_resource_metrics(tenant_id).await, StatusCode::OK)
}

/// Health check history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/health-checks",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id"), HistoryQuery),
    responses(
        (status = 200, description = "Health check history", body = [HealthCheckRecord]),
        (status = 404, description = "Tenant not found"),
    )
)]
pub async fn list_health_checks(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Envelope<Vec<HealthCheckRecord>> {
    respond(service.health_history(tenant_id, query.limit()), StatusCode::OK)
}

/// Deployment history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/deployments",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id"), HistoryQuery),
    responses(
        (status = 200, description = "Deployment history", body = [DeploymentRecord]),
        (status = 404, description = "Tenant not found"),
    )
)]
pub async fn list_deployments(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Envelope<Vec<DeploymentRecord>> {
    respond(service.deployment_history(tenant_id, query.limit()), StatusCode::OK)
}

/// Resource usage history, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tenants/{tenant_id}/resource-usage",
    tag = "tenants",
    params(("tenant_id" = Uuid, Path, description = "Tenant (organization) id"), HistoryQuery),
    responses(
        (status = 200, description = "Resource usage history", body = [ResourceUsageRecord]),
        (status = 404, description = "Tenant not found"),
    )
)]
pub async fn list_resource_usage(
    State(service): State<AppState>,
    ApiPath(tenant_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> Envelope<Vec<ResourceUsageRecord>> {
    respond(
        service.resource_usage_history(tenant_id, query.limit()),
        StatusCode::OK,
    )
}
