//! # API Routes Aggregator Module
//!
//! Builds the HTTP router: the versioned tenant API plus the process-level
//! probe, metrics and OpenAPI endpoints.

pub mod v1;

use std::sync::Arc;

use axum::{response::IntoResponse, routing::get, Json, Router};
use hyper::header::CONTENT_TYPE;
use hyper::StatusCode;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::metrics;
use crate::service::TenantService;

/// Shared state handed to every handler.
pub type AppState = Arc<TenantService>;

/// Configures and returns the application router with all API routes.
pub fn configure_api_routes() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", v1::routes())
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .route("/api-docs/openapi.json", get(openapi))
        .layer(TraceLayer::new_for_http())
}

/// Liveness probe for the orchestrator process itself.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn readyz() -> impl IntoResponse {
    (StatusCode::OK, "Ready")
}

/// Prometheus text exposition of the orchestrator's metrics.
async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::encode_metrics(),
    )
}

async fn openapi() -> impl IntoResponse {
    Json(v1::openapi::ApiDoc::openapi())
}
