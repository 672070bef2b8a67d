use std::time::Duration;

use axum::{http::StatusCode, routing::get, Router};
use berth_models::models::{HealthCheckStatus, HealthStatus};
use berth_orchestrator::health::NOT_RUNNING;
use berth_orchestrator::runtime::RuntimeStatus;
use berth_orchestrator::store::TenantStore;

use crate::fixtures::TestFixture;

/// Serves a stand-in tenant application on an ephemeral port and returns the port.
async fn spawn_tenant_app(app: Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    port
}

/// Fixture whose first tenant is allocated the port of `app`.
async fn fixture_for(app: Router) -> TestFixture {
    let port = spawn_tenant_app(app).await;
    TestFixture::with_config(|config| {
        config.base_port = port;
        config.public_host = "127.0.0.1".to_string();
        config.health_timeout = Duration::from_millis(300);
    })
}

#[tokio::test]
async fn test_healthy_tenant() {
    let fixture = fixture_for(Router::new().route("/api/health", get(|| async { "ok" }))).await;
    let tenant = fixture.running_tenant().await;
    let before = fixture.health_record_count(tenant.tenant_id);

    let result = fixture.service.check_health(tenant.tenant_id).await;
    assert!(result.success);
    assert_eq!(fixture.health_record_count(tenant.tenant_id), before + 1);
    let report = result.data.unwrap();
    assert!(report.healthy);
    assert_eq!(report.status, HealthCheckStatus::Healthy);
    assert_eq!(report.http_status_code, Some(200));
    assert!(report.response_time_ms.is_some());
    assert!(report.error.is_none());

    let container = fixture.store.get_container(tenant.tenant_id).unwrap().unwrap();
    assert_eq!(container.health_status, HealthStatus::Healthy);
    assert!(container.last_health_check_at.is_some());
}

#[tokio::test]
async fn test_error_status_is_unhealthy() {
    let fixture = fixture_for(Router::new().route(
        "/api/health",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    ))
    .await;
    let tenant = fixture.running_tenant().await;
    let before = fixture.health_record_count(tenant.tenant_id);

    let report = fixture
        .service
        .check_health(tenant.tenant_id)
        .await
        .data
        .unwrap();
    assert!(!report.healthy);
    assert_eq!(report.status, HealthCheckStatus::Unhealthy);
    assert_eq!(report.http_status_code, Some(500));
    assert_eq!(fixture.health_record_count(tenant.tenant_id), before + 1);
    assert!(report.error.unwrap().contains("500"));

    let container = fixture.store.get_container(tenant.tenant_id).unwrap().unwrap();
    assert_eq!(container.health_status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let fixture = fixture_for(Router::new().route(
        "/api/health",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            "late"
        }),
    ))
    .await;
    let tenant = fixture.running_tenant().await;
    let before = fixture.health_record_count(tenant.tenant_id);

    let report = fixture
        .service
        .check_health(tenant.tenant_id)
        .await
        .data
        .unwrap();
    assert!(!report.healthy);
    assert_eq!(report.status, HealthCheckStatus::Timeout);
    assert_eq!(fixture.health_record_count(tenant.tenant_id), before + 1);
    assert!(report.http_status_code.is_none());
    assert!(report.error.is_some());

    let container = fixture.store.get_container(tenant.tenant_id).unwrap().unwrap();
    assert_eq!(container.health_status, HealthStatus::Unhealthy);
}

#[tokio::test]
async fn test_not_running_tenant_is_recorded_unhealthy() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;

    let report = fixture
        .service
        .check_health(tenant.tenant_id)
        .await
        .data
        .unwrap();
    assert!(!report.healthy);
    assert_eq!(report.error.as_deref(), Some(NOT_RUNNING));

    let history = fixture
        .service
        .health_history(tenant.tenant_id, 10)
        .data
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, HealthCheckStatus::Unhealthy);
}

#[tokio::test]
async fn test_runtime_status_wins_over_persisted_status() {
    let fixture = fixture_for(Router::new().route("/api/health", get(|| async { "ok" }))).await;
    let tenant = fixture.running_tenant().await;
    *fixture.runtime.status_override.lock().unwrap() = Some(RuntimeStatus::Stopped);

    let report = fixture
        .service
        .check_health(tenant.tenant_id)
        .await
        .data
        .unwrap();
    assert!(!report.healthy);
    assert_eq!(report.error.as_deref(), Some(NOT_RUNNING));
}

#[tokio::test]
async fn test_every_check_is_appended_to_history() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;

    for _ in 0..3 {
        fixture.service.check_health(tenant.tenant_id).await;
    }
    assert_eq!(fixture.health_record_count(tenant.tenant_id), 3);

    let history = fixture
        .service
        .health_history(tenant.tenant_id, 2)
        .data
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].checked_at >= history[1].checked_at);
}

#[tokio::test]
async fn test_stopped_tenant_keeps_health_until_checked() {
    let fixture = fixture_for(Router::new().route("/api/health", get(|| async { "ok" }))).await;
    let tenant = fixture.running_tenant().await;
    assert!(fixture.service.check_health(tenant.tenant_id).await.data.unwrap().healthy);

    let stopped = fixture.service.stop(tenant.tenant_id).await.data.unwrap();
    assert_eq!(stopped.health_status, HealthStatus::Healthy);
    assert!(stopped.container_id.is_some());

    let before = fixture.health_record_count(tenant.tenant_id);
    let queries = *fixture.runtime.status_queries.lock().unwrap();
    let result = fixture.service.check_health(tenant.tenant_id).await;
    assert!(result.success);
    let report = result.data.unwrap();
    assert!(!report.healthy);
    assert_eq!(report.error.as_deref(), Some(NOT_RUNNING));

    // The kept container id is asked about, not skipped.
    assert_eq!(*fixture.runtime.status_queries.lock().unwrap(), queries + 1);
    assert_eq!(fixture.health_record_count(tenant.tenant_id), before + 1);
    let latest = &fixture
        .service
        .health_history(tenant.tenant_id, 1)
        .data
        .unwrap()[0];
    assert_eq!(latest.status, HealthCheckStatus::Unhealthy);
    assert_eq!(latest.error_message.as_deref(), Some(NOT_RUNNING));

    let container = fixture.store.get_container(tenant.tenant_id).unwrap().unwrap();
    assert_eq!(container.health_status, HealthStatus::Unhealthy);
}
