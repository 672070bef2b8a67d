use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use berth_orchestrator::store::TenantStore;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use crate::fixtures::TestFixture;

async fn send(fixture: &TestFixture, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };

    let response = fixture
        .router()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_provision_endpoint() {
    let fixture = TestFixture::new();
    let tenant_id = Uuid::new_v4();

    let (status, json) = send(
        &fixture,
        "POST",
        "/api/v1/tenants",
        Some(json!({
            "organizationId": tenant_id.to_string(),
            "tenantName": "Acme Corp",
            "cpuLimit": 0.5,
            "memoryLimitMb": 512
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["externalPort"], 3001);
    assert_eq!(json["data"]["tenantUrl"], "http://localhost:3001");
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn test_provision_endpoint_rejects_invalid_config() {
    let fixture = TestFixture::new();

    let (status, json) = send(
        &fixture,
        "POST",
        "/api/v1/tenants",
        Some(json!({
            "organizationId": Uuid::new_v4().to_string(),
            "tenantName": "Acme Corp",
            "memoryLimitMb": 128
        })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["kind"], "validation_error");
    assert_eq!(json["error"]["field"], "memoryLimitMb");
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_duplicate_provision_is_a_conflict() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;

    let (status, json) = send(
        &fixture,
        "POST",
        "/api/v1/tenants",
        Some(json!({
            "organizationId": tenant.tenant_id.to_string(),
            "tenantName": "Acme Corp"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["kind"], "duplicate_tenant");
}

#[tokio::test]
async fn test_lifecycle_endpoints() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    let base = format!("/api/v1/tenants/{}", tenant.tenant_id);

    let (status, json) = send(&fixture, "POST", &format!("{}/start", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "running");

    let (status, json) = send(&fixture, "POST", &format!("{}/start", base), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"]["kind"], "already_running");

    let (status, _) = send(&fixture, "POST", &format!("{}/restart", base), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&fixture, "POST", &format!("{}/stop", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["status"], "stopped");

    let (status, json) = send(&fixture, "GET", &base, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["container"]["status"], "stopped");
    assert_eq!(json["data"]["latestDeployment"]["deployment_type"], "stop");

    let (status, json) = send(&fixture, "GET", &format!("{}/deployments?limit=2", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_health_check_endpoint_records_not_running() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    let base = format!("/api/v1/tenants/{}", tenant.tenant_id);

    let (status, json) = send(&fixture, "POST", &format!("{}/health-check", base), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["healthy"], false);
    assert_eq!(json["data"]["error"], "not running");

    let (_, json) = send(&fixture, "GET", &format!("{}/health-checks", base), None).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unknown_tenant_is_not_found() {
    let fixture = TestFixture::new();
    let uri = format!("/api/v1/tenants/{}/stop", Uuid::new_v4());

    let (status, json) = send(&fixture, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["kind"], "tenant_not_found");
}

#[tokio::test]
async fn test_metrics_endpoint_requires_running_container() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    let uri = format!("/api/v1/tenants/{}/metrics", tenant.tenant_id);

    let (status, json) = send(&fixture, "POST", &uri, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["error"]["kind"], "container_not_running");
}

#[tokio::test]
async fn test_process_endpoints() {
    let fixture = TestFixture::new();
    fixture.running_tenant().await;

    let response = fixture
        .router()
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = fixture
        .router()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("berth_lifecycle_operations_total"));

    let (status, json) = send(&fixture, "GET", "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["paths"]["/api/v1/tenants"].is_object());
}

#[tokio::test]
async fn test_malformed_tenant_id_is_an_envelope() {
    let fixture = TestFixture::new();

    let (status, json) = send(&fixture, "POST", "/api/v1/tenants/not-a-uuid/start", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["kind"], "validation_error");
    assert_eq!(json["error"]["field"], "tenant_id");
    assert!(json.get("data").is_none());
}

#[tokio::test]
async fn test_mistyped_body_is_an_envelope() {
    let fixture = TestFixture::new();

    let (status, json) = send(
        &fixture,
        "POST",
        "/api/v1/tenants",
        Some(json!({
            "organizationId": Uuid::new_v4().to_string(),
            "tenantName": "Acme Corp",
            "cpuLimit": "lots"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"]["kind"], "validation_error");
    assert_eq!(json["error"]["field"], "body");
    assert!(fixture.store.list_containers().unwrap().is_empty());
}

#[tokio::test]
async fn test_bad_history_limit_is_an_envelope() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    let uri = format!("/api/v1/tenants/{}/deployments?limit=many", tenant.tenant_id);

    let (status, json) = send(&fixture, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["field"], "query");
}
