use berth_models::models::{ContainerStatus, DeploymentStatus, DeploymentType, HealthStatus};
use berth_orchestrator::store::TenantStore;
use uuid::Uuid;

use crate::fixtures::{ScriptedRuntime, TestFixture};

#[tokio::test]
async fn test_provision_creates_container_descriptor_and_pending_record() {
    let fixture = TestFixture::new();
    let tenant_id = Uuid::new_v4();

    let result = fixture
        .service
        .provision(&fixture.tenant_config(tenant_id))
        .await;
    assert!(result.success);
    assert!(result.error.is_none());
    let provisioned = result.data.unwrap();
    assert_eq!(provisioned.tenant_id, tenant_id);
    assert_eq!(provisioned.external_port, 3001);
    assert_eq!(provisioned.tenant_url, "http://localhost:3001");

    let container = fixture.store.get_container(tenant_id).unwrap().unwrap();
    assert_eq!(container.id, provisioned.container_id);
    assert_eq!(container.status, ContainerStatus::Provisioning);
    assert_eq!(container.health_status, HealthStatus::Unknown);
    assert!(container.container_id.is_none());
    assert_eq!(container.internal_port, 3000);

    let descriptor = std::fs::read_to_string(&container.descriptor_path).unwrap();
    assert!(descriptor.contains("3001:3000"));
    assert!(descriptor.contains(&tenant_id.to_string()));

    let deployments = fixture.store.list_deployments(container.id, 10).unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].deployment_type, DeploymentType::Provision);
    assert_eq!(deployments[0].status, DeploymentStatus::Pending);
}

#[tokio::test]
async fn test_ports_are_allocated_sequentially_and_never_reused() {
    let fixture = TestFixture::new();

    let first = fixture.provision_tenant().await;
    let second = fixture.provision_tenant().await;
    assert_eq!(first.external_port, 3001);
    assert_eq!(second.external_port, 3002);

    // Stopping a tenant does not release its port.
    fixture.service.start(first.tenant_id).await;
    fixture.service.stop(first.tenant_id).await;
    let third = fixture.provision_tenant().await;
    assert_eq!(third.external_port, 3003);
}

#[tokio::test]
async fn test_duplicate_provision_is_rejected() {
    let fixture = TestFixture::new();
    let tenant_id = Uuid::new_v4();
    let config = fixture.tenant_config(tenant_id);

    assert!(fixture.service.provision(&config).await.success);
    let second = fixture.service.provision(&config).await;
    assert!(!second.success);
    assert!(second.data.is_none());
    assert_eq!(second.error_kind(), Some("duplicate_tenant"));
    assert_eq!(fixture.store.list_containers().unwrap().len(), 1);
}

#[tokio::test]
async fn test_invalid_config_names_the_field_and_writes_nothing() {
    let fixture = TestFixture::new();
    let mut config = fixture.tenant_config(Uuid::new_v4());
    config.cpu_limit = 5.0;

    let result = fixture.service.provision(&config).await;
    assert!(!result.success);
    let error = result.error.unwrap();
    assert_eq!(error.kind, "validation_error");
    assert_eq!(error.field.as_deref(), Some("cpuLimit"));
    assert!(error.message.contains("CPU limit"));

    let mut config = fixture.tenant_config(Uuid::new_v4());
    config.organization_id = "not-a-uuid".to_string();
    let result = fixture.service.provision(&config).await;
    assert_eq!(
        result.error.unwrap().field.as_deref(),
        Some("organizationId")
    );

    assert!(fixture.store.list_containers().unwrap().is_empty());
    assert_eq!(
        std::fs::read_dir(fixture.descriptor_dir.path()).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_start_stop_restart_round_trip() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;

    let started = fixture.service.start(tenant.tenant_id).await;
    assert!(started.success);
    let container = started.data.unwrap();
    assert_eq!(container.status, ContainerStatus::Running);
    assert_eq!(
        container.container_id.as_deref(),
        Some(ScriptedRuntime::container_id(&tenant.container_name).as_str())
    );

    let again = fixture.service.start(tenant.tenant_id).await;
    assert_eq!(again.error_kind(), Some("already_running"));

    let restarted = fixture.service.restart(tenant.tenant_id).await;
    assert!(restarted.success);
    assert_eq!(restarted.data.unwrap().status, ContainerStatus::Running);

    let stopped = fixture.service.stop(tenant.tenant_id).await;
    assert!(stopped.success);
    assert_eq!(stopped.data.unwrap().status, ContainerStatus::Stopped);

    let again = fixture.service.stop(tenant.tenant_id).await;
    assert_eq!(again.error_kind(), Some("not_running"));

    let history = fixture
        .service
        .deployment_history(tenant.tenant_id, 10)
        .data
        .unwrap();
    let types: Vec<DeploymentType> = history.iter().map(|d| d.deployment_type).collect();
    assert_eq!(
        types,
        vec![
            DeploymentType::Stop,
            DeploymentType::Restart,
            DeploymentType::Start,
            DeploymentType::Provision,
        ]
    );
}

#[tokio::test]
async fn test_operations_on_unknown_tenant() {
    let fixture = TestFixture::new();
    let tenant_id = Uuid::new_v4();

    assert_eq!(
        fixture.service.start(tenant_id).await.error_kind(),
        Some("tenant_not_found")
    );
    assert_eq!(
        fixture.service.stop(tenant_id).await.error_kind(),
        Some("tenant_not_found")
    );
    assert_eq!(
        fixture.service.check_health(tenant_id).await.error_kind(),
        Some("tenant_not_found")
    );
    assert_eq!(
        fixture.service.get_status(tenant_id).await.error_kind(),
        Some("tenant_not_found")
    );
}

#[tokio::test]
async fn test_failed_start_is_recorded_and_retryable() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    *fixture.runtime.fail_up.lock().unwrap() = true;

    let result = fixture.service.start(tenant.tenant_id).await;
    assert_eq!(result.error_kind(), Some("runtime_invocation_error"));
    assert!(result.error.unwrap().message.contains("image not found"));

    let status = fixture.service.get_status(tenant.tenant_id).await.data.unwrap();
    assert_eq!(status.container.status, ContainerStatus::Failed);
    let deployment = status.latest_deployment.unwrap();
    assert_eq!(deployment.deployment_type, DeploymentType::Start);
    assert_eq!(deployment.status, DeploymentStatus::Failed);
    assert!(deployment.completed_at.is_some());

    *fixture.runtime.fail_up.lock().unwrap() = false;
    assert!(fixture.service.start(tenant.tenant_id).await.success);
}

#[tokio::test]
async fn test_list_tenants() {
    let fixture = TestFixture::new();
    fixture.provision_tenant().await;
    fixture.provision_tenant().await;

    let tenants = fixture.service.list_tenants().data.unwrap();
    assert_eq!(tenants.len(), 2);
}
