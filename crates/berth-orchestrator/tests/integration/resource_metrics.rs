use berth_orchestrator::runtime::ContainerStats;
use berth_orchestrator::store::TenantStore;

use crate::fixtures::TestFixture;

fn sample() -> ContainerStats {
    ContainerStats {
        cpu_percent: 12.5,
        memory_usage_mb: 256.0,
        memory_limit_mb: 512.0,
        network_rx_bytes: 4096,
        network_tx_bytes: 1024,
    }
}

#[tokio::test]
async fn test_sample_is_recorded_for_running_tenant() {
    let fixture = TestFixture::new();
    let tenant = fixture.running_tenant().await;
    *fixture.runtime.stats.lock().unwrap() = Some(sample());

    let result = fixture.service.get_resource_metrics(tenant.tenant_id).await;
    assert!(result.success);
    let metrics = result.data.unwrap();
    assert_eq!(metrics.stats, sample());
    assert_eq!(
        (metrics.period_end - metrics.period_start).num_seconds(),
        fixture.config.metrics_window_seconds
    );

    let stored = fixture
        .store
        .list_resource_usage(tenant.container_id, 10)
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].network_rx_bytes, 4096);
}

#[tokio::test]
async fn test_sample_serializes_flat() {
    let fixture = TestFixture::new();
    let tenant = fixture.running_tenant().await;
    *fixture.runtime.stats.lock().unwrap() = Some(sample());

    let result = fixture.service.get_resource_metrics(tenant.tenant_id).await;
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["data"]["cpuPercent"], 12.5);
    assert_eq!(json["data"]["memoryLimitMb"], 512.0);
    assert!(json["data"]["periodStart"].is_string());
}

#[tokio::test]
async fn test_stopped_tenant_is_rejected() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    *fixture.runtime.stats.lock().unwrap() = Some(sample());

    let result = fixture.service.get_resource_metrics(tenant.tenant_id).await;
    assert_eq!(result.error_kind(), Some("container_not_running"));
    assert!(fixture
        .store
        .list_resource_usage(tenant.container_id, 10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_runtime_failure_is_a_query_error() {
    let fixture = TestFixture::new();
    let tenant = fixture.running_tenant().await;

    let result = fixture.service.get_resource_metrics(tenant.tenant_id).await;
    assert_eq!(result.error_kind(), Some("runtime_query_error"));
    assert!(fixture
        .store
        .list_resource_usage(tenant.container_id, 10)
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_collect_all_samples_only_running_tenants() {
    let fixture = TestFixture::new();
    let running = fixture.running_tenant().await;
    fixture.provision_tenant().await;
    *fixture.runtime.stats.lock().unwrap() = Some(sample());

    let results = fixture.service.collect_all_metrics().await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].0, running.tenant_id);
    assert!(results[0].1.success);
}
