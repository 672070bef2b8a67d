use std::collections::HashSet;
use std::time::Duration;

use berth_models::models::ContainerStatus;
use berth_orchestrator::store::TenantStore;
use futures::future::join_all;
use uuid::Uuid;

use crate::fixtures::TestFixture;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_provisions_get_distinct_contiguous_ports() {
    let fixture = TestFixture::new();

    let tasks = (0..20).map(|_| {
        let service = fixture.service.clone();
        let config = fixture.tenant_config(Uuid::new_v4());
        tokio::spawn(async move { service.provision(&config).await })
    });
    let results = join_all(tasks).await;

    let ports: HashSet<i32> = results
        .into_iter()
        .map(|r| r.unwrap().data.expect("provision failed").external_port)
        .collect();
    let expected: HashSet<i32> = (3001..3021).collect();
    assert_eq!(ports, expected);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_provisions_of_one_tenant_create_one_container() {
    let fixture = TestFixture::new();
    let tenant_id = Uuid::new_v4();

    let tasks = (0..8).map(|_| {
        let service = fixture.service.clone();
        let config = fixture.tenant_config(tenant_id);
        tokio::spawn(async move { service.provision(&config).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    assert!(results
        .iter()
        .filter(|r| !r.success)
        .all(|r| r.error_kind() == Some("duplicate_tenant")));
    assert_eq!(fixture.store.list_containers().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_operations_on_one_tenant_are_serialized() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    *fixture.runtime.delay.lock().unwrap() = Duration::from_millis(50);

    let tasks = (0..5).map(|_| {
        let service = fixture.service.clone();
        tokio::spawn(async move { service.start(tenant.tenant_id).await })
    });
    let results: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    assert_eq!(results.iter().filter(|r| r.success).count(), 1);
    assert!(results
        .iter()
        .filter(|r| !r.success)
        .all(|r| r.error_kind() == Some("already_running")));
    assert_eq!(*fixture.runtime.up_calls.lock().unwrap(), 1);
    assert_eq!(*fixture.runtime.max_in_flight_per_project.lock().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_tenants_proceed_in_parallel() {
    let fixture = TestFixture::new();
    let first = fixture.provision_tenant().await;
    let second = fixture.provision_tenant().await;
    *fixture.runtime.delay.lock().unwrap() = Duration::from_millis(200);

    let (a, b) = tokio::join!(
        fixture.service.start(first.tenant_id),
        fixture.service.start(second.tenant_id)
    );
    assert!(a.success && b.success);
    assert_eq!(*fixture.runtime.max_in_flight_total.lock().unwrap(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stop_waits_for_in_flight_start() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    *fixture.runtime.delay.lock().unwrap() = Duration::from_millis(100);

    let service = fixture.service.clone();
    let start = tokio::spawn(async move { service.start(tenant.tenant_id).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stop = fixture.service.stop(tenant.tenant_id).await;

    assert!(start.await.unwrap().success);
    // The stop observed the finished start, not a half-started container.
    assert!(stop.success, "stop failed: {:?}", stop.error);
    assert_eq!(*fixture.runtime.max_in_flight_per_project.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_lock_registry_is_emptied_after_operations() {
    let fixture = TestFixture::new();

    for _ in 0..1000 {
        let result = fixture.service.start(Uuid::new_v4()).await;
        assert_eq!(result.error_kind(), Some("tenant_not_found"));
    }
    assert_eq!(fixture.service.tracked_locks(), 0);

    let tenant = fixture.running_tenant().await;
    fixture.service.check_health(tenant.tenant_id).await;
    fixture.service.stop(tenant.tenant_id).await;
    assert_eq!(fixture.service.tracked_locks(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_process_waits_for_in_flight_start() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    let other_process = fixture.sibling_service(|_| {});
    *fixture.runtime.delay.lock().unwrap() = Duration::from_millis(100);

    let service = fixture.service.clone();
    let start = tokio::spawn(async move { service.start(tenant.tenant_id).await });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let stop = other_process.stop(tenant.tenant_id).await;

    assert!(start.await.unwrap().success);
    assert!(stop.success, "stop failed: {:?}", stop.error);
    assert_eq!(*fixture.runtime.max_in_flight_per_project.lock().unwrap(), 1);
    assert_eq!(stop.data.unwrap().status, ContainerStatus::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_process_gives_up_when_tenant_stays_busy() {
    let fixture = TestFixture::new();
    let tenant = fixture.provision_tenant().await;
    let other_process = fixture.sibling_service(|config| {
        config.lease_wait = Duration::from_millis(50);
    });
    *fixture.runtime.delay.lock().unwrap() = Duration::from_millis(300);

    let service = fixture.service.clone();
    let start = tokio::spawn(async move { service.start(tenant.tenant_id).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let restart = other_process.restart(tenant.tenant_id).await;
    assert_eq!(restart.error_kind(), Some("tenant_busy"));
    assert_eq!(*fixture.runtime.down_calls.lock().unwrap(), 0);

    assert!(start.await.unwrap().success);
    let status = other_process.get_status(tenant.tenant_id).await.data.unwrap();
    assert_eq!(status.container.status, ContainerStatus::Running);
}
