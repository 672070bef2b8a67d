//! PostgreSQL-backed store tests. Run with `DATABASE_URL` set and `--ignored`.

use std::time::Duration;

use berth_models::models::{
    container_name_for, ContainerStateChange, ContainerStatus, DeploymentOutcome,
    DeploymentStatus, DeploymentType, HealthCheckStatus, HealthStatus, NewDeploymentRecord,
    NewHealthCheckRecord, NewTenantContainer,
};
use berth_orchestrator::cli::commands::MIGRATIONS;
use berth_orchestrator::dal::DAL;
use berth_orchestrator::db::create_shared_connection_pool;
use berth_orchestrator::store::TenantStore;
use chrono::Utc;
use diesel_migrations::MigrationHarness;
use dotenv::dotenv;
use uuid::Uuid;

/// DAL over a fresh schema so tests do not see each other's rows.
fn test_dal() -> DAL {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let schema = format!("berth_test_{}", Uuid::new_v4().simple());

    let pool = create_shared_connection_pool(&database_url, 4, Some(&schema))
        .expect("Failed to create pool");
    pool.setup_schema().expect("Failed to set up schema");
    let mut conn = pool.get().expect("Failed to get DB connection");
    conn.run_pending_migrations(MIGRATIONS)
        .expect("Failed to run migrations");
    DAL::new(pool)
}

fn create(dal: &DAL, tenant_id: Uuid) -> berth_models::models::TenantContainer {
    dal.create_with_next_port(tenant_id, 3001, Some("app:1"), &mut |port| {
        Ok(NewTenantContainer::new(
            tenant_id,
            "Acme".to_string(),
            container_name_for(tenant_id),
            port,
            3000,
            format!("http://localhost:{}", port),
            0.5,
            512,
            1024,
            format!("/tmp/{}/docker-compose.yml", tenant_id),
        )
        .expect("valid container"))
    })
    .expect("Failed to create container")
}

#[test]
#[ignore = "requires DATABASE_URL"]
fn test_create_allocates_sequential_ports() {
    let dal = test_dal();
    let first = create(&dal, Uuid::new_v4());
    let second = create(&dal, Uuid::new_v4());

    assert_eq!(first.external_port, 3001);
    assert_eq!(second.external_port, 3002);
    assert_eq!(dal.max_external_port().unwrap(), Some(3002));

    let deployments = dal.list_deployments(first.id, 10).unwrap();
    assert_eq!(deployments.len(), 1);
    assert_eq!(deployments[0].deployment_type, DeploymentType::Provision);
    assert_eq!(deployments[0].status, DeploymentStatus::Pending);
}

#[test]
#[ignore = "requires DATABASE_URL"]
fn test_duplicate_tenant_is_rejected() {
    let dal = test_dal();
    let tenant_id = Uuid::new_v4();
    create(&dal, tenant_id);

    let err = dal
        .create_with_next_port(tenant_id, 3001, None, &mut |_| {
            panic!("builder must not run for a duplicate tenant")
        })
        .unwrap_err();
    assert_eq!(err.kind(), "duplicate_tenant");
}

#[test]
#[ignore = "requires DATABASE_URL"]
fn test_concurrent_creates_get_distinct_ports() {
    let dal = test_dal();
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dal = dal.clone();
            std::thread::spawn(move || create(&dal, Uuid::new_v4()).external_port)
        })
        .collect();

    let mut ports: Vec<i32> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    ports.sort();
    assert_eq!(ports, (3001..3009).collect::<Vec<_>>());
}

#[test]
#[ignore = "requires DATABASE_URL"]
fn test_state_changes_and_history() {
    let dal = test_dal();
    let tenant_id = Uuid::new_v4();
    let container = create(&dal, tenant_id);

    let updated = dal
        .update_container_state(
            container.id,
            &ContainerStateChange {
                status: Some(ContainerStatus::Running),
                container_id: Some(Some("abc123".to_string())),
                last_started_at: Some(Utc::now()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated.status, ContainerStatus::Running);
    assert_eq!(updated.container_id.as_deref(), Some("abc123"));

    let record = NewHealthCheckRecord::new(
        container.id,
        Utc::now(),
        HealthCheckStatus::Healthy,
        Some(12),
        Some(200),
        None,
    )
    .unwrap();
    dal.record_health_check(&record, HealthStatus::Healthy).unwrap();
    let container = dal.get_container(tenant_id).unwrap().unwrap();
    assert_eq!(container.health_status, HealthStatus::Healthy);
    assert!(container.last_health_check_at.is_some());

    let start = dal
        .insert_deployment(&NewDeploymentRecord::pending(
            container.id,
            DeploymentType::Start,
            None,
            Some("app:1".to_string()),
        ))
        .unwrap();
    dal.complete_deployment(start.id, &DeploymentOutcome::completed(None))
        .unwrap();
    assert_eq!(
        dal.last_deployed_image(container.id).unwrap().as_deref(),
        Some("app:1")
    );
}

#[test]
#[ignore = "requires DATABASE_URL"]
fn test_tenant_lease_excludes_other_holders() {
    let dal = test_dal();
    // A second DAL over the same schema stands in for another process.
    let other = DAL::new(dal.pool.clone());
    let tenant_id = Uuid::new_v4();
    let ttl = Duration::from_secs(60);

    let lease = dal.try_lease(tenant_id, ttl).unwrap().expect("lease is free");
    assert!(other.try_lease(tenant_id, ttl).unwrap().is_none());
    assert!(other.try_lease(Uuid::new_v4(), ttl).unwrap().is_some());

    drop(lease);
    assert!(other.try_lease(tenant_id, ttl).unwrap().is_some());
    assert_eq!(dal.tenant_leases().count().unwrap(), 0);
}

#[test]
#[ignore = "requires DATABASE_URL"]
fn test_expired_tenant_lease_is_taken_over() {
    let dal = test_dal();
    let tenant_id = Uuid::new_v4();

    let stale = dal.try_lease(tenant_id, Duration::ZERO).unwrap().unwrap();
    std::thread::sleep(Duration::from_millis(10));
    let fresh = dal
        .try_lease(tenant_id, Duration::from_secs(60))
        .unwrap()
        .expect("expired lease should be taken over");

    drop(stale);
    assert!(dal.try_lease(tenant_id, Duration::from_secs(60)).unwrap().is_none());
    drop(fresh);
    assert_eq!(dal.tenant_leases().count().unwrap(), 0);
}
