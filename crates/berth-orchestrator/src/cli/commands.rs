use std::sync::Arc;
use std::time::Duration;

use berth_models::models::TenantConfig;
use berth_utils::config::Settings;
use berth_utils::logging::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use serde::Serialize;
use tokio::signal;

use crate::api;
use crate::cli::{Commands, ProvisionArgs};
use crate::dal::DAL;
use crate::error::OrchestratorError;
use crate::db::{create_shared_connection_pool, ConnectionPool};
use crate::runtime::{ContainerRuntime, DockerRuntime};
use crate::service::{OperationResult, ServiceConfig, TenantService};
use crate::store::{MemoryStore, TenantStore};
use crate::utils;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("../berth-models/migrations");

type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Dispatches a parsed command. Returns `false` when a tenant operation
/// reported failure, so the binary can exit non-zero.
pub async fn run(command: Commands, config: &Settings) -> CommandResult<bool> {
    match command {
        Commands::Serve { in_memory } => serve(config, in_memory).await.map(|_| true),
        Commands::Migrate => migrate(config).map(|_| true),
        Commands::Provision(args) => {
            let service = build_service(config, false)?;
            Ok(print(service.provision(&tenant_config(args)).await))
        }
        Commands::Start(args) => Ok(print(build_service(config, false)?.start(args.tenant).await)),
        Commands::Stop(args) => Ok(print(build_service(config, false)?.stop(args.tenant).await)),
        Commands::Restart(args) => {
            Ok(print(build_service(config, false)?.restart(args.tenant).await))
        }
        Commands::Health(args) => Ok(print(
            build_service(config, false)?
                .check_health(args.tenant)
                .await,
        )),
        Commands::Metrics(args) => Ok(print(
            build_service(config, false)?
                .get_resource_metrics(args.tenant)
                .await,
        )),
        Commands::Status(args) => Ok(print(
            build_service(config, false)?
                .get_status(args.tenant)
                .await,
        )),
        Commands::List => Ok(print(build_service(config, false)?.list_tenants())),
    }
}

fn tenant_config(args: ProvisionArgs) -> TenantConfig {
    let mut tenant = TenantConfig::new(args.organization_id, args.tenant_name);
    if let Some(cpu) = args.cpu_limit {
        tenant.cpu_limit = cpu;
    }
    if let Some(memory) = args.memory_limit_mb {
        tenant.memory_limit_mb = memory;
    }
    if let Some(disk) = args.disk_limit_mb {
        tenant.disk_limit_mb = disk;
    }
    tenant
}

/// Writes the operation envelope to stdout as JSON.
fn print<T: Serialize>(result: OperationResult<T>) -> bool {
    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => error!("Failed to encode result: {}", e),
    }
    result.success
}

/// Creates the pool, sets up the schema and applies pending migrations.
fn prepare_database(config: &Settings, max_size: u32) -> CommandResult<ConnectionPool> {
    info!("Creating database connection pool");
    let pool = create_shared_connection_pool(
        &config.database.url,
        max_size,
        config.database.schema.as_deref(),
    )?;

    if let Some(ref schema) = config.database.schema {
        info!("Setting up schema: {}", schema);
        pool.setup_schema()?;
    }

    info!("Running pending database migrations");
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| OrchestratorError::Persistence(format!("migrations failed: {}", e)))?;
    info!("Database migrations completed successfully");
    Ok(pool)
}

pub fn migrate(config: &Settings) -> CommandResult<()> {
    prepare_database(config, 1)?;
    Ok(())
}

/// Wires a [`TenantService`] to the configured store and the Docker runtime.
pub fn build_service(config: &Settings, in_memory: bool) -> CommandResult<TenantService> {
    let store: Arc<dyn TenantStore> = if in_memory {
        warn!("Using in-memory store; tenant state will not survive a restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = prepare_database(config, config.database.max_connections)?;
        Arc::new(DAL::new(pool))
    };

    let runtime: Arc<dyn ContainerRuntime> = Arc::new(DockerRuntime::new(
        config.orchestrator.compose_command.clone(),
        Duration::from_secs(config.orchestrator.runtime_timeout_seconds),
    ));

    let service_config = ServiceConfig::from_settings(config)?;
    Ok(TenantService::new(service_config, store, runtime)?)
}

/// Starts the HTTP API and background pollers, running until ctrl+c.
pub async fn serve(config: &Settings, in_memory: bool) -> CommandResult<()> {
    info!("Starting berth orchestrator");

    let service = Arc::new(build_service(config, in_memory)?);
    if let Err(e) = service.refresh_status_gauge() {
        warn!("Failed to initialise tenant status gauge: {}", e);
    }

    info!("Starting background tasks");
    let pollers = utils::background_tasks::start_polling_tasks(service.clone(), config);

    info!("Configuring API routes");
    let app = api::configure_api_routes().with_state(service);

    let addr = config.server.bind_address.as_str();
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for ctrl+c: {}", e);
            return;
        }
        shutdown_tx.send(()).ok();
    });

    info!("berth orchestrator is now running");
    axum::serve(listener, app)
        .with_graceful_shutdown(utils::shutdown(shutdown_rx))
        .await?;

    for poller in pollers {
        poller.abort();
    }
    info!("berth orchestrator stopped");
    Ok(())
}
