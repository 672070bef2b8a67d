pub mod commands;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
/// Berth CLI
///
/// Serves the tenant orchestrator API and runs one-off lifecycle operations
/// against the same database and container runtime.
pub struct Cli {
    /// Optional configuration file layered over the built-in defaults
    #[arg(long, global = true, env = "BERTH_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the orchestrator HTTP server and background pollers
    Serve {
        /// Keep all state in memory instead of PostgreSQL
        #[arg(long)]
        in_memory: bool,
    },

    /// Run pending database migrations and exit
    Migrate,

    /// Provision a container for a new tenant
    Provision(ProvisionArgs),

    /// Start a tenant container
    Start(TenantArgs),

    /// Stop a tenant container
    Stop(TenantArgs),

    /// Restart a tenant container
    Restart(TenantArgs),

    /// Check a tenant's health and record the result
    Health(TenantArgs),

    /// Sample a tenant's resource usage and record it
    Metrics(TenantArgs),

    /// Show a tenant's container, latest health check and latest deployment
    Status(TenantArgs),

    /// List every tenant container
    List,
}

#[derive(Args)]
pub struct TenantArgs {
    /// Tenant (organization) id
    #[arg(long)]
    pub tenant: Uuid,
}

#[derive(Args)]
pub struct ProvisionArgs {
    /// Organization id owning the tenant
    #[arg(long)]
    pub organization_id: String,
    /// Display name of the tenant
    #[arg(long)]
    pub tenant_name: String,
    /// CPU cores, between 0.1 and 4
    #[arg(long)]
    pub cpu_limit: Option<f64>,
    /// Memory limit in MB, between 256 and 8192
    #[arg(long)]
    pub memory_limit_mb: Option<i32>,
    /// Disk limit in MB
    #[arg(long)]
    pub disk_limit_mb: Option<i32>,
}

pub fn parse_cli() -> Cli {
    Cli::parse()
}
