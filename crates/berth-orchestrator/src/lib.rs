//! # berth orchestrator
//!
//! Runs one isolated application container per tenant on a single host:
//! provisioning with serialized port allocation, start/stop/restart, health
//! probing and resource sampling, all behind per-tenant locks.
//!
//! [`service::TenantService`] is the entry point shared by the HTTP API, the
//! CLI and the background pollers.

pub mod api;
pub mod cli;
pub mod dal;
pub mod db;
pub mod descriptor;
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod locks;
pub mod metrics;
pub mod metrics_collector;
pub mod ports;
pub mod provisioner;
pub mod runtime;
pub mod service;
pub mod store;
pub mod utils;
