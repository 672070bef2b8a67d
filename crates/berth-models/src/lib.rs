//! Data model for the berth tenant container orchestrator.
pub mod models;
pub mod schema;
