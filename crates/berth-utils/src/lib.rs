//! Shared configuration and logging for the berth crates.

pub mod config;
pub mod logging;

pub use config::Settings;
