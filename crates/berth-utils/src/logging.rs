//! # Berth Logging Module
//!
//! Structured logging for the berth crates, built on `tracing`.
//!
//! ## Usage
//!
//! 1. Initialize the subscriber once at start-up:
//!    ```
//!    berth_utils::logging::init("info", "text").expect("Failed to initialize logger");
//!    ```
//!
//! 2. Use the log macros throughout your code:
//!    ```
//!    use berth_utils::logging::prelude::*;
//!
//!    info!(tenant_id = "acme", "tenant started");
//!    warn!("probe timed out");
//!    ```
//!
//! ## Log Levels
//!
//! - "off": Turn off all logging
//! - "error": Log only errors
//! - "warn": Log warnings and errors
//! - "info": Log info, warnings, and errors (default)
//! - "debug": Log debug messages and all above
//! - "trace": Log trace messages and all above
//!
//! When `RUST_LOG` is set it takes precedence over the configured level.

use std::sync::OnceLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Error type for logger initialization
#[derive(Debug)]
pub struct LoggingError(String);

impl std::fmt::Display for LoggingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to initialize logging: {}", self.0)
    }
}

impl std::error::Error for LoggingError {}

/// Initializes the global tracing subscriber.
///
/// # Arguments
/// * `level` - Log level ("trace", "debug", "info", "warn", "error", "off")
/// * `format` - Log output format ("text" for human-readable, "json" for structured JSON)
///
/// Calling this more than once is a no-op.
pub fn init(level: &str, format: &str) -> Result<(), LoggingError> {
    let mut result = Ok(());
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(normalize_level(level)));
        let registry = tracing_subscriber::registry().with(filter);

        let installed = if format.eq_ignore_ascii_case("json") {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
        } else {
            registry.with(tracing_subscriber::fmt::layer()).try_init()
        };

        if let Err(e) = installed {
            result = Err(LoggingError(e.to_string()));
        }
    });
    result
}

/// Maps a configured level onto a filter directive, falling back to "info".
fn normalize_level(level: &str) -> &'static str {
    match level.to_lowercase().as_str() {
        "off" => "off",
        "error" => "error",
        "warn" => "warn",
        "info" => "info",
        "debug" => "debug",
        "trace" => "trace",
        _ => "info",
    }
}

pub mod prelude {
    pub use tracing::{debug, error, info, trace, warn};
}
