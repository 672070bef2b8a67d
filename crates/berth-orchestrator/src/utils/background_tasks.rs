//! Background tasks for the orchestrator.
//!
//! Periodic sweeps that check the health and sample the resources of every
//! running tenant. Each sweep goes through [`TenantService`], so it takes the
//! same per-tenant locks as API requests.

use std::sync::Arc;
use std::time::Duration;

use berth_utils::logging::prelude::*;
use berth_utils::Settings;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::service::TenantService;

/// Configuration for the health polling task.
pub struct HealthPollingConfig {
    /// How often to sweep running tenants (in seconds).
    pub interval_seconds: u64,
}

/// Configuration for the resource sampling task.
pub struct MetricsPollingConfig {
    /// How often to sample running tenants (in seconds).
    pub interval_seconds: u64,
}

/// Starts the health polling background task.
///
/// Every tick checks all tenants whose persisted status is `running` and
/// refreshes the per-status tenant gauge.
pub fn start_health_polling_task(
    service: Arc<TenantService>,
    config: HealthPollingConfig,
) -> JoinHandle<()> {
    info!(
        "Starting health polling task (interval: {}s)",
        config.interval_seconds
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_seconds.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let results = service.check_all_health().await;
            let unhealthy = results
                .iter()
                .filter(|(_, r)| !r.data.as_ref().map(|h| h.healthy).unwrap_or(false))
                .count();
            if unhealthy > 0 {
                warn!(
                    "{} of {} running tenants failed their health check",
                    unhealthy,
                    results.len()
                );
            } else {
                debug!("Checked health of {} running tenants", results.len());
            }

            if let Err(e) = service.refresh_status_gauge() {
                error!("Failed to refresh tenant status gauge: {}", e);
            }
        }
    })
}

/// Starts the resource sampling background task.
pub fn start_metrics_polling_task(
    service: Arc<TenantService>,
    config: MetricsPollingConfig,
) -> JoinHandle<()> {
    info!(
        "Starting resource metrics task (interval: {}s)",
        config.interval_seconds
    );

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(config.interval_seconds.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let results = service.collect_all_metrics().await;
            for (tenant_id, result) in &results {
                if let Some(e) = &result.error {
                    warn!(tenant_id = %tenant_id, kind = %e.kind, "Resource sample failed: {}", e.message);
                }
            }
            debug!("Sampled resources of {} running tenants", results.len());
        }
    })
}

/// Starts every polling task enabled in `settings`.
pub fn start_polling_tasks(service: Arc<TenantService>, settings: &Settings) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();
    if settings.health.polling_enabled {
        handles.push(start_health_polling_task(
            service.clone(),
            HealthPollingConfig {
                interval_seconds: settings.health.poll_interval_seconds,
            },
        ));
    }
    if settings.metrics.polling_enabled {
        handles.push(start_metrics_polling_task(
            service,
            MetricsPollingConfig {
                interval_seconds: settings.metrics.poll_interval_seconds,
            },
        ));
    }
    handles
}
