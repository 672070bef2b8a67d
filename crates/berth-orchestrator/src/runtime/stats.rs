//! Normalization of engine stats samples.
//!
//! The engine reports cumulative CPU counters, raw byte counts and a map of
//! per-interface network counters. These helpers turn one sample into a
//! [`ContainerStats`] using the same CPU formula as `docker stats`.

use bollard::container::{CPUStats, Stats};

use super::ContainerStats;
use crate::error::OrchestratorError;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// The CPU counters needed to compute a utilization percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuCounters {
    pub total_usage: u64,
    pub system_usage: Option<u64>,
    pub online_cpus: u64,
}

impl From<&CPUStats> for CpuCounters {
    fn from(stats: &CPUStats) -> Self {
        let online_cpus = stats.online_cpus.filter(|n| *n > 0).unwrap_or_else(|| {
            stats
                .cpu_usage
                .percpu_usage
                .as_ref()
                .map(|per_cpu| per_cpu.len() as u64)
                .unwrap_or(1)
        });
        CpuCounters {
            total_usage: stats.cpu_usage.total_usage,
            system_usage: stats.system_cpu_usage,
            online_cpus,
        }
    }
}

/// CPU utilization between two samples, scaled by the number of online CPUs.
///
/// Returns 0.0 when either delta is not positive, as on the first sample of a
/// freshly started container.
pub fn cpu_percent(current: &CpuCounters, previous: &CpuCounters) -> f64 {
    let (Some(system_now), Some(system_before)) = (current.system_usage, previous.system_usage)
    else {
        return 0.0;
    };
    let cpu_delta = current.total_usage.saturating_sub(previous.total_usage) as f64;
    let system_delta = system_now.saturating_sub(system_before) as f64;
    if cpu_delta <= 0.0 || system_delta <= 0.0 {
        return 0.0;
    }
    round2(cpu_delta / system_delta * current.online_cpus as f64 * 100.0)
}

pub fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / BYTES_PER_MB)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn counter(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Sums per-interface network counters into `(rx, tx)` bytes.
pub fn network_totals(interfaces: impl IntoIterator<Item = (u64, u64)>) -> (i64, i64) {
    let (rx, tx) = interfaces
        .into_iter()
        .fold((0u64, 0u64), |(rx, tx), (r, t)| {
            (rx.saturating_add(r), tx.saturating_add(t))
        });
    (counter(rx), counter(tx))
}

/// Normalizes a one-shot engine sample.
pub fn normalize(stats: &Stats) -> Result<ContainerStats, OrchestratorError> {
    let usage = stats.memory_stats.usage.ok_or_else(|| {
        OrchestratorError::RuntimeQuery(format!(
            "stats sample for {} has no memory usage",
            stats.name
        ))
    })?;
    let limit = stats.memory_stats.limit.ok_or_else(|| {
        OrchestratorError::RuntimeQuery(format!(
            "stats sample for {} has no memory limit",
            stats.name
        ))
    })?;

    let cpu = cpu_percent(
        &CpuCounters::from(&stats.cpu_stats),
        &CpuCounters::from(&stats.precpu_stats),
    );

    let (network_rx_bytes, network_tx_bytes) = match &stats.networks {
        Some(networks) => network_totals(networks.values().map(|n| (n.rx_bytes, n.tx_bytes))),
        None => (0, 0),
    };

    Ok(ContainerStats {
        cpu_percent: cpu,
        memory_usage_mb: bytes_to_mb(usage),
        memory_limit_mb: bytes_to_mb(limit),
        network_rx_bytes,
        network_tx_bytes,
    })
}
