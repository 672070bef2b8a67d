//! # Metrics Module
//!
//! Prometheus metrics for the orchestrator: lifecycle operations, health
//! probes and resource samples.

use prometheus::{
    CounterVec, Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntGaugeVec, Opts,
    Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all orchestrator metrics
static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Lifecycle operation counter
/// Labels: operation (provision/start/stop/restart), outcome (success/error kind)
pub fn lifecycle_operations_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "berth_lifecycle_operations_total",
            "Total number of tenant lifecycle operations by type and outcome",
        );
        let counter = CounterVec::new(opts, &["operation", "outcome"])
            .expect("Failed to create lifecycle operations counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register lifecycle operations counter");
        counter
    })
}

/// Lifecycle operation duration histogram
/// Labels: operation
pub fn lifecycle_duration_seconds() -> &'static HistogramVec {
    static HISTOGRAM: OnceLock<HistogramVec> = OnceLock::new();
    HISTOGRAM.get_or_init(|| {
        let opts = HistogramOpts::new(
            "berth_lifecycle_duration_seconds",
            "Tenant lifecycle operation latency distribution in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]);
        let histogram = HistogramVec::new(opts, &["operation"])
            .expect("Failed to create lifecycle duration histogram");
        registry()
            .register(Box::new(histogram.clone()))
            .expect("Failed to register lifecycle duration histogram");
        histogram
    })
}

/// Health probe counter
/// Labels: status (healthy/unhealthy/timeout)
pub fn health_checks_total() -> &'static CounterVec {
    static COUNTER: OnceLock<CounterVec> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "berth_health_checks_total",
            "Total number of tenant health checks by outcome",
        );
        let counter =
            CounterVec::new(opts, &["status"]).expect("Failed to create health checks counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register health checks counter");
        counter
    })
}

/// Health probe latency histogram
pub fn health_check_duration_seconds() -> &'static Histogram {
    static HISTOGRAM: OnceLock<Histogram> = OnceLock::new();
    HISTOGRAM.get_or_init(|| {
        let opts = HistogramOpts::new(
            "berth_health_check_duration_seconds",
            "Tenant health probe latency distribution in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]);
        let histogram = Histogram::with_opts(opts)
            .expect("Failed to create health check duration histogram");
        registry()
            .register(Box::new(histogram.clone()))
            .expect("Failed to register health check duration histogram");
        histogram
    })
}

/// Resource samples persisted
pub fn resource_samples_total() -> &'static IntCounter {
    static COUNTER: OnceLock<IntCounter> = OnceLock::new();
    COUNTER.get_or_init(|| {
        let opts = Opts::new(
            "berth_resource_samples_total",
            "Total number of resource usage samples recorded",
        );
        let counter =
            IntCounter::with_opts(opts).expect("Failed to create resource samples counter");
        registry()
            .register(Box::new(counter.clone()))
            .expect("Failed to register resource samples counter");
        counter
    })
}

/// Tenant containers by lifecycle status
/// Labels: status
pub fn tenants_by_status() -> &'static IntGaugeVec {
    static GAUGE: OnceLock<IntGaugeVec> = OnceLock::new();
    GAUGE.get_or_init(|| {
        let opts = Opts::new(
            "berth_tenants",
            "Number of tenant containers by lifecycle status",
        );
        let gauge =
            IntGaugeVec::new(opts, &["status"]).expect("Failed to create tenants gauge");
        registry()
            .register(Box::new(gauge.clone()))
            .expect("Failed to register tenants gauge");
        gauge
    })
}

/// Encodes all registered metrics in Prometheus text format
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    encoder
        .encode(&metric_families, &mut buffer)
        .expect("Failed to encode metrics");
    String::from_utf8(buffer).expect("Failed to convert metrics to UTF-8")
}
