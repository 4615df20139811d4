// src/metrics.rs

#[cfg(feature = "observability")]
pub use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

// NOTE: When observability feature is disabled, provide stub implementations
#[cfg(not(feature = "observability"))]
pub enum Unit {}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! counter {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
    ($name:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! gauge {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! histogram {
    ($name:expr, $value:expr $(, $label:expr => $label_value:expr)* $(,)?) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_counter {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_gauge {
    ($name:expr, $desc:expr) => {};
}

#[cfg(not(feature = "observability"))]
#[macro_export]
macro_rules! describe_histogram {
    ($name:expr, $unit:expr, $desc:expr) => {};
    ($name:expr, $desc:expr) => {};
}

// Re-export macros for use in this module when observability is disabled
#[cfg(not(feature = "observability"))]
use crate::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

/// Initializes the descriptions for all the metrics in the application.
/// This should be called once at startup.
pub fn describe_metrics() {
    describe_counter!(
        "fee_cache_hits_total",
        Unit::Count,
        "Value cache hits, labeled by the tier that answered (fast, durable)."
    );
    describe_counter!(
        "fee_cache_misses_total",
        Unit::Count,
        "Value cache lookups that missed every tier."
    );
    describe_counter!(
        "upstream_fetch_total",
        Unit::Count,
        "Upstream snapshot refresh attempts, labeled by outcome (success, stale_served, failed)."
    );
    describe_gauge!(
        "upstream_snapshot_age_seconds",
        "Age of the currently served upstream snapshot."
    );
    describe_histogram!(
        "api_request_duration_ms",
        "End-to-end request latency in milliseconds, labeled by endpoint."
    );
    describe_counter!(
        "api_request_timeouts_total",
        Unit::Count,
        "Requests that exceeded the outer time budget."
    );
}

pub fn increment_cache_hit(tier: &'static str) {
    counter!("fee_cache_hits_total", 1, "tier" => tier);
}

pub fn increment_cache_miss() {
    counter!("fee_cache_misses_total", 1);
}

pub fn increment_upstream_fetch(outcome: &'static str) {
    counter!("upstream_fetch_total", 1, "outcome" => outcome);
}

pub fn record_snapshot_age(age_seconds: f64) {
    gauge!("upstream_snapshot_age_seconds", age_seconds);
}

pub fn record_request_duration(endpoint: &'static str, duration: std::time::Duration) {
    histogram!("api_request_duration_ms", duration.as_secs_f64() * 1000.0, "endpoint" => endpoint);
}

pub fn increment_request_timeout() {
    counter!("api_request_timeouts_total", 1);
}

/// Installs the Prometheus exporter on the given port.
#[cfg(feature = "observability")]
pub fn init_prometheus_exporter(port: u16) -> anyhow::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()?;
    Ok(())
}
