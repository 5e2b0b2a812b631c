//! Metrics collection.
//!
//! # Metrics
//! - `arbscan_requests_total` (counter): attempts by method, status class
//! - `arbscan_request_duration_seconds` (histogram): per-attempt latency
//! - `arbscan_retries_total` (counter): retries by failure kind
//! - `arbscan_short_circuits_total` (counter): calls rejected while disabled
//! - `arbscan_endpoint_disabled_total` (counter): registered endpoint errors
//! - `arbscan_exhausted_total` (counter): calls that ran out of attempts
//! - `arbscan_resets_total` (counter): resets by scope
//!
//! Recording goes through the `metrics` facade; without an installed
//! recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::short_label;
use crate::resilience::FailureKind;

/// Install the Prometheus recorder and serve it on `addr`.
///
/// Must run inside a tokio runtime. Failure only logs; the CLI works
/// without metrics.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_request(method: &str, outcome: &'static str, start: Instant) {
    metrics::counter!(
        "arbscan_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    metrics::histogram!("arbscan_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(kind: FailureKind) {
    metrics::counter!("arbscan_retries_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_short_circuit(endpoint: &str) {
    metrics::counter!("arbscan_short_circuits_total", "endpoint" => short_label(endpoint))
        .increment(1);
}

pub fn record_endpoint_disabled(endpoint: &str, error_count: u32) {
    metrics::counter!("arbscan_endpoint_disabled_total", "endpoint" => short_label(endpoint))
        .increment(1);
    metrics::gauge!("arbscan_endpoint_error_count", "endpoint" => short_label(endpoint))
        .set(f64::from(error_count));
}

pub fn record_exhausted(endpoint: &str, kind: FailureKind) {
    metrics::counter!(
        "arbscan_exhausted_total",
        "endpoint" => short_label(endpoint),
        "kind" => kind.as_str()
    )
    .increment(1);
}

pub fn record_reset(scope: &'static str) {
    metrics::counter!("arbscan_resets_total", "scope" => scope).increment(1);
}
