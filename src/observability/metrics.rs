//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, rejections, cache, retries)
//! - Expose a Prometheus-compatible scrape endpoint
//! - Track per-backend health
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by outcome and status
//! - `gateway_request_duration_seconds` (histogram): pipeline latency
//! - `gateway_rate_limited_total` (counter): admissions denied
//! - `gateway_circuit_rejections_total` (counter): circuit fast-fails
//! - `gateway_cache_lookups_total` (counter): lookups by result (hit/miss)
//! - `gateway_retries_total` (counter): attempts beyond the first
//! - `gateway_backend_health` (gauge): 1=healthy, 0=unhealthy
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels stay low-cardinality: outcome, status, backend

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request.
pub fn record_request(outcome: &'static str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "outcome" => outcome,
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

pub fn record_circuit_rejection() {
    counter!("gateway_circuit_rejections_total").increment(1);
}

pub fn record_cache(hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    counter!("gateway_cache_lookups_total", "result" => result).increment(1);
}

pub fn record_retry() {
    counter!("gateway_retries_total").increment(1);
}

pub fn record_backend_health(backend: &str, healthy: bool) {
    gauge!("gateway_backend_health", "backend" => backend.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
