//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (requests, latency, passthrough, sessions)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `router_requests_total` (counter): dispatched requests by method, status
//! - `router_request_duration_seconds` (histogram): dispatch latency
//! - `router_intercepts_total` (counter): gateway/tab calls by outcome
//! - `router_passthrough_total` (counter): calls left to the network
//! - `router_sweep_reaped_total` (counter): tabs removed by liveness sweeps
//! - `router_registered_clients` (gauge): tabs bound to a consumer
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels stay low-cardinality: no paths or ids

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record one dispatched request.
pub fn record_dispatch(method: &str, status: u16, start: Instant) {
    let labels = [
        ("method", method.to_string()),
        ("status", status.to_string()),
    ];
    counter!("router_requests_total", &labels).increment(1);
    histogram!("router_request_duration_seconds", &labels).record(start.elapsed().as_secs_f64());
}

/// Record what the interception point did with a call.
pub fn record_intercept(outcome: &'static str) {
    counter!("router_intercepts_total", "outcome" => outcome).increment(1);
    if outcome == "passthrough" {
        counter!("router_passthrough_total").increment(1);
    }
}

pub fn record_sweep(reaped: usize) {
    counter!("router_sweep_reaped_total").increment(reaped as u64);
}

pub fn set_registered_clients(count: usize) {
    gauge!("router_registered_clients").set(count as f64);
}
