//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, security, deploys)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, status
//! - `gateway_request_duration_seconds` (histogram): latency per service
//! - `gateway_security_decisions_total` (counter): evaluator outcomes
//! - `gateway_interceptor_failures_total` (counter): by interceptor, point
//! - `gateway_deployments_total` (counter): deploy/undeploy outcomes
//! - `gateway_bound_paths` (gauge): current number of path bindings
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   embedders pay nothing
//! - Labels are low-cardinality names, never request paths

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its scrape listener.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(service: &str, status: u16, elapsed: Duration) {
    counter!(
        "gateway_requests_total",
        "service" => service.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_security_decision(outcome: &'static str) {
    counter!("gateway_security_decisions_total", "outcome" => outcome).increment(1);
}

pub fn record_interceptor_failure(interceptor: &str, point: &'static str) {
    counter!(
        "gateway_interceptor_failures_total",
        "interceptor" => interceptor.to_string(),
        "point" => point
    )
    .increment(1);
}

pub fn record_deployment(outcome: &'static str) {
    counter!("gateway_deployments_total", "outcome" => outcome).increment(1);
}

pub fn record_bound_paths(count: usize) {
    gauge!("gateway_bound_paths").set(count as f64);
}
