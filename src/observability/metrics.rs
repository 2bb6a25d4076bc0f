//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, breaker state, backend health)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, service
//! - `gateway_request_duration_seconds` (histogram): latency distribution
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_circuit_transitions_total` (counter): transitions by target state
//! - `gateway_circuit_rejections_total` (counter): calls rejected while open
//! - `gateway_circuit_failure_rate_percent` (gauge): from the periodic report
//! - `gateway_backend_up` (gauge): 1=probe succeeded, 0=failed
//! - `gateway_rate_limited_total` (counter): requests rejected by the rate limiter
//!
//! # Design Decisions
//! - Low-overhead metric updates (atomic operations)
//! - Labels for backend/service, method, status code
//! - Histogram buckets tuned for typical web latencies

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder};

use crate::resilience::circuit_breaker::{BreakerReport, CircuitState};

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full("gateway_request_duration_seconds".to_string()),
            LATENCY_BUCKETS,
        )?
        .install()?;

    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, service: &str, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "service" => service.to_string()
    )
    .increment(1);
    metrics::histogram!(
        "gateway_request_duration_seconds",
        "service" => service.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

fn state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}

pub fn record_breaker_transition(backend: &str, state: CircuitState) {
    metrics::counter!(
        "gateway_circuit_transitions_total",
        "backend" => backend.to_string(),
        "state" => state.as_str()
    )
    .increment(1);
    metrics::gauge!("gateway_circuit_state", "backend" => backend.to_string())
        .set(state_value(state));
}

pub fn record_breaker_rejection(backend: &str) {
    metrics::counter!(
        "gateway_circuit_rejections_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

pub fn record_breaker_report(report: &BreakerReport) {
    metrics::gauge!("gateway_circuit_state", "backend" => report.backend.clone())
        .set(state_value(report.state));
    metrics::gauge!(
        "gateway_circuit_failure_rate_percent",
        "backend" => report.backend.clone()
    )
    .set(report.failure_rate_percent);
}

pub fn record_backend_health(service: &str, up: bool) {
    metrics::gauge!("gateway_backend_up", "service" => service.to_string())
        .set(if up { 1.0 } else { 0.0 });
}

pub fn record_rate_limited() {
    metrics::counter!("gateway_rate_limited_total").increment(1);
}
