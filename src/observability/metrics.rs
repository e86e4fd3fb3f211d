//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define health engine metrics (probe outcomes, latency, check state)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-check and aggregate health
//!
//! # Metrics
//! - `health_check_probes_total` (counter): probe invocations by check, outcome
//! - `health_check_probe_duration_seconds` (histogram): probe latency by check
//! - `health_check_state` (gauge): 1=healthy, 0=unhealthy, by check and type
//! - `health_aggregate_state` (gauge): 1=healthy, 0=unhealthy, by type
//! - `health_responder_requests_total` (counter): responder requests by status
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Labels for check name, check type, outcome, status code

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::{HealthCheckType, HealthState};

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

/// Record one probe invocation.
pub fn record_probe(check: &str, outcome: &'static str, duration: Duration) {
    counter!(
        "health_check_probes_total",
        "check" => check.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("health_check_probe_duration_seconds", "check" => check.to_string())
        .record(duration.as_secs_f64());
}

/// Record the current health of a check.
pub fn record_check_state(check: &str, check_type: HealthCheckType, health: HealthState) {
    gauge!(
        "health_check_state",
        "check" => check.to_string(),
        "type" => check_type.to_string()
    )
    .set(health_value(health));
}

/// Record an aggregate evaluation and the responder status code it produced.
pub fn record_response(check_type: HealthCheckType, health: HealthState, status: u16) {
    gauge!("health_aggregate_state", "type" => check_type.to_string()).set(health_value(health));
    record_request_status(status);
}

/// Record a responder answer that carried no aggregate (bad query, unknown name).
pub fn record_request_status(status: u16) {
    counter!("health_responder_requests_total", "status" => status.to_string()).increment(1);
}

fn health_value(health: HealthState) -> f64 {
    if health.is_healthy() {
        1.0
    } else {
        0.0
    }
}
