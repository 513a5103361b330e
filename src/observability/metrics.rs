//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define router metrics (selections, breaker transitions, probes, connections)
//! - Expose Prometheus-compatible metrics endpoint
//! - Track per-instance and aggregate metrics
//!
//! # Metrics
//! - `router_selections_total` (counter): selection attempts by outcome
//! - `router_breaker_transitions_total` (counter): breaker transitions by target state
//! - `router_instance_health` (gauge): 1=healthy, 0=not healthy
//! - `router_probe_duration_seconds` (histogram): probe latency
//! - `router_active_connections` (gauge): in-flight connections per instance
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; with no recorder installed
//!   (tests, embedding without `init_metrics`) every call is a no-op

use std::net::SocketAddr;
use std::time::Duration;
use metrics_exporter_prometheus::PrometheusBuilder;
use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of one `get_available_instance` call.
pub fn record_selection(found: bool) {
    let outcome = if found { "selected" } else { "no_instance" };
    metrics::counter!("router_selections_total", "outcome" => outcome).increment(1);
}

pub fn record_breaker_transition(instance: &str, to: CircuitState) {
    metrics::counter!(
        "router_breaker_transitions_total",
        "instance" => instance.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_instance_health(instance: &str, healthy: bool) {
    metrics::gauge!("router_instance_health", "instance" => instance.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_probe(instance: &str, elapsed: Duration) {
    metrics::histogram!("router_probe_duration_seconds", "instance" => instance.to_string())
        .record(elapsed.as_secs_f64());
}

pub fn record_connections(instance: &str, connections: u64) {
    metrics::gauge!("router_active_connections", "instance" => instance.to_string())
        .set(connections as f64);
}
