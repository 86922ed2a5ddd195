//! Metrics collection and exposition.
//!
//! # Metrics
//! - `caller_attempts_total` (counter): attempts by dependency, outcome
//! - `caller_calls_total` (counter): logical calls by dependency, source
//! - `caller_call_duration_seconds` (histogram): logical call latency
//! - `caller_rate_limited_total` (counter): rejected permit requests
//! - `caller_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//!
//! All recording goes through the `metrics` facade and is a no-op until
//! [`init_metrics`] installs the Prometheus exporter.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Duration;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::outcome::FailureKind;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_attempt(dependency: &str, failure: Option<FailureKind>) {
    let outcome = failure.map_or("success", |kind| kind.as_str());
    counter!(
        "caller_attempts_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome,
    )
    .increment(1);
}

pub fn record_call(dependency: &str, source: &'static str, elapsed: Duration) {
    counter!(
        "caller_calls_total",
        "dependency" => dependency.to_string(),
        "source" => source,
    )
    .increment(1);
    histogram!(
        "caller_call_duration_seconds",
        "dependency" => dependency.to_string(),
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_rate_limited(dependency: &str) {
    counter!("caller_rate_limited_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_circuit_state(dependency: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("caller_circuit_state", "dependency" => dependency.to_string()).set(value);
}
