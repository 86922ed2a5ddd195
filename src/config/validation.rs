//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate the downstream base URL
//! - Validate value ranges (thresholds, capacities, attempts)
//! - Keep the request timeout above the longest possible protected call, so
//!   the fallback is always answered before the timeout layer cuts in
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: CallerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::config::schema::CallerConfig;
use crate::resilience::backoff::BackoffPolicy;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

fn is_percentage(value: f64) -> bool {
    value > 0.0 && value <= 100.0
}

/// Longest a protected call can take: every attempt waits out the permit
/// timeout and its deadline, and every backoff draws the full jitter.
pub fn worst_case_call_duration(config: &CallerConfig) -> Duration {
    let backoff = BackoffPolicy::from(&config.retries);
    let attempts = config.retries.max_attempts;
    let jitter = if backoff.jitter.is_finite() { backoff.jitter } else { 0.0 };

    let per_attempt = config
        .timeouts
        .attempt()
        .saturating_add(config.rate_limit.acquire_timeout());
    let backoffs = (0..attempts.saturating_sub(1))
        .map(|i| backoff.base_delay(i).mul_f64(1.0 + jitter))
        .fold(Duration::ZERO, Duration::saturating_add);

    per_attempt.saturating_mul(attempts).saturating_add(backoffs)
}

/// Validate a parsed configuration.
pub fn validate_config(config: &CallerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.service.name.is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    let downstream = &config.downstream;
    if downstream.name.is_empty() {
        errors.push(ValidationError::new("downstream.name", "must not be empty"));
    }
    match Url::parse(&downstream.base_url) {
        Ok(url) if matches!(url.scheme(), "http") && url.host().is_some() => {}
        Ok(url) => errors.push(ValidationError::new(
            "downstream.base_url",
            format!("unsupported url '{}' (plain http with a host required)", url),
        )),
        Err(e) => errors.push(ValidationError::new(
            "downstream.base_url",
            format!("'{}': {}", downstream.base_url, e),
        )),
    }
    if !downstream.path.starts_with('/') {
        errors.push(ValidationError::new("downstream.path", "must start with '/'"));
    }

    if config.timeouts.attempt_ms == 0 {
        errors.push(ValidationError::new("timeouts.attempt_ms", "must be > 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    } else {
        let worst_case = worst_case_call_duration(config);
        if worst_case > Duration::from_secs(config.timeouts.request_secs) {
            errors.push(ValidationError::new(
                "timeouts.request_secs",
                format!(
                    "must cover the longest protected call ({}ms with current timeouts and retries)",
                    worst_case.as_millis()
                ),
            ));
        }
    }

    let rl = &config.rate_limit;
    if rl.capacity == 0 {
        errors.push(ValidationError::new("rate_limit.capacity", "must be > 0"));
    }
    if rl.refill_amount == 0 {
        errors.push(ValidationError::new("rate_limit.refill_amount", "must be > 0"));
    }
    if rl.refresh_period_ms == 0 {
        errors.push(ValidationError::new("rate_limit.refresh_period_ms", "must be > 0"));
    }

    let cb = &config.circuit_breaker;
    if cb.sliding_window_size == 0 {
        errors.push(ValidationError::new("circuit_breaker.sliding_window_size", "must be > 0"));
    }
    if cb.minimum_calls == 0 {
        errors.push(ValidationError::new("circuit_breaker.minimum_calls", "must be > 0"));
    }
    if !is_percentage(cb.failure_rate_threshold) {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_rate_threshold",
            "must be in (0, 100]",
        ));
    }
    if !is_percentage(cb.slow_call_rate_threshold) {
        errors.push(ValidationError::new(
            "circuit_breaker.slow_call_rate_threshold",
            "must be in (0, 100]",
        ));
    }
    if cb.permitted_calls_in_half_open == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.permitted_calls_in_half_open",
            "must be > 0",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be >= 1"));
    }
    if !(retries.multiplier >= 1.0) {
        errors.push(ValidationError::new("retries.multiplier", "must be >= 1.0"));
    }
    if !(0.0..=1.0).contains(&retries.jitter) {
        errors.push(ValidationError::new("retries.jitter", "must be in [0, 1]"));
    }
    if retries.max_delay_ms < retries.base_delay_ms {
        errors.push(ValidationError::new(
            "retries.max_delay_ms",
            "must not be below base_delay_ms",
        ));
    }

    if config.admin.enabled && config.admin.api_key.is_empty() {
        errors.push(ValidationError::new("admin.api_key", "required when admin is enabled"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
