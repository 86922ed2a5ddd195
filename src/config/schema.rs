//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the caller.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::resilience::outcome::FailureKind;

/// Root configuration for the guarded caller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CallerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Identity and greeting of this service.
    pub service: ServiceConfig,

    /// The downstream dependency protected by the resilience pipeline.
    pub downstream: DownstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration for the downstream.
    pub rate_limit: RateLimitConfig,

    /// Circuit breaker configuration for the downstream.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Service identity. Routes are mounted under `/{name}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub greeting: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "service-a".to_string(),
            greeting: "Hello from Service A!".to_string(),
        }
    }
}

/// Downstream dependency definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DownstreamConfig {
    /// Dependency name; keys the breaker and limiter registry.
    pub name: String,

    /// Base URL (e.g., "http://127.0.0.1:8081"). Overridden by `DOWNSTREAM_URL`.
    pub base_url: String,

    /// Path of the protected endpoint.
    pub path: String,
}

impl Default for DownstreamConfig {
    fn default() -> Self {
        Self {
            name: "service-b".to_string(),
            base_url: "http://127.0.0.1:8081".to_string(),
            path: "/service-b/hello".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request timeout (total time for the handler) in seconds.
    pub request_secs: u64,

    /// Deadline for a single downstream attempt in milliseconds.
    pub attempt_ms: u64,
}

impl TimeoutConfig {
    pub fn attempt(&self) -> Duration {
        Duration::from_millis(self.attempt_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            attempt_ms: 1000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum permits held by the bucket.
    pub capacity: u32,

    /// Length of one refill period in milliseconds.
    pub refresh_period_ms: u64,

    /// Permits restored at every period boundary.
    pub refill_amount: u32,

    /// How long an attempt may wait for a permit, in milliseconds. Zero rejects immediately.
    pub acquire_timeout_ms: u64,
}

impl RateLimitConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_millis(self.refresh_period_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            refresh_period_ms: 1000,
            refill_amount: 10,
            acquire_timeout_ms: 500,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Number of most recent outcomes kept in the rolling window.
    pub sliding_window_size: usize,

    /// Samples required before the failure rate is evaluated.
    pub minimum_calls: usize,

    /// Failure rate (percent) at or above which the circuit opens.
    pub failure_rate_threshold: f64,

    /// Slow-call rate (percent) at or above which the circuit opens.
    pub slow_call_rate_threshold: f64,

    /// Calls at least this long (milliseconds) count as slow.
    pub slow_call_duration_ms: u64,

    /// Time spent open before trial calls are admitted, in milliseconds.
    pub wait_duration_in_open_ms: u64,

    /// Trial calls admitted while half-open.
    pub permitted_calls_in_half_open: u32,
}

impl CircuitBreakerConfig {
    pub fn slow_call_duration(&self) -> Duration {
        Duration::from_millis(self.slow_call_duration_ms)
    }

    pub fn wait_duration_in_open(&self) -> Duration {
        Duration::from_millis(self.wait_duration_in_open_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            sliding_window_size: 10,
            minimum_calls: 5,
            failure_rate_threshold: 50.0,
            slow_call_rate_threshold: 100.0,
            slow_call_duration_ms: 2000,
            wait_duration_in_open_ms: 10_000,
            permitted_calls_in_half_open: 3,
        }
    }
}

/// Backoff flavour between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    Exponential,
    Fixed,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical call, including the first.
    pub max_attempts: u32,

    pub backoff: BackoffKind,

    /// Base delay (or the fixed delay) in milliseconds.
    pub base_delay_ms: u64,

    /// Multiplier applied per retry for exponential backoff.
    pub multiplier: f64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Extra random delay as a fraction of the computed delay (0.0 to 1.0).
    pub jitter: f64,

    /// Failure kinds that are retried.
    pub retry_on: Vec<FailureKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            base_delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 10_000,
            jitter: 0.5,
            retry_on: vec![
                FailureKind::Transport,
                FailureKind::Timeout,
                FailureKind::RateLimited,
            ],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}
