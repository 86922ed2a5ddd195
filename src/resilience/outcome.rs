//! Attempt outcomes and the failure taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Category of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Connection refused/reset or the body could not be read.
    Transport,
    /// The per-attempt deadline elapsed.
    Timeout,
    /// No rate-limit permit was granted.
    RateLimited,
    /// The circuit breaker rejected the attempt.
    CircuitOpen,
    /// The downstream answered with a non-success status.
    Application,
}

impl FailureKind {
    /// Label used in logs, metrics and fallback messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport_failure",
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::CircuitOpen => "circuit_open",
            FailureKind::Application => "application_error",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a single attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("deadline of {0:?} exceeded")]
    Timeout(Duration),

    #[error("rate limit permit not granted for '{dependency}'")]
    RateLimited { dependency: String },

    #[error("circuit breaker for '{dependency}' is open")]
    CircuitOpen { dependency: String },

    #[error("downstream responded with status {status}")]
    Application { status: u16, body: String },
}

impl CallError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CallError::Transport(_) => FailureKind::Transport,
            CallError::Timeout(_) => FailureKind::Timeout,
            CallError::RateLimited { .. } => FailureKind::RateLimited,
            CallError::CircuitOpen { .. } => FailureKind::CircuitOpen,
            CallError::Application { .. } => FailureKind::Application,
        }
    }
}

/// Classified result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success(String),
    Retryable(CallError),
    NonRetryable(CallError),
}

impl Outcome {
    pub fn failure(&self) -> Option<&CallError> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Retryable(e) | Outcome::NonRetryable(e) => Some(e),
        }
    }
}

/// One dispatch of the outbound request, as seen by the coordinator.
#[derive(Debug, Clone)]
pub struct CallAttempt {
    /// 0-based attempt index.
    pub index: u32,
    pub started_at: Instant,
    /// `None` when the attempt was rejected before dispatch.
    pub deadline: Option<Instant>,
    /// `None` on success.
    pub failure: Option<FailureKind>,
}

impl CallAttempt {
    /// True when the attempt went out over the network.
    pub fn dispatched(&self) -> bool {
        self.deadline.is_some()
    }
}
