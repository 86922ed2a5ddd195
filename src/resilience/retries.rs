//! Retry policy.
//!
//! # Responsibilities
//! - Classify an attempt result as success, retryable or terminal
//! - Bound the number of attempts per logical call
//! - Supply the backoff schedule between attempts
//!
//! # Design Decisions
//! - Transport failures, timeouts and rate-limit rejections retry by default
//! - Application errors and open circuits end the chain unless configured
//! - Immutable once built; reloads swap in a whole new policy

use std::collections::HashSet;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::resilience::backoff::BackoffPolicy;
use crate::resilience::outcome::{CallError, FailureKind, Outcome};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: BackoffPolicy,
    pub retry_on: HashSet<FailureKind>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: BackoffPolicy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
            retry_on: [
                FailureKind::Transport,
                FailureKind::Timeout,
                FailureKind::RateLimited,
            ]
            .into_iter()
            .collect(),
        }
    }

    pub fn retry_on(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        self.retry_on.contains(&kind)
    }

    pub fn classify(&self, result: Result<String, CallError>) -> Outcome {
        match result {
            Ok(body) => Outcome::Success(body),
            Err(e) if self.is_retryable(e.kind()) => Outcome::Retryable(e),
            Err(e) => Outcome::NonRetryable(e),
        }
    }

    /// Delay before attempt `attempt + 1`, or `None` when attempts are exhausted.
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (attempt + 1 < self.max_attempts).then(|| self.backoff.delay(attempt))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts, BackoffPolicy::from(config))
            .retry_on(config.retry_on.iter().copied())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from(&RetryConfig::default())
    }
}
