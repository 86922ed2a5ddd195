//! Retry coordination around a single protected call.
//!
//! # Data Flow
//! ```text
//! attempt i:
//!     → rate limiter permit      (rejected: RateLimited)
//!     → circuit breaker admission (rejected: CircuitOpen)
//!     → with_deadline(executor.call())
//!     → outcome recorded in the breaker window
//!     → classify: success | retryable | terminal
//!         retryable and attempts left → backoff sleep → attempt i+1
//!         otherwise → fallback
//! ```
//!
//! Admission checks always precede dispatch; backoff only ever runs between
//! attempts. Nothing in here returns an error to the caller.

use std::sync::Arc;
use std::time::Duration;

use crate::config::CallerConfig;
use crate::observability::metrics;
use crate::resilience::circuit_breaker::CallResult;
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::executor::RpcExecutor;
use crate::resilience::fallback::FallbackResolver;
use crate::resilience::outcome::{CallAttempt, CallError, FailureKind, Outcome};
use crate::resilience::registry::Dependency;
use crate::resilience::retries::RetryPolicy;
use crate::resilience::timeouts::with_deadline;

/// Everything that governs one logical call. Swappable on config reload.
#[derive(Debug, Clone, PartialEq)]
pub struct CallPolicy {
    pub retry: RetryPolicy,
    /// Deadline applied to each attempt separately.
    pub attempt_timeout: Duration,
}

impl CallPolicy {
    pub fn from_config(config: &CallerConfig) -> Self {
        Self {
            retry: RetryPolicy::from(&config.retries),
            attempt_timeout: config.timeouts.attempt(),
        }
    }
}

/// Where the final response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Downstream,
    /// Fallback, tagged with the category of the terminal failure.
    Fallback(FailureKind),
}

impl ResponseSource {
    fn label(&self) -> &'static str {
        match self {
            ResponseSource::Downstream => "downstream",
            ResponseSource::Fallback(_) => "fallback",
        }
    }
}

/// Final result of a logical call. Always carries a body.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub body: String,
    pub source: ResponseSource,
    pub attempts: Vec<CallAttempt>,
}

impl Resolution {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, ResponseSource::Fallback(_))
    }

    /// Attempts that actually reached the network.
    pub fn dispatched(&self) -> usize {
        self.attempts.iter().filter(|a| a.dispatched()).count()
    }
}

pub struct RetryCoordinator {
    clock: Arc<dyn Clock>,
    fallback: FallbackResolver,
}

impl RetryCoordinator {
    pub fn new(fallback: FallbackResolver) -> Self {
        Self::with_clock(fallback, Arc::new(TokioClock))
    }

    pub fn with_clock(fallback: FallbackResolver, clock: Arc<dyn Clock>) -> Self {
        Self { clock, fallback }
    }

    /// Run one logical call against `dependency` through `executor`.
    pub async fn execute<E: RpcExecutor>(
        &self,
        dependency: &Dependency,
        executor: &E,
        policy: &CallPolicy,
    ) -> Resolution {
        let call_start = self.clock.now();
        let mut attempts = Vec::with_capacity(policy.retry.max_attempts as usize);
        let mut index = 0;

        let terminal = loop {
            let (result, mut attempt) = self.attempt(dependency, executor, policy, index).await;
            let outcome = policy.retry.classify(result);
            attempt.failure = outcome.failure().map(CallError::kind);
            metrics::record_attempt(&dependency.name, attempt.failure);
            attempts.push(attempt);

            match outcome {
                Outcome::Success(body) => {
                    metrics::record_call(
                        &dependency.name,
                        ResponseSource::Downstream.label(),
                        self.clock.now().saturating_duration_since(call_start),
                    );
                    return Resolution {
                        body,
                        source: ResponseSource::Downstream,
                        attempts,
                    };
                }
                Outcome::NonRetryable(error) => break error,
                Outcome::Retryable(error) => match policy.retry.next_delay(index) {
                    Some(delay) => {
                        tracing::warn!(
                            dependency = %dependency.name,
                            error = %error,
                            delay = ?delay,
                            "Retrying call to {}. Attempt #{}",
                            dependency.name,
                            index + 2,
                        );
                        tokio::time::sleep(delay).await;
                        index += 1;
                    }
                    None => break error,
                },
            }
        };

        let kind = terminal.kind();
        tracing::warn!(
            dependency = %dependency.name,
            attempts = attempts.len(),
            error = %terminal,
            "Final fallback executed"
        );
        let source = ResponseSource::Fallback(kind);
        metrics::record_call(
            &dependency.name,
            source.label(),
            self.clock.now().saturating_duration_since(call_start),
        );

        Resolution {
            body: self.fallback.resolve(&terminal),
            source,
            attempts,
        }
    }

    async fn attempt<E: RpcExecutor>(
        &self,
        dependency: &Dependency,
        executor: &E,
        policy: &CallPolicy,
        index: u32,
    ) -> (Result<String, CallError>, CallAttempt) {
        let mut attempt = CallAttempt {
            index,
            started_at: self.clock.now(),
            deadline: None,
            failure: None,
        };

        if !dependency.rate_limiter.acquire().await.is_granted() {
            metrics::record_rate_limited(&dependency.name);
            let error = CallError::RateLimited {
                dependency: dependency.name.clone(),
            };
            return (Err(error), attempt);
        }

        let permit = match dependency.circuit_breaker.try_acquire() {
            Ok(permit) => permit,
            Err(rejected) => {
                tracing::debug!(
                    dependency = %dependency.name,
                    retry_after = ?rejected.retry_after,
                    "Circuit breaker rejected attempt"
                );
                let error = CallError::CircuitOpen {
                    dependency: dependency.name.clone(),
                };
                return (Err(error), attempt);
            }
        };

        let dispatched_at = self.clock.now();
        attempt.deadline = Some(dispatched_at + policy.attempt_timeout);
        tracing::info!(dependency = %dependency.name, attempt = index, "Calling dependency");

        let result = with_deadline(policy.attempt_timeout, executor.call()).await;
        if let Err(e) = &result {
            tracing::error!(dependency = %dependency.name, attempt = index, error = %e, "Dependency call failed");
        }

        let elapsed = self.clock.now().saturating_duration_since(dispatched_at);
        let call_result = if result.is_ok() {
            CallResult::Success
        } else {
            CallResult::Failure
        };
        dependency.circuit_breaker.record(permit, call_result, elapsed);

        (result, attempt)
    }
}
