//! Circuit breaker for downstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: downstream assumed down, calls fail fast
//! - Half-Open: a bounded number of trial calls test for recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: window holds >= minimum_calls samples and the
//!                failure rate or slow-call rate meets its threshold
//! Open → Half-Open: wait_duration_in_open elapsed (checked at admission)
//! Half-Open → Closed: every trial call succeeded (window cleared)
//! Half-Open → Open: any trial call failed (wait timer restarts)
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker, owned by the registry (not global)
//! - Fail fast in Open state (no network I/O, no waiting)
//! - Every admission carries the epoch it was granted in; outcomes from an
//!   earlier epoch are dropped, so a success that lands after a failing
//!   trial reopened the circuit changes nothing
//! - A permit dropped without an outcome (caller cancelled mid-call) hands
//!   its half-open trial slot back

use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::resilience::clock::Clock;

/// Breaker mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dispatched call ended, from the breaker's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallResult {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sample {
    Success,
    SlowSuccess,
    Failure,
}

/// Proof of admission. Hand it back through [`CircuitBreaker::record`].
#[must_use]
#[derive(Debug)]
pub struct CallPermit {
    epoch: u64,
    /// Set while the permit still owes the breaker an outcome.
    breaker: Weak<Mutex<Inner>>,
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        let Some(inner) = self.breaker.upgrade() else {
            return;
        };
        let mut inner = inner.lock().unwrap_or_else(|e| e.into_inner());
        if inner.epoch == self.epoch && inner.state == CircuitState::HalfOpen {
            inner.trials_admitted = inner.trials_admitted.saturating_sub(1);
        }
    }
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected {
    /// Time left until trial calls are admitted again.
    pub retry_after: Duration,
}

/// Point-in-time view of a breaker.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub successes: usize,
    pub slow_calls: usize,
    pub failures: usize,
    /// Percentage, or `None` until `minimum_calls` samples are recorded.
    pub failure_rate: Option<f64>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    epoch: u64,
    window: VecDeque<Sample>,
    opened_at: Option<Instant>,
    trials_admitted: u32,
    trial_successes: u32,
}

impl Inner {
    fn counts(&self) -> (usize, usize, usize) {
        self.window.iter().fold((0, 0, 0), |(ok, slow, failed), s| match s {
            Sample::Success => (ok + 1, slow, failed),
            Sample::SlowSuccess => (ok, slow + 1, failed),
            Sample::Failure => (ok, slow, failed + 1),
        })
    }
}

/// Circuit breaker for one dependency.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    inner: Arc<Mutex<Inner>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: CircuitState::Closed,
                epoch: 0,
                window: VecDeque::with_capacity(config.sliding_window_size),
                opened_at: None,
                trials_admitted: 0,
                trial_successes: 0,
            })),
            config,
            clock,
        }
    }

    /// Current state, applying a due Open → Half-Open transition.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);
        inner.state
    }

    /// Decide whether a call may be dispatched.
    pub fn try_acquire(&self) -> Result<CallPermit, Rejected> {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(self.permit(&inner)),
            CircuitState::HalfOpen => {
                if inner.trials_admitted < self.config.permitted_calls_in_half_open {
                    inner.trials_admitted += 1;
                    Ok(self.permit(&inner))
                } else {
                    Err(Rejected {
                        retry_after: Duration::ZERO,
                    })
                }
            }
            CircuitState::Open => Err(Rejected {
                retry_after: self.remaining_wait(&inner),
            }),
        }
    }

    /// Record the outcome of an admitted call that took `elapsed`.
    pub fn record(&self, mut permit: CallPermit, result: CallResult, elapsed: Duration) {
        permit.breaker = Weak::new();
        let mut inner = self.lock();

        if permit.epoch != inner.epoch {
            tracing::debug!(
                dependency = %self.name,
                state = %inner.state,
                "Discarding outcome admitted before the last transition"
            );
            return;
        }

        let sample = match result {
            CallResult::Failure => Sample::Failure,
            CallResult::Success if elapsed >= self.config.slow_call_duration() => Sample::SlowSuccess,
            CallResult::Success => Sample::Success,
        };

        match inner.state {
            CircuitState::Closed => {
                if inner.window.len() == self.config.sliding_window_size {
                    inner.window.pop_front();
                }
                inner.window.push_back(sample);

                if self.threshold_exceeded(&inner) {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                if sample == Sample::Failure {
                    self.transition(&mut inner, CircuitState::Open);
                } else {
                    inner.trial_successes += 1;
                    if inner.trial_successes >= self.config.permitted_calls_in_half_open {
                        self.transition(&mut inner, CircuitState::Closed);
                    }
                }
            }
            // The epoch moves on every transition, so an open breaker never
            // sees a current permit.
            CircuitState::Open => {}
        }
    }

    /// Administrative reset back to Closed with an empty window.
    pub fn reset(&self) {
        let mut inner = self.lock();
        tracing::info!(dependency = %self.name, from = %inner.state, "Circuit breaker reset");
        self.transition(&mut inner, CircuitState::Closed);
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let mut inner = self.lock();
        self.maybe_half_open(&mut inner);
        let (successes, slow_calls, failures) = inner.counts();
        CircuitSnapshot {
            state: inner.state,
            successes,
            slow_calls,
            failures,
            failure_rate: self.failure_rate(&inner),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn permit(&self, inner: &Inner) -> CallPermit {
        CallPermit {
            epoch: inner.epoch,
            breaker: Arc::downgrade(&self.inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn minimum_calls(&self) -> usize {
        self.config.minimum_calls.min(self.config.sliding_window_size)
    }

    fn failure_rate(&self, inner: &Inner) -> Option<f64> {
        let total = inner.window.len();
        if total < self.minimum_calls() || total == 0 {
            return None;
        }
        let (_, slow, failed) = inner.counts();
        Some((slow + failed) as f64 * 100.0 / total as f64)
    }

    fn threshold_exceeded(&self, inner: &Inner) -> bool {
        let Some(failure_rate) = self.failure_rate(inner) else {
            return false;
        };
        let (_, slow, _) = inner.counts();
        let slow_rate = slow as f64 * 100.0 / inner.window.len() as f64;

        failure_rate >= self.config.failure_rate_threshold
            || slow_rate >= self.config.slow_call_rate_threshold
    }

    fn remaining_wait(&self, inner: &Inner) -> Duration {
        let Some(opened_at) = inner.opened_at else {
            return Duration::ZERO;
        };
        let elapsed = self.clock.now().saturating_duration_since(opened_at);
        self.config.wait_duration_in_open().saturating_sub(elapsed)
    }

    fn maybe_half_open(&self, inner: &mut Inner) {
        if inner.state == CircuitState::Open && self.remaining_wait(inner).is_zero() {
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        inner.epoch += 1;
        inner.trials_admitted = 0;
        inner.trial_successes = 0;

        match to {
            CircuitState::Open => inner.opened_at = Some(self.clock.now()),
            CircuitState::Closed => {
                inner.opened_at = None;
                inner.window.clear();
            }
            CircuitState::HalfOpen => {}
        }

        if from != to {
            tracing::warn!(dependency = %self.name, %from, %to, "Circuit breaker transition");
            crate::observability::metrics::record_circuit_state(&self.name, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    const FAST: Duration = Duration::from_millis(5);

    fn breaker(clock: Arc<ManualClock>) -> CircuitBreaker {
        CircuitBreaker::new(
            "downstream",
            CircuitBreakerConfig {
                sliding_window_size: 4,
                minimum_calls: 4,
                failure_rate_threshold: 50.0,
                slow_call_rate_threshold: 100.0,
                slow_call_duration_ms: 1000,
                wait_duration_in_open_ms: 5000,
                permitted_calls_in_half_open: 2,
            },
            clock,
        )
    }

    fn call(cb: &CircuitBreaker, result: CallResult) {
        let permit = cb.try_acquire().expect("admitted");
        cb.record(permit, result, FAST);
    }

    fn open(cb: &CircuitBreaker) {
        for _ in 0..4 {
            call(cb, CallResult::Failure);
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_starts_closed() {
        let cb = breaker(Arc::new(ManualClock::new()));
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.snapshot().failure_rate.is_none());
    }

    #[test]
    fn test_minimum_calls_gate_evaluation() {
        let cb = breaker(Arc::new(ManualClock::new()));
        for _ in 0..3 {
            call(&cb, CallResult::Failure);
        }
        // 100% failures, but only 3 of 4 required samples.
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_opens_at_threshold_and_rejects_next_admission() {
        let cb = breaker(Arc::new(ManualClock::new()));
        call(&cb, CallResult::Success);
        call(&cb, CallResult::Failure);
        call(&cb, CallResult::Success);
        call(&cb, CallResult::Failure);

        // 2 of 4 failed: exactly 50%.
        let rejected = cb.try_acquire().unwrap_err();
        assert_eq!(rejected.retry_after, Duration::from_millis(5000));
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_below_threshold_stays_closed_as_window_rolls() {
        let cb = breaker(Arc::new(ManualClock::new()));
        for result in [
            CallResult::Failure,
            CallResult::Success,
            CallResult::Success,
            CallResult::Success,
            CallResult::Success,
        ] {
            call(&cb, result);
        }
        let snapshot = cb.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.failures, 0, "oldest sample rolled out");
        assert_eq!(snapshot.successes, 4);
    }

    #[test]
    fn test_slow_calls_count_towards_failure_rate() {
        let cb = breaker(Arc::new(ManualClock::new()));
        for _ in 0..2 {
            call(&cb, CallResult::Success);
        }
        for _ in 0..2 {
            let permit = cb.try_acquire().unwrap();
            cb.record(permit, CallResult::Success, Duration::from_secs(2));
        }
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_after_wait_then_closes() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(clock.clone());
        open(&cb);

        clock.advance(Duration::from_millis(4999));
        assert!(cb.try_acquire().is_err());

        clock.advance(Duration::from_millis(1));
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        let a = cb.try_acquire().unwrap();
        let b = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_err(), "trial quota exhausted");

        cb.record(a, CallResult::Success, FAST);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record(b, CallResult::Success, FAST);
        assert_eq!(cb.state(), CircuitState::Closed);

        let snapshot = cb.snapshot();
        assert_eq!(snapshot.successes + snapshot.failures + snapshot.slow_calls, 0);
    }

    #[test]
    fn test_single_failing_trial_reopens_and_discards_concurrent_success() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(clock.clone());
        open(&cb);
        clock.advance(Duration::from_secs(5));

        let failing = cb.try_acquire().unwrap();
        let succeeding = cb.try_acquire().unwrap();

        cb.record(failing, CallResult::Failure, FAST);
        assert_eq!(cb.state(), CircuitState::Open);

        cb.record(succeeding, CallResult::Success, FAST);
        assert_eq!(cb.state(), CircuitState::Open);

        // Wait timer restarted at the reopen.
        assert_eq!(cb.try_acquire().unwrap_err().retry_after, Duration::from_secs(5));
    }

    #[test]
    fn test_dropped_trial_permit_frees_its_slot() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(clock.clone());
        open(&cb);
        clock.advance(Duration::from_secs(5));

        let a = cb.try_acquire().unwrap();
        let b = cb.try_acquire().unwrap();
        assert!(cb.try_acquire().is_err());

        // Caller went away before the outcome was known.
        drop(b);
        let c = cb.try_acquire().unwrap();

        cb.record(a, CallResult::Success, FAST);
        cb.record(c, CallResult::Success, FAST);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_recorded_permit_does_not_free_a_second_slot() {
        let clock = Arc::new(ManualClock::new());
        let cb = breaker(clock.clone());
        open(&cb);
        clock.advance(Duration::from_secs(5));

        let a = cb.try_acquire().unwrap();
        let _b = cb.try_acquire().unwrap();
        cb.record(a, CallResult::Success, FAST);

        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_err(), "quota still held by the pending trial");
    }

    #[test]
    fn test_reset_closes_and_clears_window() {
        let cb = breaker(Arc::new(ManualClock::new()));
        open(&cb);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.snapshot().failures, 0);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn test_concurrent_failures_are_not_lost() {
        let cb = Arc::new(CircuitBreaker::new(
            "downstream",
            CircuitBreakerConfig {
                sliding_window_size: 1000,
                minimum_calls: 1000,
                ..Default::default()
            },
            Arc::new(ManualClock::new()),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = cb.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let permit = cb.try_acquire().unwrap();
                        cb.record(permit, CallResult::Failure, FAST);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cb.snapshot().failures, 800);
        assert_eq!(cb.state(), CircuitState::Closed);
    }
}
