//! Permit-based rate limiting for outbound calls.
//!
//! A token bucket whose refill is aligned to fixed periods measured from the
//! limiter's creation: at every period boundary `refill_amount` permits come
//! back, clamped to `capacity`. When and how often permits were granted has no
//! effect on when they return.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::resilience::clock::Clock;

/// Result of a permit request.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permit {
    Granted,
    Rejected,
}

impl Permit {
    pub fn is_granted(self) -> bool {
        self == Permit::Granted
    }
}

struct TokenBucket {
    available: u32,
    /// Index of the refill period the bucket was last brought up to date in.
    cycle: u64,
}

/// Rate limiter for one dependency.
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    origin: Instant,
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let origin = clock.now();
        Self {
            bucket: Mutex::new(TokenBucket {
                available: config.capacity,
                cycle: 0,
            }),
            config,
            clock,
            origin,
        }
    }

    /// Request a permit, waiting up to the configured acquire timeout.
    pub async fn acquire(&self) -> Permit {
        self.try_acquire(self.config.acquire_timeout()).await
    }

    /// Request a permit, waiting up to `timeout` for a refill boundary.
    ///
    /// A zero timeout never suspends.
    pub async fn try_acquire(&self, timeout: Duration) -> Permit {
        let deadline = self.clock.now() + timeout;

        loop {
            let next_refill = {
                let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
                self.refresh(&mut bucket, self.clock.now());

                if bucket.available > 0 {
                    bucket.available -= 1;
                    return Permit::Granted;
                }
                self.boundary(bucket.cycle + 1)
            };

            if next_refill > deadline {
                return Permit::Rejected;
            }

            tracing::trace!(wait = ?next_refill.saturating_duration_since(self.clock.now()), "Waiting for rate limit refill");
            tokio::time::sleep_until(next_refill).await;
        }
    }

    /// Permits available right now.
    pub fn available_permits(&self) -> u32 {
        let mut bucket = self.bucket.lock().unwrap_or_else(|e| e.into_inner());
        self.refresh(&mut bucket, self.clock.now());
        bucket.available
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    fn refresh(&self, bucket: &mut TokenBucket, now: Instant) {
        let cycle = self.cycle_at(now);
        if cycle > bucket.cycle {
            let restored = (cycle - bucket.cycle).saturating_mul(u64::from(self.config.refill_amount));
            let refilled = u64::from(bucket.available).saturating_add(restored);
            bucket.available = refilled.min(u64::from(self.config.capacity)) as u32;
            bucket.cycle = cycle;
        }
    }

    fn cycle_at(&self, now: Instant) -> u64 {
        let period = self.config.refresh_period().as_nanos().max(1);
        (now.saturating_duration_since(self.origin).as_nanos() / period) as u64
    }

    fn boundary(&self, cycle: u64) -> Instant {
        let period = self.config.refresh_period().as_nanos().max(1);
        let offset = period.saturating_mul(u128::from(cycle)).min(u128::from(u64::MAX));
        self.origin + Duration::from_nanos(offset as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::{ManualClock, TokioClock};

    fn config(capacity: u32, refill: u32, period_ms: u64) -> RateLimitConfig {
        RateLimitConfig {
            capacity,
            refresh_period_ms: period_ms,
            refill_amount: refill,
            acquire_timeout_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_grants_up_to_capacity_within_period() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new(config(3, 3, 1000), clock.clone());

        let mut granted = 0;
        for _ in 0..10 {
            if limiter.try_acquire(Duration::ZERO).await.is_granted() {
                granted += 1;
            }
        }
        assert_eq!(granted, 3);
        assert_eq!(limiter.available_permits(), 0);
    }

    #[tokio::test]
    async fn test_refill_on_period_boundary_is_clamped() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new(config(5, 2, 1000), clock.clone());

        for _ in 0..5 {
            assert!(limiter.try_acquire(Duration::ZERO).await.is_granted());
        }

        clock.advance(Duration::from_millis(999));
        assert_eq!(limiter.available_permits(), 0);

        clock.advance(Duration::from_millis(1));
        assert_eq!(limiter.available_permits(), 2);

        // Ten idle periods never push past capacity.
        clock.advance(Duration::from_secs(10));
        assert_eq!(limiter.available_permits(), 5);
    }

    #[tokio::test]
    async fn test_refill_is_independent_of_grant_timing() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new(config(1, 1, 1000), clock.clone());

        clock.advance(Duration::from_millis(900));
        assert!(limiter.try_acquire(Duration::ZERO).await.is_granted());

        // Boundary is at 1000ms from creation, not 1000ms after the grant.
        clock.advance(Duration::from_millis(100));
        assert!(limiter.try_acquire(Duration::ZERO).await.is_granted());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_refill_within_timeout() {
        let limiter = RateLimiter::new(config(1, 1, 100), Arc::new(TokioClock));
        assert!(limiter.try_acquire(Duration::ZERO).await.is_granted());

        let start = Instant::now();
        assert_eq!(limiter.try_acquire(Duration::from_millis(150)).await, Permit::Granted);
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejects_when_refill_is_beyond_timeout() {
        let limiter = RateLimiter::new(config(1, 1, 1000), Arc::new(TokioClock));
        assert!(limiter.try_acquire(Duration::ZERO).await.is_granted());

        let start = Instant::now();
        assert_eq!(limiter.try_acquire(Duration::from_millis(500)).await, Permit::Rejected);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
