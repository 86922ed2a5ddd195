//! Backoff between retry attempts, with jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::{BackoffKind, RetryConfig};

/// Delay schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub kind: BackoffKind,
    pub base: Duration,
    pub multiplier: f64,
    pub max: Duration,
    /// Upper bound of the random extra, as a fraction of the computed delay.
    pub jitter: f64,
}

impl BackoffPolicy {
    pub fn exponential(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            base,
            multiplier,
            max,
            jitter: 0.0,
        }
    }

    pub fn fixed(delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base: delay,
            multiplier: 1.0,
            max: delay,
            jitter: 0.0,
        }
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Delay before the attempt following 0-based attempt `attempt`, without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        match self.kind {
            BackoffKind::Fixed => self.base,
            BackoffKind::Exponential => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let factor = self.multiplier.powi(exponent);
                let millis = self.base.as_millis() as f64 * factor;
                let capped = millis.min(self.max.as_millis() as f64);
                Duration::from_millis(capped as u64)
            }
        }
    }

    /// Delay before the attempt following 0-based attempt `attempt`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay(attempt);
        let jitter_range = (delay.as_millis() as f64 * self.jitter) as u64;

        // Apply jitter (0 to jitter * delay)
        let jitter = if jitter_range > 0 {
            rand::thread_rng().gen_range(0..=jitter_range)
        } else {
            0
        };

        delay + Duration::from_millis(jitter)
    }
}

impl From<&RetryConfig> for BackoffPolicy {
    fn from(config: &RetryConfig) -> Self {
        let base = Duration::from_millis(config.base_delay_ms);
        let policy = match config.backoff {
            BackoffKind::Fixed => BackoffPolicy::fixed(base),
            BackoffKind::Exponential => BackoffPolicy::exponential(
                base,
                config.multiplier,
                Duration::from_millis(config.max_delay_ms),
            ),
        };
        policy.with_jitter(config.jitter)
    }
}
