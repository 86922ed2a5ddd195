//! Per-dependency resilience state.
//!
//! # Responsibilities
//! - Own one rate limiter and one circuit breaker per dependency name
//! - Hand out shared handles to every call site for that dependency
//! - Expose snapshots and administrative reset
//!
//! # Design Decisions
//! - Built once at startup and passed around by `Arc`; no global state
//! - Registering an existing name keeps the existing state

use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{CircuitBreakerConfig, RateLimitConfig};
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitSnapshot};
use crate::resilience::clock::{Clock, TokioClock};
use crate::resilience::rate_limit::RateLimiter;

/// Shared resilience state for one downstream dependency.
pub struct Dependency {
    pub name: String,
    pub rate_limiter: RateLimiter,
    pub circuit_breaker: CircuitBreaker,
}

impl Dependency {
    pub fn snapshot(&self) -> DependencySnapshot {
        DependencySnapshot {
            name: self.name.clone(),
            available_permits: self.rate_limiter.available_permits(),
            circuit: self.circuit_breaker.snapshot(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DependencySnapshot {
    pub name: String,
    pub available_permits: u32,
    pub circuit: CircuitSnapshot,
}

pub struct DependencyRegistry {
    clock: Arc<dyn Clock>,
    dependencies: DashMap<String, Arc<Dependency>>,
}

impl DependencyRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(TokioClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            dependencies: DashMap::new(),
        }
    }

    /// Register a dependency, or return the one already registered under `name`.
    pub fn register(
        &self,
        name: &str,
        rate_limit: RateLimitConfig,
        circuit_breaker: CircuitBreakerConfig,
    ) -> Arc<Dependency> {
        self.dependencies
            .entry(name.to_string())
            .or_insert_with(|| {
                tracing::info!(dependency = %name, "Registering dependency");
                Arc::new(Dependency {
                    name: name.to_string(),
                    rate_limiter: RateLimiter::new(rate_limit, self.clock.clone()),
                    circuit_breaker: CircuitBreaker::new(name, circuit_breaker, self.clock.clone()),
                })
            })
            .clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Dependency>> {
        self.dependencies.get(name).map(|entry| entry.value().clone())
    }

    /// Snapshots of every dependency, sorted by name.
    pub fn snapshots(&self) -> Vec<DependencySnapshot> {
        let mut snapshots: Vec<_> = self
            .dependencies
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Reset the named breaker. Returns false for an unknown name.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(dependency) => {
                dependency.circuit_breaker.reset();
                true
            }
            None => false,
        }
    }
}

impl Default for DependencyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::{CallResult, CircuitState};
    use std::time::Duration;

    #[test]
    fn test_same_name_shares_state() {
        let registry = DependencyRegistry::new();
        let a = registry.register("b", RateLimitConfig::default(), CircuitBreakerConfig::default());
        let b = registry.register(
            "b",
            RateLimitConfig {
                capacity: 1,
                ..Default::default()
            },
            CircuitBreakerConfig::default(),
        );
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(b.rate_limiter.config().capacity, 10);
    }

    #[test]
    fn test_reset_and_snapshots() {
        let registry = DependencyRegistry::new();
        let dep = registry.register(
            "b",
            RateLimitConfig::default(),
            CircuitBreakerConfig {
                sliding_window_size: 1,
                minimum_calls: 1,
                ..Default::default()
            },
        );
        registry.register("a", RateLimitConfig::default(), CircuitBreakerConfig::default());

        let permit = dep.circuit_breaker.try_acquire().unwrap();
        dep.circuit_breaker
            .record(permit, CallResult::Failure, Duration::from_millis(1));

        let snapshots = registry.snapshots();
        assert_eq!(snapshots[0].name, "a");
        assert_eq!(snapshots[1].circuit.state, CircuitState::Open);

        assert!(registry.reset("b"));
        assert!(!registry.reset("missing"));
        assert_eq!(dep.circuit_breaker.state(), CircuitState::Closed);
    }
}
