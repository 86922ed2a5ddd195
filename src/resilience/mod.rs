//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Protected call (coordinator.rs), per attempt:
//!     → rate_limit.rs (permit from the dependency's bucket)
//!     → circuit_breaker.rs (admission; fail fast when open)
//!     → timeouts.rs (per-attempt deadline around executor.rs)
//!     → circuit_breaker.rs (outcome into the rolling window)
//!     → retries.rs + backoff.rs (retry decision and delay)
//!     → fallback.rs (when the chain ends without success)
//! ```
//!
//! # Design Decisions
//! - Composition order is explicit code, not interception
//! - Breaker and limiter state live in registry.rs, one entry per dependency
//! - Every suspension point (permit wait, call, backoff) is a Tokio await

pub mod backoff;
pub mod circuit_breaker;
pub mod clock;
pub mod coordinator;
pub mod executor;
pub mod fallback;
pub mod outcome;
pub mod rate_limit;
pub mod registry;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use coordinator::{CallPolicy, Resolution, ResponseSource, RetryCoordinator};
pub use executor::{HttpExecutor, RpcExecutor};
pub use fallback::FallbackResolver;
pub use outcome::{CallAttempt, CallError, FailureKind, Outcome};
pub use rate_limit::{Permit, RateLimiter};
pub use registry::{Dependency, DependencyRegistry};
pub use retries::RetryPolicy;
