//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) + DOWNSTREAM_URL
//!     → loader.rs (parse, deserialize, env overrides)
//!     → validation.rs (semantic checks)
//!     → CallerConfig (validated, immutable)
//!     → resilience registry built once at startup
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → atomic swap of the call policy (retry + attempt timeout)
//! ```
//!
//! # Design Decisions
//! - Breaker and limiter state survive reloads; only the call policy is swapped
//! - All fields have defaults to allow minimal configs
//! - Invalid configuration is fatal at startup, ignored on reload

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{default_config, load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackoffKind, CallerConfig, CircuitBreakerConfig, DownstreamConfig,
    ListenerConfig, ObservabilityConfig, RateLimitConfig, RetryConfig, ServiceConfig,
    TimeoutConfig,
};
