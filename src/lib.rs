//! Resilient outbound calls for a small HTTP service.
//!
//! The [`resilience`] module holds the pipeline; everything else is the
//! service around it.

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::CallerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
