//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Resilience pipeline and HTTP layer produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request
//! - Metrics are cheap and no-ops when the exporter is disabled

pub mod logging;
pub mod metrics;
