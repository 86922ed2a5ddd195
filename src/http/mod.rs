//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → request.rs (request ID, tracing span)
//!     → server.rs (Axum router: greeting, protected call, health, admin)
//!     → resilience::coordinator (protected call only)
//!     → text response (downstream payload or fallback)
//! ```

pub mod request;
pub mod server;

pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ServerError, CALL_ATTEMPTS_HEADER, FALLBACK_HEADER};
