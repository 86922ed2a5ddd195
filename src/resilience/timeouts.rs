//! Timeout enforcement.
//!
//! # Responsibilities
//! - Race a downstream call against its per-attempt deadline
//! - Cancel the call cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The timed-out future is dropped, so its eventual result is never observed
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;

use crate::resilience::outcome::CallError;

/// Run `operation` with a deadline of `limit` from now.
pub async fn with_deadline<F, T>(limit: Duration, operation: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(CallError::Timeout(limit)),
    }
}
