//! Guarded caller service.
//!
//! Serves a greeting plus one endpoint that calls a downstream dependency
//! through a layered resilience pipeline:
//!
//! ```text
//!     GET /{service}/call-{dependency}
//!         │
//!         ▼
//!   ┌────────────────────────── retry loop ──────────────────────────┐
//!   │ rate limiter → circuit breaker → timeout(HTTP GET downstream)  │
//!   │        ▲                                         │              │
//!   │        └──── backoff (retryable, attempts left) ◀┘              │
//!   └─────────────────────────────────┬───────────────────────────────┘
//!                                     ▼
//!                        payload  or  fallback message
//! ```

use clap::Parser;
use std::path::PathBuf;

use guarded_caller::lifecycle::startup;

#[derive(Parser)]
#[command(name = "guarded-caller")]
#[command(about = "HTTP service calling a downstream through rate limiting, circuit breaking, timeouts and retries", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    startup::run(args.config).await?;
    Ok(())
}
