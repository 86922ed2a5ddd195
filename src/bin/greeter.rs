//! Stand-in downstream dependency.
//!
//! Answers `/{name}/hello` immediately and `/{name}/slow` after a delay, so
//! the caller's timeout and circuit breaker can be exercised by hand.

use axum::{routing::get, Router};
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "greeter")]
#[command(about = "Downstream stand-in with a fast and a slow greeting", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "127.0.0.1:8081")]
    bind: SocketAddr,

    /// Route prefix.
    #[arg(short, long, default_value = "service-b")]
    name: String,

    /// Delay of the slow endpoint in milliseconds.
    #[arg(long, default_value_t = 3000)]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greeter=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let delay = Duration::from_millis(args.delay_ms);

    let app = Router::new()
        .route(
            &format!("/{}/hello", args.name),
            get(|| async { "Hello from Service B!" }),
        )
        .route(
            &format!("/{}/slow", args.name),
            get(move || async move {
                tracing::info!(delay_ms = delay.as_millis() as u64, "Received /slow request, delaying");
                tokio::time::sleep(delay).await;
                tracing::info!("Responding to /slow request after delay");
                "Hello from Service B (after a delay)!"
            }),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    tracing::info!(address = %listener.local_addr()?, "Greeter listening");
    axum::serve(listener, app).await?;
    Ok(())
}
