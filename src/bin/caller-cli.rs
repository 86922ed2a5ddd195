use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "caller-cli")]
#[command(about = "Management CLI for the guarded caller", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check service status and active call policy
    Status,
    /// Show circuit breaker and rate limiter state per dependency
    Dependencies,
    /// Close a dependency's circuit breaker and clear its window
    Reset {
        /// Dependency name
        name: String,
    },
    /// Trigger one protected call
    Call {
        #[arg(long, default_value = "service-a")]
        service: String,
        #[arg(long, default_value = "service-b")]
        dependency: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Dependencies => {
            let res = client
                .get(format!("{}/admin/dependencies", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Reset { name } => {
            let res = client
                .post(format!("{}/admin/dependencies/{}/reset", cli.url, name))
                .headers(headers)
                .send()
                .await?;
            if res.status().is_success() {
                println!("Circuit breaker for '{}' reset", name);
            } else {
                eprintln!("Error: Admin API returned status {}", res.status());
            }
        }
        Commands::Call {
            service,
            dependency,
        } => {
            let res = client
                .get(format!("{}/{}/call-{}", cli.url, service, dependency))
                .send()
                .await?;
            let fallback = res
                .headers()
                .get("x-fallback")
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);
            let attempts = res
                .headers()
                .get("x-call-attempts")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("?")
                .to_owned();
            let body = res.text().await?;
            match fallback {
                Some(kind) => println!("[fallback: {}, attempts: {}] {}", kind, attempts, body),
                None => println!("[attempts: {}] {}", attempts, body),
            }
        }
    }

    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
