//! Mock HerbTrace backend
//!
//! Serves a JSON dataset for local development so the client can be run
//! without the real service.
//!
//! Dataset format: `{ "<package id>": <package record>, ... }`
//!
//! Behavior:
//! - `GET /get_package/{id}` returns the record, or
//!   `{"error":"Package not found"}` with 200 for unknown ids
//! - `HEAD /` returns 200 (reachability probe)
//! - `--delay-ms` slows every response, handy for exercising timeouts
//!
//! Usage:
//!   cargo run --bin mock_backend -- --port 8001 --dataset data/sample_packages.json

use anyhow::Context;
use clap::Parser;
use herbtrace_client::io::{FixtureRoutes, FixtureServer};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mock_backend")]
#[command(about = "Mock HerbTrace backend serving a JSON dataset")]
struct Args {
    /// HTTP port to listen on
    #[arg(short, long, default_value = "8001")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Dataset file keyed by package id
    #[arg(short, long, default_value = "data/sample_packages.json")]
    dataset: String,

    /// Artificial delay applied to every package response (ms)
    #[arg(long, default_value = "0")]
    delay_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();

    let content = std::fs::read_to_string(&args.dataset)
        .with_context(|| format!("Failed to read dataset {}", args.dataset))?;
    let dataset: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse dataset {}", args.dataset))?;

    let mut routes = FixtureRoutes::from_dataset(&dataset)?;
    if args.delay_ms > 0 {
        routes = routes.with_global_delay(Duration::from_millis(args.delay_ms));
    }

    let addr: SocketAddr = format!("{}:{}", args.host, args.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", args.host, args.port))?;

    let server = FixtureServer::start(addr, routes).await?;
    info!(
        base_url = %server.base_url(),
        dataset = %args.dataset,
        delay_ms = %args.delay_ms,
        "mock_backend_ready"
    );

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown_signal_received");
    server.shutdown().await;

    Ok(())
}
