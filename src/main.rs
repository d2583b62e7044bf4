//! HerbTrace - package provenance lookup from the command line
//!
//! Module structure:
//! - `domain/` - Package record and display field types
//! - `io/` - External interfaces (HTTP fetch, fixture backend, terminal)
//! - `services/` - Projection and the lookup state machine
//! - `infra/` - Infrastructure (Config, Metrics)

use anyhow::Context;
use clap::{Parser, Subcommand};
use herbtrace_client::domain::{DisplayField, PackageRecord};
use herbtrace_client::infra::{Config, Layout, Metrics};
use herbtrace_client::io::{render, FetchClient};
use herbtrace_client::services::{project, FieldSchema, LookupSession, LookupState};
use serde_json::json;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Exit code used when the user interrupts a lookup (128 + SIGINT)
const EXIT_CANCELLED: u8 = 130;

/// HerbTrace - look up herbal package provenance records
#[derive(Parser, Debug)]
#[command(name = "herbtrace", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Backend base URL, overrides config and environment
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a package by identifier and show its provenance
    Lookup {
        /// Package identifier, or `-` to read it from stdin
        identifier: String,

        /// Print display fields as JSON
        #[arg(long)]
        json: bool,

        /// Field layout (defaults to the configured one)
        #[arg(long, value_enum)]
        layout: Option<Layout>,

        /// Check that the backend is reachable before looking up
        #[arg(long)]
        probe: bool,
    },
    /// Check whether the backend is reachable
    Probe,
    /// Project a saved record JSON file without contacting the backend
    Render {
        file: String,

        #[arg(long)]
        json: bool,

        #[arg(long, value_enum)]
        layout: Option<Layout>,
    },
}

fn init_logging() {
    // Default: WARN so rendered output stays clean, RUST_LOG=debug for full visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref());
    if let Some(url) = &args.base_url {
        config = config.with_base_url(url);
    }

    info!(
        config_file = %config.config_file(),
        base_url = %config.base_url(),
        request_timeout_ms = %config.request_timeout_ms(),
        probe_timeout_ms = %config.probe_timeout_ms(),
        "config_loaded"
    );

    let result = match args.command {
        Command::Lookup { identifier, json, layout, probe } => {
            let layout = layout.unwrap_or(config.layout());
            run_lookup(&config, &identifier, layout, json, probe).await
        }
        Command::Probe => run_probe(&config).await,
        Command::Render { file, json, layout } => {
            run_render(&config, &file, layout.unwrap_or(config.layout()), json)
        }
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn read_identifier(raw: &str) -> anyhow::Result<String> {
    if raw != "-" {
        return Ok(raw.to_string());
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).context("Failed to read identifier from stdin")?;
    Ok(line.trim().to_string())
}

fn print_fields(fields: &[DisplayField], as_json: bool, color: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(fields)?);
    } else {
        print!("{}", render(fields, color));
    }
    Ok(())
}

async fn run_lookup(
    config: &Config,
    raw_identifier: &str,
    layout: Layout,
    as_json: bool,
    probe: bool,
) -> anyhow::Result<ExitCode> {
    let identifier = read_identifier(raw_identifier)?;
    if identifier.is_empty() {
        anyhow::bail!("package identifier is empty");
    }

    let metrics = Arc::new(Metrics::new());
    let client = Arc::new(FetchClient::new(config)?.with_metrics(metrics.clone()));

    if probe && !client.check_reachable().await {
        warn!(base_url = %client.base_url(), "backend_unreachable");
        eprintln!("warning: backend at {} is not reachable", client.base_url());
    }

    // Ctrl+C abandons the lookup
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        debug!("cancel_signal_received");
        let _ = cancel_tx.send(true);
    });

    let mut session = LookupSession::new(client, FieldSchema::for_layout(layout));
    let state = session.submit(identifier, cancel_rx).await;
    metrics.report().log();

    let code = match state {
        LookupState::Success { fields, .. } => {
            print_fields(&fields, as_json, config.color())?;
            ExitCode::SUCCESS
        }
        LookupState::Failed { identifier, error } => {
            if as_json {
                let body = json!({
                    "identifier": identifier,
                    "error": error.kind(),
                    "message": error.user_message(),
                });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                eprintln!("{}", error.user_message());
            }
            ExitCode::FAILURE
        }
        LookupState::Idle | LookupState::Loading { .. } => {
            eprintln!("lookup cancelled");
            ExitCode::from(EXIT_CANCELLED)
        }
    };
    Ok(code)
}

async fn run_probe(config: &Config) -> anyhow::Result<ExitCode> {
    let client = FetchClient::new(config)?;
    if client.check_reachable().await {
        println!("reachable");
        Ok(ExitCode::SUCCESS)
    } else {
        println!("unreachable");
        Ok(ExitCode::FAILURE)
    }
}

fn run_render(config: &Config, path: &str, layout: Layout, as_json: bool) -> anyhow::Result<ExitCode> {
    let content =
        std::fs::read(path).with_context(|| format!("Failed to read record file {path}"))?;
    let value: serde_json::Value = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse record file {path}"))?;

    let record = PackageRecord::from_value(value);
    let fields = project(&record, &FieldSchema::for_layout(layout));
    print_fields(&fields, as_json, config.color())?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_identifier_is_passed_through() {
        assert_eq!(read_identifier("PKG-1001").unwrap(), "PKG-1001");
        assert_eq!(read_identifier(" lot 7 ").unwrap(), " lot 7 ");
    }
}
