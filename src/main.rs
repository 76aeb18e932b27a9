//! BitcoinHub - Bitcoin market data with per-resource caching
//!
//! `get` resolves a single resource and prints it, `list` shows the
//! resource catalogue and `serve` exposes everything over HTTP.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use bitcoinhub::cli::{parse_resource_arg, Cli, Command};
use bitcoinhub::{server, telemetry, AppError, Dashboard};

async fn run(cli: Cli) -> Result<(), AppError> {
    let settings = cli.settings();
    telemetry::init(&settings.logging)?;

    let dashboard = Dashboard::new(&settings)?;

    match cli.command {
        Command::Get { resource, refresh } => {
            let kind = parse_resource_arg(&resource)?;
            let value = dashboard.get_json(kind, refresh).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        Command::List => {
            for info in dashboard.catalogue() {
                println!(
                    "{:<16} ttl {:>4}s  {:<32} sources: {}  fallback: {}",
                    info.name,
                    info.ttl_seconds,
                    info.route,
                    info.sources.join(" -> "),
                    info.fallback
                );
            }
        }
        Command::Serve { bind } => {
            server::run(Arc::new(dashboard), &bind).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}
