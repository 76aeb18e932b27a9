//! Command-line interface parsing for BitcoinHub
//!
//! Global options carry credentials and logging; subcommands pick between
//! a one-shot `get`, the `list` catalogue and the HTTP `serve` mode.

use clap::{Parser, Subcommand};
use std::time::Duration;
use thiserror::Error;

use crate::config::{Endpoints, LogFormat, LoggingSettings, Settings};
use crate::server::DEFAULT_BIND;
use crate::service::ResourceKind;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The resource name is not one the dashboard serves
    #[error("Invalid resource: '{0}'. Valid resources: {names}", names = ResourceKind::names())]
    InvalidResource(String),
}

/// BitcoinHub - Bitcoin market data with caching and source fallback
#[derive(Parser, Debug)]
#[command(name = "bitcoinhub")]
#[command(about = "Bitcoin market data with per-resource caching and source fallback")]
#[command(version)]
pub struct Cli {
    /// FRED API key (inflation, treasury and liquidity sources)
    #[arg(long, env = "FRED_API_KEY", hide_env_values = true, global = true)]
    pub fred_api_key: Option<String>,

    /// CoinMarketCap Pro API key (dominance backup source)
    #[arg(long, env = "COINMARKETCAP_API_KEY", hide_env_values = true, global = true)]
    pub cmc_api_key: Option<String>,

    /// Log output format
    #[arg(
        long,
        value_enum,
        env = "BITCOINHUB_LOG_FORMAT",
        default_value_t = LogFormat::Compact,
        global = true
    )]
    pub log_format: LogFormat,

    /// Default log filter, overridden by RUST_LOG
    #[arg(long, env = "BITCOINHUB_LOG", default_value = "info", global = true)]
    pub log_level: String,

    /// Overall timeout for any single HTTP request, in seconds
    #[arg(long, value_name = "SECONDS", global = true)]
    pub http_timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Resolve one resource and print it as JSON
    ///
    /// Examples:
    ///   bitcoinhub get dominance
    ///   bitcoinhub get treasury --refresh
    Get {
        /// Resource name (see `bitcoinhub list`)
        resource: String,
        /// Clear the resource's cache before resolving
        #[arg(long)]
        refresh: bool,
    },
    /// List resources with their TTL, sources and fallback
    List,
    /// Serve every resource over HTTP
    Serve {
        /// Address to listen on
        #[arg(long, default_value = DEFAULT_BIND)]
        bind: String,
    },
}

/// Parses a resource name argument into a `ResourceKind`
pub fn parse_resource_arg(s: &str) -> Result<ResourceKind, CliError> {
    ResourceKind::parse(s).ok_or_else(|| CliError::InvalidResource(s.to_string()))
}

impl Cli {
    /// Runtime settings derived from the global options
    pub fn settings(&self) -> Settings {
        Settings {
            fred_api_key: self.fred_api_key.clone().filter(|key| !key.is_empty()),
            cmc_api_key: self.cmc_api_key.clone().filter(|key| !key.is_empty()),
            endpoints: Endpoints::default(),
            logging: LoggingSettings {
                level: self.log_level.clone(),
                format: self.log_format,
            },
            http_timeout: self.http_timeout.map(Duration::from_secs),
        }
    }
}
