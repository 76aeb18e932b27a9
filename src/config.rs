//! Runtime configuration
//!
//! `Settings` is assembled from CLI flags and environment variables (see
//! `cli.rs`) and handed to `Dashboard::new`. Upstream base URLs live in
//! `Endpoints` so tests can point every provider at a mock server.

use std::time::Duration;

/// User-Agent sent with every upstream request
pub const USER_AGENT: &str = concat!("BitcoinHub/", env!("CARGO_PKG_VERSION"));

/// Base URLs for every upstream provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub coingecko: String,
    pub coinmarketcap: String,
    pub binance: String,
    pub fred: String,
    pub yahoo: String,
    pub fiscal_data: String,
    pub blockchain_api: String,
    pub blockchain_info: String,
    pub deribit: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            coingecko: "https://api.coingecko.com/api/v3".to_string(),
            coinmarketcap: "https://pro-api.coinmarketcap.com".to_string(),
            binance: "https://api.binance.com".to_string(),
            fred: "https://api.stlouisfed.org".to_string(),
            yahoo: "https://query1.finance.yahoo.com".to_string(),
            fiscal_data: "https://api.fiscaldata.treasury.gov/services/api/v2".to_string(),
            blockchain_api: "https://api.blockchain.info".to_string(),
            blockchain_info: "https://blockchain.info".to_string(),
            deribit: "https://www.deribit.com".to_string(),
        }
    }
}

impl Endpoints {
    /// Points every provider at the same base URL
    ///
    /// Provider paths do not overlap, so a single mock server can stand in
    /// for all of them.
    pub fn all_at(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/').to_string();
        Self {
            coingecko: base.clone(),
            coinmarketcap: base.clone(),
            binance: base.clone(),
            fred: base.clone(),
            yahoo: base.clone(),
            fiscal_data: base.clone(),
            blockchain_api: base.clone(),
            blockchain_info: base.clone(),
            deribit: base,
        }
    }
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable single-line output
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset (e.g. "info")
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Everything the dashboard needs to reach its upstreams
#[derive(Debug, Clone, Default)]
pub struct Settings {
    /// FRED API key; FRED sources fail (and fall through) without it
    pub fred_api_key: Option<String>,
    /// CoinMarketCap Pro API key; the CoinMarketCap source fails without it
    pub cmc_api_key: Option<String>,
    pub endpoints: Endpoints,
    pub logging: LoggingSettings,
    /// Overall ceiling applied to the shared HTTP client
    pub http_timeout: Option<Duration>,
}

impl Settings {
    /// Builds the shared HTTP client used by every source
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = self.http_timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
