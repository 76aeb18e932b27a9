//! Bitcoin market dominance
//!
//! Primary source is CoinGecko's `/global` endpoint; CoinMarketCap's global
//! metrics (API key required) is tried next.

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::get_json;
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const DOMINANCE_TTL_MINUTES: i64 = 5;

/// BTC share of total crypto market cap, in percent
pub const FALLBACK_DOMINANCE: f64 = 63.5;

/// Total crypto market cap in USD (~$3.6T)
pub const FALLBACK_TOTAL_MARKET_CAP: f64 = 3_600_000_000_000.0;

pub const FALLBACK_LABEL: &str = "CoinGecko Global (Fallback)";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dominance {
    /// BTC market-cap share in percent
    pub dominance: f64,
    /// Total crypto market cap in USD
    pub total_market_cap: f64,
}

#[derive(Debug, Deserialize)]
pub(super) struct CoinGeckoGlobalResponse {
    pub(super) data: CoinGeckoGlobalData,
}

#[derive(Debug, Deserialize)]
pub(super) struct CoinGeckoGlobalData {
    #[serde(default)]
    pub(super) market_cap_percentage: HashMap<String, f64>,
    #[serde(default)]
    pub(super) total_market_cap: HashMap<String, f64>,
    #[serde(default)]
    pub(super) total_volume: HashMap<String, f64>,
    pub(super) active_cryptocurrencies: Option<u64>,
}

/// CoinGecko `/global`
#[derive(Debug, Clone)]
pub struct CoinGeckoGlobal {
    client: Client,
    base_url: String,
}

impl CoinGeckoGlobal {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Source<Dominance> for CoinGeckoGlobal {
    fn name(&self) -> &str {
        "CoinGecko Global"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<Dominance, SourceError> {
        let request = self.client.get(format!("{}/global", self.base_url));
        let response: CoinGeckoGlobalResponse = get_json(request).await?;
        let data = response.data;

        let dominance = data
            .market_cap_percentage
            .get("btc")
            .copied()
            .ok_or_else(|| SourceError::invalid("market_cap_percentage.btc missing"))?;
        let total_market_cap = data
            .total_market_cap
            .get("usd")
            .copied()
            .ok_or_else(|| SourceError::invalid("total_market_cap.usd missing"))?;

        Ok(Dominance {
            dominance,
            total_market_cap,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CmcGlobalResponse {
    data: CmcGlobalData,
}

#[derive(Debug, Deserialize)]
struct CmcGlobalData {
    btc_dominance: f64,
    quote: CmcQuote,
}

#[derive(Debug, Deserialize)]
struct CmcQuote {
    #[serde(rename = "USD")]
    usd: CmcUsdQuote,
}

#[derive(Debug, Deserialize)]
struct CmcUsdQuote {
    total_market_cap: f64,
}

/// CoinMarketCap `/v1/global-metrics/quotes/latest`
#[derive(Debug, Clone)]
pub struct CoinMarketCapGlobal {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl CoinMarketCapGlobal {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Source<Dominance> for CoinMarketCapGlobal {
    fn name(&self) -> &str {
        "CoinMarketCap"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<Dominance, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::MissingCredential("COINMARKETCAP_API_KEY"))?;

        let request = self
            .client
            .get(format!("{}/v1/global-metrics/quotes/latest", self.base_url))
            .header("X-CMC_PRO_API_KEY", api_key)
            .header("Accept", "application/json");
        let response: CmcGlobalResponse = get_json(request).await?;

        Ok(Dominance {
            dominance: response.data.btc_dominance,
            total_market_cap: response.data.quote.usd.total_market_cap,
        })
    }
}

pub fn validate(value: &Dominance) -> Result<(), String> {
    if !(value.dominance > 0.0 && value.dominance <= 100.0) {
        return Err(format!("dominance {} outside (0, 100]", value.dominance));
    }
    if value.total_market_cap <= 0.0 {
        return Err(format!("total market cap {} is not positive", value.total_market_cap));
    }
    Ok(())
}

pub fn fallback() -> Dominance {
    Dominance {
        dominance: FALLBACK_DOMINANCE,
        total_market_cap: FALLBACK_TOTAL_MARKET_CAP,
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<Dominance> {
    ResourceDescriptor::new(
        "dominance",
        TimeDelta::minutes(DOMINANCE_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(CoinGeckoGlobal::new(client.clone(), &settings.endpoints.coingecko))
    .source(CoinMarketCapGlobal::new(
        client.clone(),
        &settings.endpoints.coinmarketcap,
        settings.cmc_api_key.clone(),
    ))
    .validator(validate)
}
