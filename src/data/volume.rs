//! 24-hour Bitcoin trading volume
//!
//! CoinGecko aggregates across exchanges and is preferred. Binance only
//! reports its own BTCUSDT book, so its quote volume is scaled up to
//! approximate the whole market.

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{get_json, parse_number};
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const VOLUME_TTL_MINUTES: i64 = 2;

/// Binance's share of spot volume is roughly a quarter of the market
pub const BINANCE_MARKET_MULTIPLIER: f64 = 4.0;

/// ~$95B, a typical day
pub const FALLBACK_VOLUME_USD: f64 = 95_000_000_000.0;

pub const FALLBACK_LABEL: &str = "Market Estimate";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    /// 24h volume in USD, rounded to whole dollars
    pub volume_24h: f64,
    /// 24h change in percent
    pub volume_change_24h: f64,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: SimplePriceVolume,
}

#[derive(Debug, Deserialize)]
struct SimplePriceVolume {
    usd_24h_vol: Option<f64>,
    usd_24h_change: Option<f64>,
}

/// CoinGecko `/simple/price` with 24h volume
#[derive(Debug, Clone)]
pub struct CoinGeckoVolume {
    client: Client,
    base_url: String,
}

impl CoinGeckoVolume {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Source<Volume> for CoinGeckoVolume {
    fn name(&self) -> &str {
        "CoinGecko (Multi-Exchange)"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self) -> Result<Volume, SourceError> {
        let request = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[
                ("ids", "bitcoin"),
                ("vs_currencies", "usd"),
                ("include_24hr_vol", "true"),
                ("include_24hr_change", "true"),
            ]);
        let response: SimplePriceResponse = get_json(request).await?;

        let volume = response
            .bitcoin
            .usd_24h_vol
            .ok_or_else(|| SourceError::invalid("usd_24h_vol missing"))?;
        if volume <= 0.0 {
            return Err(SourceError::invalid(format!("usd_24h_vol is {volume}")));
        }

        Ok(Volume {
            volume_24h: volume.round(),
            volume_change_24h: response.bitcoin.usd_24h_change.unwrap_or(0.0),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    quote_volume: String,
    price_change_percent: Option<String>,
}

/// Binance `/api/v3/ticker/24hr` for BTCUSDT
#[derive(Debug, Clone)]
pub struct BinanceVolume {
    client: Client,
    base_url: String,
}

impl BinanceVolume {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Source<Volume> for BinanceVolume {
    fn name(&self) -> &str {
        "Binance (Estimated Market)"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self) -> Result<Volume, SourceError> {
        let request = self
            .client
            .get(format!("{}/api/v3/ticker/24hr", self.base_url))
            .query(&[("symbol", "BTCUSDT")]);
        let ticker: BinanceTicker = get_json(request).await?;

        let quote_volume = parse_number("quoteVolume", &ticker.quote_volume)?;
        if quote_volume <= 0.0 {
            return Err(SourceError::invalid(format!("quoteVolume is {quote_volume}")));
        }
        let change = match ticker.price_change_percent.as_deref() {
            Some(raw) => parse_number("priceChangePercent", raw)?,
            None => 0.0,
        };

        Ok(Volume {
            volume_24h: (quote_volume * BINANCE_MARKET_MULTIPLIER).round(),
            volume_change_24h: change,
        })
    }
}

pub fn validate(volume: &Volume) -> Result<(), String> {
    if volume.volume_24h > 0.0 {
        Ok(())
    } else {
        Err(format!("volume {} is not positive", volume.volume_24h))
    }
}

pub fn fallback() -> Volume {
    Volume {
        volume_24h: FALLBACK_VOLUME_USD,
        volume_change_24h: 0.0,
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<Volume> {
    ResourceDescriptor::new(
        "volume",
        TimeDelta::minutes(VOLUME_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(CoinGeckoVolume::new(client.clone(), &settings.endpoints.coingecko))
    .source(BinanceVolume::new(client.clone(), &settings.endpoints.binance))
    .validator(validate)
}
