//! Whole-market crypto metrics from CoinGecko `/global`

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use super::dominance::{CoinGeckoGlobalResponse, FALLBACK_DOMINANCE, FALLBACK_TOTAL_MARKET_CAP};
use super::get_json;
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const GLOBAL_TTL_MINUTES: i64 = 5;

pub const FALLBACK_TOTAL_VOLUME: f64 = 180_000_000_000.0;
pub const FALLBACK_ETH_DOMINANCE: f64 = 12.8;
pub const FALLBACK_ACTIVE_CRYPTOCURRENCIES: u64 = 2_800;

pub const FALLBACK_LABEL: &str = "CoinGecko Global (Fallback)";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalMetrics {
    /// Total crypto market cap in USD
    pub total_market_cap: f64,
    /// Total 24h trading volume in USD
    #[serde(rename = "total24hVolume")]
    pub total_24h_volume: f64,
    pub btc_dominance: f64,
    pub eth_dominance: f64,
    pub active_cryptocurrencies: u64,
}

#[derive(Debug, Clone)]
pub struct CoinGeckoGlobalMetrics {
    client: Client,
    base_url: String,
}

impl CoinGeckoGlobalMetrics {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

fn required(map: &HashMap<String, f64>, key: &str, field: &str) -> Result<f64, SourceError> {
    map.get(key)
        .copied()
        .ok_or_else(|| SourceError::invalid(format!("{field}.{key} missing")))
}

#[async_trait]
impl Source<GlobalMetrics> for CoinGeckoGlobalMetrics {
    fn name(&self) -> &str {
        "CoinGecko Global"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<GlobalMetrics, SourceError> {
        let request = self.client.get(format!("{}/global", self.base_url));
        let response: CoinGeckoGlobalResponse = get_json(request).await?;
        let data = response.data;

        Ok(GlobalMetrics {
            total_market_cap: required(&data.total_market_cap, "usd", "total_market_cap")?,
            total_24h_volume: required(&data.total_volume, "usd", "total_volume")?,
            btc_dominance: required(&data.market_cap_percentage, "btc", "market_cap_percentage")?,
            eth_dominance: required(&data.market_cap_percentage, "eth", "market_cap_percentage")?,
            active_cryptocurrencies: data
                .active_cryptocurrencies
                .ok_or_else(|| SourceError::invalid("active_cryptocurrencies missing"))?,
        })
    }
}

pub fn validate(metrics: &GlobalMetrics) -> Result<(), String> {
    let share = 0.0..=100.0;
    if metrics.total_market_cap <= 0.0 {
        Err("total market cap is not positive".to_string())
    } else if metrics.btc_dominance <= 0.0 || !share.contains(&metrics.btc_dominance) {
        Err(format!("btc dominance {} out of range", metrics.btc_dominance))
    } else if !share.contains(&metrics.eth_dominance) {
        Err(format!("eth dominance {} out of range", metrics.eth_dominance))
    } else {
        Ok(())
    }
}

pub fn fallback() -> GlobalMetrics {
    GlobalMetrics {
        total_market_cap: FALLBACK_TOTAL_MARKET_CAP,
        total_24h_volume: FALLBACK_TOTAL_VOLUME,
        btc_dominance: FALLBACK_DOMINANCE,
        eth_dominance: FALLBACK_ETH_DOMINANCE,
        active_cryptocurrencies: FALLBACK_ACTIVE_CRYPTOCURRENCIES,
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<GlobalMetrics> {
    ResourceDescriptor::new(
        "global-metrics",
        TimeDelta::minutes(GLOBAL_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(CoinGeckoGlobalMetrics::new(client.clone(), &settings.endpoints.coingecko))
    .validator(validate)
}
