//! US 10-year Treasury yield
//!
//! FRED's DGS10 series is preferred; Yahoo Finance's ^TNX chart metadata is
//! the live backup.

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::fred::FredClient;
use super::round_to;
use super::yahoo::YahooChartClient;
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const TREASURY_TTL_MINUTES: i64 = 2;

pub const TREASURY_SERIES: &str = "DGS10";

const TNX_SYMBOL: &str = "%5ETNX";

/// A few extra days so weekend and holiday gaps still leave two values
const OBSERVATION_LIMIT: u32 = 5;

/// 52-week range reported alongside the yield
pub const LOW_52_WEEK: f64 = 3.15;
pub const HIGH_52_WEEK: f64 = 5.02;

pub const FALLBACK_YIELD: f64 = 4.25;
pub const FALLBACK_LABEL: &str = "Fallback estimate";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLevels {
    pub low_52_week: f64,
    pub current: f64,
    pub high_52_week: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryYield {
    /// Yield in percent
    #[serde(rename = "yield")]
    pub yield_pct: f64,
    /// Absolute change versus the previous close, percentage points
    pub change: f64,
    /// Relative change versus the previous close, percent
    pub percent_change: f64,
    pub key_levels: KeyLevels,
}

impl TreasuryYield {
    /// Builds a reading from the latest and previous yields
    pub fn from_closes(latest: f64, previous: Option<f64>) -> Self {
        let change = previous.map_or(0.0, |previous| latest - previous);
        let percent_change = match previous {
            Some(previous) if previous != 0.0 => change / previous * 100.0,
            _ => 0.0,
        };
        Self {
            yield_pct: latest,
            change: round_to(change, 4),
            percent_change: round_to(percent_change, 4),
            key_levels: KeyLevels {
                low_52_week: LOW_52_WEEK,
                current: latest,
                high_52_week: HIGH_52_WEEK,
            },
        }
    }
}

/// DGS10 from FRED
#[derive(Debug, Clone)]
pub struct FredTreasury {
    fred: FredClient,
}

impl FredTreasury {
    pub fn new(fred: FredClient) -> Self {
        Self { fred }
    }
}

#[async_trait]
impl Source<TreasuryYield> for FredTreasury {
    fn name(&self) -> &str {
        "FRED API (DGS10)"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<TreasuryYield, SourceError> {
        let observations = self
            .fred
            .observations(TREASURY_SERIES, OBSERVATION_LIMIT)
            .await?;

        let mut values = observations.iter().filter_map(|obs| obs.numeric());
        let (Some(latest), Some(previous)) = (values.next(), values.next()) else {
            return Err(SourceError::invalid("fewer than two valid DGS10 observations"));
        };

        Ok(TreasuryYield::from_closes(latest, Some(previous)))
    }
}

/// Yahoo Finance chart for ^TNX
#[derive(Debug, Clone)]
pub struct YahooTreasury {
    yahoo: YahooChartClient,
}

impl YahooTreasury {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            yahoo: YahooChartClient::new(client, base_url),
        }
    }
}

#[async_trait]
impl Source<TreasuryYield> for YahooTreasury {
    fn name(&self) -> &str {
        "Yahoo Finance (^TNX)"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self) -> Result<TreasuryYield, SourceError> {
        let meta = self.yahoo.meta(TNX_SYMBOL).await?;
        let price = meta
            .regular_market_price
            .ok_or_else(|| SourceError::invalid("regularMarketPrice missing"))?;

        Ok(TreasuryYield::from_closes(price, meta.chart_previous_close))
    }
}

pub fn validate(reading: &TreasuryYield) -> Result<(), String> {
    if reading.yield_pct > 0.0 && reading.yield_pct < 100.0 {
        Ok(())
    } else {
        Err(format!("yield {} is implausible", reading.yield_pct))
    }
}

pub fn fallback() -> TreasuryYield {
    TreasuryYield::from_closes(FALLBACK_YIELD, None)
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<TreasuryYield> {
    let fred = FredClient::new(
        client.clone(),
        &settings.endpoints.fred,
        settings.fred_api_key.clone(),
    );
    ResourceDescriptor::new(
        "treasury",
        TimeDelta::minutes(TREASURY_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(FredTreasury::new(fred))
    .source(YahooTreasury::new(client.clone(), &settings.endpoints.yahoo))
    .validator(validate)
}
