//! Traditional-market gauges: DXY, gold, S&P 500 and VIX
//!
//! All four Yahoo charts are read concurrently. An instrument whose chart
//! cannot be read keeps its static estimate and is flagged `estimated`;
//! the source only fails when every chart fails.

use async_trait::async_trait;
use chrono::TimeDelta;
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use super::round_to;
use super::yahoo::{ChartMeta, YahooChartClient};
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const MARKETS_TTL_MINUTES: i64 = 1;

/// Limit for one chart request
pub const CHART_TIMEOUT: Duration = Duration::from_secs(5);

pub const FALLBACK_LABEL: &str = "Market estimates";

/// One instrument read from Yahoo
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketInstrument {
    pub symbol: &'static str,
    pub label: &'static str,
    /// Decimal places kept on the value
    pub decimals: i32,
    pub estimate: f64,
    /// Daily change in percent used when the chart carries none
    pub typical_change: f64,
}

pub const DXY: MarketInstrument = MarketInstrument {
    symbol: "DX-Y.NYB",
    label: "US Dollar Index",
    decimals: 3,
    estimate: 106.45,
    typical_change: -0.11,
};

pub const GOLD: MarketInstrument = MarketInstrument {
    symbol: "GC=F",
    label: "Gold",
    decimals: 2,
    estimate: 2635.40,
    typical_change: 0.45,
};

pub const SPX: MarketInstrument = MarketInstrument {
    symbol: "%5EGSPC",
    label: "S&P 500",
    decimals: 2,
    estimate: 5995.23,
    typical_change: 0.32,
};

pub const VIX: MarketInstrument = MarketInstrument {
    symbol: "%5EVIX",
    label: "VIX",
    decimals: 2,
    estimate: 14.28,
    typical_change: -1.22,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketQuote {
    pub value: f64,
    /// Daily change in percent
    pub change: f64,
    /// True when this quote is the static estimate
    pub estimated: bool,
}

impl MarketQuote {
    pub fn estimate(instrument: &MarketInstrument) -> Self {
        Self {
            value: instrument.estimate,
            change: instrument.typical_change,
            estimated: true,
        }
    }

    /// Reads a live quote from chart metadata
    ///
    /// Value is the market price, else the last close. Change is Yahoo's
    /// own percentage, else derived from the last close, else the
    /// instrument's typical move.
    pub fn from_meta(instrument: &MarketInstrument, meta: &ChartMeta) -> Result<Self, SourceError> {
        let last_close = meta.last_close();
        let value = meta
            .regular_market_price
            .or(last_close)
            .filter(|value| value.is_finite() && *value > 0.0)
            .ok_or_else(|| SourceError::invalid(format!("{} has no price", instrument.label)))?;

        let derived = match (meta.regular_market_price, last_close) {
            (Some(price), Some(close)) if close != 0.0 => Some((price - close) / close * 100.0),
            _ => None,
        };
        let change = meta
            .regular_market_change_percent
            .or(derived)
            .unwrap_or(instrument.typical_change);

        Ok(Self {
            value: round_to(value, instrument.decimals),
            change: round_to(change, 2),
            estimated: false,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialMarkets {
    pub dxy: MarketQuote,
    pub gold: MarketQuote,
    pub spx: MarketQuote,
    pub vix: MarketQuote,
}

/// Yahoo Finance charts for every instrument
#[derive(Debug, Clone)]
pub struct YahooMarkets {
    yahoo: YahooChartClient,
    chart_timeout: Duration,
}

impl YahooMarkets {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            yahoo: YahooChartClient::new(client, base_url),
            chart_timeout: CHART_TIMEOUT,
        }
    }

    pub fn with_chart_timeout(mut self, chart_timeout: Duration) -> Self {
        self.chart_timeout = chart_timeout;
        self
    }

    async fn quote(&self, instrument: &MarketInstrument) -> Result<MarketQuote, SourceError> {
        let meta = tokio::time::timeout(self.chart_timeout, self.yahoo.meta(instrument.symbol))
            .await
            .map_err(|_| SourceError::Timeout(self.chart_timeout))??;
        MarketQuote::from_meta(instrument, &meta)
    }
}

#[async_trait]
impl Source<FinancialMarkets> for YahooMarkets {
    fn name(&self) -> &str {
        "Yahoo Finance"
    }

    fn timeout(&self) -> Duration {
        self.chart_timeout + Duration::from_secs(3)
    }

    async fn fetch(&self) -> Result<FinancialMarkets, SourceError> {
        let instruments = [DXY, GOLD, SPX, VIX];
        let results = join_all(instruments.iter().map(|instrument| self.quote(instrument))).await;

        let mut first_error = None;
        let mut resolved = 0;
        let quotes: Vec<MarketQuote> = instruments
            .iter()
            .zip(results)
            .map(|(instrument, result)| match result {
                Ok(quote) => {
                    resolved += 1;
                    quote
                }
                Err(error) => {
                    warn!(instrument = instrument.label, error = %error, "market chart failed, using estimate");
                    first_error.get_or_insert(error);
                    MarketQuote::estimate(instrument)
                }
            })
            .collect();

        if resolved == 0 {
            return Err(first_error.unwrap_or_else(|| SourceError::invalid("no market chart resolved")));
        }

        let [dxy, gold, spx, vix]: [MarketQuote; 4] = quotes
            .try_into()
            .map_err(|_| SourceError::invalid("unexpected quote count"))?;
        Ok(FinancialMarkets { dxy, gold, spx, vix })
    }
}

pub fn validate(markets: &FinancialMarkets) -> Result<(), String> {
    let quotes = [&markets.dxy, &markets.gold, &markets.spx, &markets.vix];
    if quotes.iter().all(|quote| quote.value > 0.0) {
        Ok(())
    } else {
        Err("non-positive market value".to_string())
    }
}

pub fn fallback() -> FinancialMarkets {
    FinancialMarkets {
        dxy: MarketQuote::estimate(&DXY),
        gold: MarketQuote::estimate(&GOLD),
        spx: MarketQuote::estimate(&SPX),
        vix: MarketQuote::estimate(&VIX),
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<FinancialMarkets> {
    ResourceDescriptor::new(
        "financial-markets",
        TimeDelta::minutes(MARKETS_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(YahooMarkets::new(client.clone(), &settings.endpoints.yahoo))
    .validator(validate)
}
