//! BTC options positioning from Deribit's public book summary

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{get_json, round_to};
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const OPTIONS_TTL_MINUTES: i64 = 5;

/// Contracts listed in `topContracts`, by 24h volume
pub const TOP_CONTRACTS: usize = 10;

const BULLISH_PUT_CALL: f64 = 0.7;
const BEARISH_PUT_CALL: f64 = 1.3;
/// Net delta (BTC) beyond which positioning counts as directional
const DIRECTIONAL_DELTA: f64 = 10_000.0;
const HIGH_IV: f64 = 80.0;
const LOW_IV: f64 = 50.0;
const CALL_HEAVY_VOLUME: f64 = 1.5;
const PUT_HEAVY_VOLUME: f64 = 0.67;

pub const FALLBACK_LABEL: &str = "Fallback (no data)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    Call,
    Put,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn from_positioning(put_call_ratio: f64, net_delta: f64) -> Self {
        if put_call_ratio < BULLISH_PUT_CALL && net_delta > 0.0 {
            Sentiment::Bullish
        } else if put_call_ratio > BEARISH_PUT_CALL && net_delta < 0.0 {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }
}

/// Parsed form of a Deribit option name such as `BTC-28MAR25-100000-C`
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub expiry: String,
    pub strike: f64,
    pub kind: OptionKind,
}

impl Instrument {
    pub fn parse(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('-').collect();
        let [_, expiry, strike, kind] = parts.as_slice() else {
            return None;
        };
        let kind = match *kind {
            "C" => OptionKind::Call,
            "P" => OptionKind::Put,
            _ => return None,
        };
        Some(Self {
            expiry: expiry.to_string(),
            strike: strike.parse().ok()?,
            kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionContract {
    pub instrument_name: String,
    pub strike: f64,
    pub expiry: String,
    #[serde(rename = "type")]
    pub kind: OptionKind,
    pub open_interest: f64,
    pub volume_24h: f64,
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub implied_volatility: f64,
    pub mark_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionsFlow {
    pub put_call_ratio: f64,
    #[serde(rename = "totalCallOI")]
    pub total_call_oi: f64,
    #[serde(rename = "totalPutOI")]
    pub total_put_oi: f64,
    pub total_call_volume: f64,
    pub total_put_volume: f64,
    pub net_delta: f64,
    pub avg_implied_volatility: f64,
    pub top_contracts: Vec<OptionContract>,
    pub market_sentiment: Sentiment,
    pub flow_analysis: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BookSummaryResponse {
    #[serde(default)]
    result: Vec<BookSummary>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BookSummary {
    pub instrument_name: String,
    pub open_interest: Option<f64>,
    pub volume: Option<f64>,
    pub mark_iv: Option<f64>,
    pub mark_price: Option<f64>,
    pub greeks: Option<Greeks>,
}

#[derive(Debug, Clone, Copy, Deserialize, Default)]
#[serde(default)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
}

/// Readable notes on put/call balance, delta, IV and volume skew
pub fn flow_analysis(put_call_ratio: f64, net_delta: f64, avg_iv: f64, call_volume: f64, put_volume: f64) -> Vec<String> {
    let mut notes = Vec::new();

    notes.push(
        if put_call_ratio < BULLISH_PUT_CALL {
            "Low put-call ratio: traders favor calls over puts"
        } else if put_call_ratio > BEARISH_PUT_CALL {
            "High put-call ratio: elevated demand for protective puts"
        } else {
            "Put-call ratio near equilibrium: no clear directional bias"
        }
        .to_string(),
    );

    notes.push(
        if net_delta > DIRECTIONAL_DELTA {
            "Positive net delta: market-wide bullish options positioning"
        } else if net_delta < -DIRECTIONAL_DELTA {
            "Negative net delta: bearish hedging or put accumulation"
        } else {
            "Neutral net delta: calls and puts roughly offset"
        }
        .to_string(),
    );

    notes.push(
        if avg_iv > HIGH_IV {
            "Elevated implied volatility: a large move is priced in"
        } else if avg_iv < LOW_IV {
            "Low implied volatility: complacency and little hedging demand"
        } else {
            "Moderate implied volatility: normal conditions"
        }
        .to_string(),
    );

    let put_volume = if put_volume == 0.0 { 1.0 } else { put_volume };
    let volume_ratio = call_volume / put_volume;
    if volume_ratio > CALL_HEAVY_VOLUME {
        notes.push("Call volume dominates: strong bullish conviction".to_string());
    } else if volume_ratio < PUT_HEAVY_VOLUME {
        notes.push("Put volume exceeds calls: defensive positioning".to_string());
    }

    notes
}

/// Aggregates Deribit book summaries; unparseable instrument names are skipped
pub fn options_flow(summaries: &[BookSummary]) -> OptionsFlow {
    let mut total_call_oi = 0.0;
    let mut total_put_oi = 0.0;
    let mut total_call_volume = 0.0;
    let mut total_put_volume = 0.0;
    let mut net_delta = 0.0;
    let mut iv_sum = 0.0;
    let mut iv_count = 0_usize;
    let mut contracts = Vec::new();

    for summary in summaries {
        let Some(instrument) = Instrument::parse(&summary.instrument_name) else {
            continue;
        };
        let open_interest = summary.open_interest.unwrap_or(0.0);
        let volume = summary.volume.unwrap_or(0.0);
        let iv = summary.mark_iv.unwrap_or(0.0);
        let greeks = summary.greeks.unwrap_or_default();

        match instrument.kind {
            OptionKind::Call => {
                total_call_oi += open_interest;
                total_call_volume += volume;
            }
            OptionKind::Put => {
                total_put_oi += open_interest;
                total_put_volume += volume;
            }
        }
        net_delta += greeks.delta * open_interest;
        if iv > 0.0 {
            iv_sum += iv;
            iv_count += 1;
        }

        contracts.push(OptionContract {
            instrument_name: summary.instrument_name.clone(),
            strike: instrument.strike,
            expiry: instrument.expiry,
            kind: instrument.kind,
            open_interest,
            volume_24h: volume,
            delta: greeks.delta,
            gamma: greeks.gamma,
            vega: greeks.vega,
            theta: greeks.theta,
            implied_volatility: iv,
            mark_price: summary.mark_price.unwrap_or(0.0),
        });
    }

    let put_call_ratio = total_put_oi / if total_call_oi == 0.0 { 1.0 } else { total_call_oi };
    let avg_iv = if iv_count > 0 { iv_sum / iv_count as f64 } else { 0.0 };

    contracts.sort_by(|a, b| b.volume_24h.total_cmp(&a.volume_24h));
    contracts.truncate(TOP_CONTRACTS);

    OptionsFlow {
        put_call_ratio: round_to(put_call_ratio, 2),
        total_call_oi: round_to(total_call_oi, 2),
        total_put_oi: round_to(total_put_oi, 2),
        total_call_volume: round_to(total_call_volume, 2),
        total_put_volume: round_to(total_put_volume, 2),
        net_delta: round_to(net_delta, 2),
        avg_implied_volatility: round_to(avg_iv, 2),
        top_contracts: contracts,
        market_sentiment: Sentiment::from_positioning(put_call_ratio, net_delta),
        flow_analysis: flow_analysis(put_call_ratio, net_delta, avg_iv, total_call_volume, total_put_volume),
    }
}

/// Deribit `get_book_summary_by_currency` for BTC options
#[derive(Debug, Clone)]
pub struct DeribitOptions {
    client: Client,
    base_url: String,
}

impl DeribitOptions {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Source<OptionsFlow> for DeribitOptions {
    fn name(&self) -> &str {
        "Deribit"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<OptionsFlow, SourceError> {
        let request = self
            .client
            .get(format!("{}/api/v2/public/get_book_summary_by_currency", self.base_url))
            .query(&[("currency", "BTC"), ("kind", "option")]);
        let response: BookSummaryResponse = get_json(request).await?;

        let flow = options_flow(&response.result);
        if flow.top_contracts.is_empty() {
            return Err(SourceError::invalid("no BTC option instruments in book summary"));
        }
        Ok(flow)
    }
}

pub fn fallback() -> OptionsFlow {
    OptionsFlow {
        put_call_ratio: 0.0,
        total_call_oi: 0.0,
        total_put_oi: 0.0,
        total_call_volume: 0.0,
        total_put_volume: 0.0,
        net_delta: 0.0,
        avg_implied_volatility: 0.0,
        top_contracts: Vec::new(),
        market_sentiment: Sentiment::Neutral,
        flow_analysis: vec!["Options data unavailable".to_string()],
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<OptionsFlow> {
    ResourceDescriptor::new(
        "options-flow",
        TimeDelta::minutes(OPTIONS_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(DeribitOptions::new(client.clone(), &settings.endpoints.deribit))
}
