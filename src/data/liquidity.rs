//! Dollar liquidity tracker built from FRED money-supply series
//!
//! Every series in [`LIQUIDITY_SERIES`] is fetched concurrently and reduced
//! to its latest value and a comparator roughly one year earlier. A series
//! without enough history is skipped; the source only fails when none of
//! them resolve. Dollar amounts are reported in billions.

use async_trait::async_trait;
use chrono::{NaiveDate, TimeDelta};
use futures::future::join_all;
use reqwest::Client;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::{debug, warn};

use super::fred::{FredClient, Observation};
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const LIQUIDITY_TTL_MINUTES: i64 = 10;

const YEAR_DAYS: i64 = 365;

/// Limit for a single series request
pub const SERIES_TIMEOUT: Duration = Duration::from_secs(15);

/// Limit for the whole fan-out, above [`SERIES_TIMEOUT`] so a stalled
/// series is skipped instead of discarding the rest
const FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Oldest observation still accepted as a comparator when nothing falls
/// inside the one-year window
const MIN_COMPARATOR_DAYS: i64 = 270;

/// Net liquidity below this many billions is flagged and bearish
const NET_LIQUIDITY_FLOOR: f64 = 2_000.0;
/// Net liquidity above this many billions is bullish
const NET_LIQUIDITY_HIGH: f64 = 5_000.0;

const MULTIPLIER_RANGE: RangeInclusive<f64> = 3.5..=4.5;
const RESERVE_RATIO_RANGE: RangeInclusive<f64> = 30.0..=50.0;

pub const FALLBACK_LABEL: &str = "Fallback (no data)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
}

impl Frequency {
    /// Observations to request so a year of history is covered
    pub fn observation_limit(self) -> u32 {
        match self {
            Frequency::Daily => 400,
            Frequency::Weekly => 80,
            Frequency::Monthly => 24,
            Frequency::Quarterly => 12,
        }
    }

    /// Accepted distance from exactly one year, in days
    pub fn comparator_tolerance_days(self) -> i64 {
        match self {
            Frequency::Quarterly => 45,
            _ => 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RawUnit {
    Billions,
    Millions,
    Percent,
    Index,
}

impl RawUnit {
    /// Converts a raw FRED value into the unit reported downstream
    pub fn normalize(self, raw: f64) -> f64 {
        match self {
            RawUnit::Millions => raw / 1_000.0,
            RawUnit::Billions | RawUnit::Percent | RawUnit::Index => raw,
        }
    }

    /// Label for the normalized value
    pub fn display_unit(self) -> &'static str {
        match self {
            RawUnit::Percent => "%",
            RawUnit::Index => "Index",
            RawUnit::Billions | RawUnit::Millions => "Billions USD",
        }
    }

    /// Human-readable rendering of a normalized value
    pub fn display(self, value: f64) -> String {
        match self {
            RawUnit::Percent => format!("{value:.2}%"),
            RawUnit::Index => format!("{value:.2}"),
            RawUnit::Billions | RawUnit::Millions => display_billions(value),
        }
    }
}

/// Formats an amount given in billions as `$x.xxT`, `$x.xxB` or `$x.xxM`
pub fn display_billions(billions: f64) -> String {
    if billions.abs() >= 1_000.0 {
        format!("${:.2}T", billions / 1_000.0)
    } else if billions.abs() >= 1.0 {
        format!("${billions:.2}B")
    } else {
        format!("${:.2}M", billions * 1_000.0)
    }
}

/// Grouping used for ordering; declaration order is display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Core,
    Velocity,
    Policy,
    FedHoldings,
}

/// Static description of one tracked FRED series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesConfig {
    pub series_id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
    pub frequency: Frequency,
    pub raw_unit: RawUnit,
    pub description: &'static str,
    /// Absolute YoY percent change above which the series is flagged
    pub anomaly_threshold: f64,
    pub category: Category,
}

pub const FED_BALANCE_SHEET: &str = "WALCL";
pub const TREASURY_GENERAL_ACCOUNT: &str = "WTREGEN";
pub const REVERSE_REPO: &str = "RRPONTSYD";
pub const BANK_RESERVES: &str = "WRESBAL";
pub const M2: &str = "M2SL";
pub const MONETARY_BASE: &str = "BOGMBASE";

/// Tracked series, in display order
pub const LIQUIDITY_SERIES: &[SeriesConfig] = &[
    SeriesConfig {
        series_id: M2,
        name: "M2 Money Stock",
        short_name: "M2",
        frequency: Frequency::Monthly,
        raw_unit: RawUnit::Billions,
        description: "Broad money supply: cash, deposits and near-monies.",
        anomaly_threshold: 5.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: "M1SL",
        name: "M1 Money Stock",
        short_name: "M1",
        frequency: Frequency::Monthly,
        raw_unit: RawUnit::Billions,
        description: "Narrow money: cash and checkable deposits.",
        anomaly_threshold: 5.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: REVERSE_REPO,
        name: "Overnight Reverse Repo (RRP)",
        short_name: "RRP",
        frequency: Frequency::Daily,
        raw_unit: RawUnit::Billions,
        description: "Cash parked at the Fed overnight, sterilized from the banking system.",
        anomaly_threshold: 10.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: TREASURY_GENERAL_ACCOUNT,
        name: "Treasury General Account (TGA)",
        short_name: "TGA",
        frequency: Frequency::Weekly,
        raw_unit: RawUnit::Millions,
        description: "The Treasury's operating account at the Fed. Drawdowns add reserves.",
        anomaly_threshold: 15.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: FED_BALANCE_SHEET,
        name: "Fed Total Assets (Balance Sheet)",
        short_name: "Fed BS",
        frequency: Frequency::Weekly,
        raw_unit: RawUnit::Millions,
        description: "Total assets held by the Federal Reserve.",
        anomaly_threshold: 5.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: BANK_RESERVES,
        name: "Bank Reserve Balances",
        short_name: "Reserves",
        frequency: Frequency::Weekly,
        raw_unit: RawUnit::Millions,
        description: "Reserve balances held by depository institutions at the Fed.",
        anomaly_threshold: 10.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: "CURRCIR",
        name: "Currency in Circulation",
        short_name: "Currency",
        frequency: Frequency::Monthly,
        raw_unit: RawUnit::Billions,
        description: "Physical dollars held outside the Fed and the Treasury.",
        anomaly_threshold: 5.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: MONETARY_BASE,
        name: "Monetary Base",
        short_name: "M0",
        frequency: Frequency::Monthly,
        raw_unit: RawUnit::Billions,
        description: "High-powered money: reserves plus currency.",
        anomaly_threshold: 5.0,
        category: Category::Core,
    },
    SeriesConfig {
        series_id: "M2V",
        name: "Velocity of M2 Money Stock",
        short_name: "M2 Velocity",
        frequency: Frequency::Quarterly,
        raw_unit: RawUnit::Index,
        description: "Nominal GDP divided by M2.",
        anomaly_threshold: 5.0,
        category: Category::Velocity,
    },
    SeriesConfig {
        series_id: "M1V",
        name: "Velocity of M1 Money Stock",
        short_name: "M1 Velocity",
        frequency: Frequency::Quarterly,
        raw_unit: RawUnit::Index,
        description: "Nominal GDP divided by M1.",
        anomaly_threshold: 5.0,
        category: Category::Velocity,
    },
    SeriesConfig {
        series_id: "FEDFUNDS",
        name: "Effective Federal Funds Rate",
        short_name: "Fed Funds",
        frequency: Frequency::Monthly,
        raw_unit: RawUnit::Percent,
        description: "Volume-weighted overnight rate between banks.",
        anomaly_threshold: 20.0,
        category: Category::Policy,
    },
    SeriesConfig {
        series_id: "TREAST",
        name: "Treasury Securities Held by Fed",
        short_name: "Fed Treasuries",
        frequency: Frequency::Weekly,
        raw_unit: RawUnit::Millions,
        description: "Treasury holdings on the Fed balance sheet.",
        anomaly_threshold: 5.0,
        category: Category::FedHoldings,
    },
    SeriesConfig {
        series_id: "WSHOMCB",
        name: "Mortgage-Backed Securities Held by Fed",
        short_name: "Fed MBS",
        frequency: Frequency::Weekly,
        raw_unit: RawUnit::Millions,
        description: "Agency MBS holdings on the Fed balance sheet.",
        anomaly_threshold: 5.0,
        category: Category::FedHoldings,
    },
];

/// Latest value of a series and its year-earlier comparator, raw units
#[derive(Debug, Clone, PartialEq)]
pub struct YoyReading {
    pub value: f64,
    pub previous_value: f64,
    pub date: String,
}

/// Picks the latest observation and its comparator from newest-first data
///
/// The comparator is the newest observation within the frequency's
/// tolerance of one year before the latest. When none qualifies the oldest
/// observation is used if it is at least [`MIN_COMPARATOR_DAYS`] old.
/// Returns `None` when there is no usable comparator or it is zero.
pub fn yoy_reading(observations: &[Observation], frequency: Frequency) -> Option<YoyReading> {
    let valid: Vec<(&Observation, NaiveDate, f64)> = observations
        .iter()
        .filter_map(|obs| Some((obs, obs.parsed_date()?, obs.numeric()?)))
        .collect();
    if valid.len() < 2 {
        return None;
    }
    let (latest, latest_date, value) = valid[0];

    let days_before = |date: NaiveDate| (latest_date - date).num_days().abs();
    let tolerance = frequency.comparator_tolerance_days();
    let window = (YEAR_DAYS - tolerance)..=(YEAR_DAYS + tolerance);

    let (_, _, previous_value) = valid[1..]
        .iter()
        .find(|(_, date, _)| window.contains(&days_before(*date)))
        .or_else(|| {
            valid
                .last()
                .filter(|(_, date, _)| days_before(*date) >= MIN_COMPARATOR_DAYS)
        })?;
    if *previous_value == 0.0 {
        return None;
    }

    Some(YoyReading {
        value,
        previous_value: *previous_value,
        date: latest.date.clone(),
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Indicator {
    pub series_id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
    pub value: f64,
    pub display_value: String,
    pub previous_value: f64,
    pub yoy_change: f64,
    pub yoy_change_percent: f64,
    pub date: String,
    pub frequency: Frequency,
    pub unit: &'static str,
    pub raw_unit: RawUnit,
    pub description: &'static str,
    pub is_anomaly: bool,
    pub anomaly_threshold: f64,
    pub category: Category,
}

impl Indicator {
    pub fn from_reading(series: &SeriesConfig, reading: YoyReading) -> Self {
        let value = series.raw_unit.normalize(reading.value);
        let previous_value = series.raw_unit.normalize(reading.previous_value);
        let yoy_change = value - previous_value;
        let yoy_change_percent = yoy_change / previous_value * 100.0;

        Self {
            series_id: series.series_id,
            name: series.name,
            short_name: series.short_name,
            value,
            display_value: series.raw_unit.display(value),
            previous_value,
            yoy_change,
            yoy_change_percent,
            date: reading.date,
            frequency: series.frequency,
            unit: series.raw_unit.display_unit(),
            raw_unit: series.raw_unit,
            description: series.description,
            is_anomaly: yoy_change_percent.abs() > series.anomaly_threshold,
            anomaly_threshold: series.anomaly_threshold,
            category: series.category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedMetric {
    pub id: &'static str,
    pub name: &'static str,
    pub short_name: &'static str,
    pub value: f64,
    pub display_value: String,
    pub description: &'static str,
    pub is_anomaly: bool,
    pub anomaly_threshold: f64,
    pub formula: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Bullish,
    Bearish,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_indicators: usize,
    pub anomaly_count: usize,
    pub overall_signal: Signal,
    pub signal_reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liquidity {
    pub indicators: Vec<Indicator>,
    pub derived_metrics: Vec<DerivedMetric>,
    pub anomalies: Vec<Indicator>,
    pub summary: Summary,
}

fn find<'a>(indicators: &'a [Indicator], series_id: &str) -> Option<&'a Indicator> {
    indicators.iter().find(|indicator| indicator.series_id == series_id)
}

/// Net liquidity, money multiplier and reserve ratio, each only when its
/// inputs resolved
pub fn derived_metrics(indicators: &[Indicator]) -> Vec<DerivedMetric> {
    let fed_bs = find(indicators, FED_BALANCE_SHEET);
    let tga = find(indicators, TREASURY_GENERAL_ACCOUNT);
    let rrp = find(indicators, REVERSE_REPO);
    let m2 = find(indicators, M2);
    let m0 = find(indicators, MONETARY_BASE);
    let reserves = find(indicators, BANK_RESERVES);

    let mut derived = Vec::new();

    if let (Some(fed_bs), Some(tga), Some(rrp)) = (fed_bs, tga, rrp) {
        let net = fed_bs.value - tga.value - rrp.value;
        derived.push(DerivedMetric {
            id: "net_liquidity",
            name: "Net Liquidity Proxy",
            short_name: "Net Liq",
            value: net,
            display_value: display_billions(net),
            description: "Fed balance sheet less the TGA and reverse repo.",
            is_anomaly: net < NET_LIQUIDITY_FLOOR,
            anomaly_threshold: NET_LIQUIDITY_FLOOR,
            formula: "Fed Total Assets - TGA - RRP",
        });
    }

    if let (Some(m2), Some(m0)) = (m2, m0) {
        if m0.value > 0.0 {
            let ratio = m2.value / m0.value;
            derived.push(DerivedMetric {
                id: "debasement_ratio",
                name: "Money Multiplier (Debasement Ratio)",
                short_name: "M2/M0",
                value: ratio,
                display_value: format!("{ratio:.2}x"),
                description: "Broad money per dollar of monetary base.",
                is_anomaly: !MULTIPLIER_RANGE.contains(&ratio),
                anomaly_threshold: *MULTIPLIER_RANGE.end(),
                formula: "M2 Money Stock / Monetary Base",
            });
        }
    }

    if let (Some(reserves), Some(fed_bs)) = (reserves, fed_bs) {
        if fed_bs.value > 0.0 {
            let ratio = reserves.value / fed_bs.value * 100.0;
            derived.push(DerivedMetric {
                id: "reserve_ratio",
                name: "Reserve to Fed Assets Ratio",
                short_name: "Rsv/Fed",
                value: ratio,
                display_value: format!("{ratio:.1}%"),
                description: "Bank reserves as a share of the Fed balance sheet.",
                is_anomaly: !RESERVE_RATIO_RANGE.contains(&ratio),
                anomaly_threshold: *RESERVE_RATIO_RANGE.start(),
                formula: "Bank Reserves / Fed Total Assets",
            });
        }
    }

    derived
}

/// Overall signal and the reasons behind it; ties are neutral
pub fn summarize_signal(indicators: &[Indicator], derived: &[DerivedMetric]) -> (Signal, Vec<String>) {
    let m2 = find(indicators, M2).map(|i| i.yoy_change_percent);
    let fed_bs = find(indicators, FED_BALANCE_SHEET).map(|i| i.yoy_change_percent);
    let rrp = find(indicators, REVERSE_REPO).map(|i| i.yoy_change_percent);
    let net = derived.iter().find(|metric| metric.id == "net_liquidity");

    let mut bullish = Vec::new();
    let mut bearish = Vec::new();

    if let Some(pct) = m2.filter(|pct| *pct > 3.0) {
        bullish.push(format!("M2 expanding +{pct:.1}% YoY"));
    }
    if let Some(pct) = fed_bs.filter(|pct| *pct > 5.0) {
        bullish.push(format!("Fed BS expanding +{pct:.1}% YoY"));
    }
    if let Some(pct) = rrp.filter(|pct| *pct < -20.0) {
        bullish.push(format!("RRP draining {pct:.0}% (liquidity release)"));
    }
    if let Some(net) = net.filter(|net| net.value > NET_LIQUIDITY_HIGH) {
        bullish.push(format!("Net Liquidity high at {}", net.display_value));
    }
    if let Some(pct) = m2.filter(|pct| *pct < -2.0) {
        bearish.push(format!("M2 contracting {pct:.1}% YoY"));
    }
    if let Some(pct) = fed_bs.filter(|pct| *pct < -3.0) {
        bearish.push(format!("Fed BS contracting {pct:.1}% YoY (QT)"));
    }
    if let Some(net) = net.filter(|net| net.value < NET_LIQUIDITY_FLOOR) {
        bearish.push(format!("Net Liquidity dangerously low at {}", net.display_value));
    }

    let signal = match bullish.len().cmp(&bearish.len()) {
        std::cmp::Ordering::Greater => Signal::Bullish,
        std::cmp::Ordering::Less => Signal::Bearish,
        std::cmp::Ordering::Equal => Signal::Neutral,
    };
    bullish.extend(bearish);
    (signal, bullish)
}

impl Liquidity {
    pub fn from_indicators(mut indicators: Vec<Indicator>) -> Self {
        indicators.sort_by_key(|indicator| indicator.category);
        let derived_metrics = derived_metrics(&indicators);
        let anomalies: Vec<Indicator> = indicators.iter().filter(|i| i.is_anomaly).cloned().collect();
        let (overall_signal, signal_reasons) = summarize_signal(&indicators, &derived_metrics);

        Self {
            summary: Summary {
                total_indicators: indicators.len(),
                anomaly_count: anomalies.len(),
                overall_signal,
                signal_reasons,
            },
            indicators,
            derived_metrics,
            anomalies,
        }
    }
}

/// All [`LIQUIDITY_SERIES`] from FRED
#[derive(Debug, Clone)]
pub struct FredLiquidity {
    fred: FredClient,
    series_timeout: Duration,
}

impl FredLiquidity {
    pub fn new(fred: FredClient) -> Self {
        Self {
            fred,
            series_timeout: SERIES_TIMEOUT,
        }
    }

    pub fn with_series_timeout(mut self, series_timeout: Duration) -> Self {
        self.series_timeout = series_timeout;
        self
    }

    async fn resolve(&self, series: &SeriesConfig) -> Result<Option<Indicator>, SourceError> {
        let request = self
            .fred
            .observations(series.series_id, series.frequency.observation_limit());
        let observations = tokio::time::timeout(self.series_timeout, request)
            .await
            .map_err(|_| SourceError::Timeout(self.series_timeout))??;
        Ok(yoy_reading(&observations, series.frequency)
            .map(|reading| Indicator::from_reading(series, reading)))
    }
}

#[async_trait]
impl Source<Liquidity> for FredLiquidity {
    fn name(&self) -> &str {
        "FRED API (liquidity series)"
    }

    fn timeout(&self) -> Duration {
        FETCH_TIMEOUT.max(self.series_timeout + Duration::from_secs(5))
    }

    async fn fetch(&self) -> Result<Liquidity, SourceError> {
        self.fred.api_key()?;

        let results = join_all(LIQUIDITY_SERIES.iter().map(|series| self.resolve(series))).await;

        let mut indicators = Vec::new();
        let mut first_error = None;
        for (series, result) in LIQUIDITY_SERIES.iter().zip(results) {
            match result {
                Ok(Some(indicator)) => indicators.push(indicator),
                Ok(None) => debug!(series = series.series_id, "no year-over-year comparator, skipping"),
                Err(error) => {
                    warn!(series = series.series_id, error = %error, "liquidity series failed");
                    first_error.get_or_insert(error);
                }
            }
        }

        if indicators.is_empty() {
            return Err(first_error.unwrap_or_else(|| SourceError::invalid("no liquidity series resolved")));
        }
        Ok(Liquidity::from_indicators(indicators))
    }
}

pub fn validate(liquidity: &Liquidity) -> Result<(), String> {
    if liquidity.indicators.is_empty() {
        Err("no indicators".to_string())
    } else {
        Ok(())
    }
}

pub fn fallback() -> Liquidity {
    Liquidity::from_indicators(Vec::new())
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<Liquidity> {
    let fred = FredClient::new(
        client.clone(),
        &settings.endpoints.fred,
        settings.fred_api_key.clone(),
    );
    ResourceDescriptor::new(
        "liquidity",
        TimeDelta::minutes(LIQUIDITY_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(FredLiquidity::new(fred))
    .validator(validate)
}
