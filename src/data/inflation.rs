//! US CPI inflation from FRED (series CPIAUCSL)

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::fred::{FredClient, Observation};
use super::round_to;
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const INFLATION_TTL_MINUTES: i64 = 60;

pub const CPI_SERIES: &str = "CPIAUCSL";

/// Two years of monthly observations
const OBSERVATION_LIMIT: u32 = 24;

/// Index of the same month one year earlier in a newest-first list
const YEAR_AGO_INDEX: usize = 12;

pub const FALLBACK_RATE: f64 = 2.4;
pub const FALLBACK_CHANGE: f64 = 0.1;
pub const FALLBACK_LABEL: &str = "Fallback estimate";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Inflation {
    /// Year-over-year CPI change in percent, 2 dp
    pub rate: f64,
    /// Month-over-month CPI change in percent, 3 dp
    pub change: f64,
}

/// Computes YoY and MoM inflation from newest-first CPI observations
///
/// The latest and year-ago observations are both required; if either is
/// missing or not numeric the whole computation fails rather than produce
/// a NaN. The previous month only feeds `change` and counts as zero change
/// when absent.
pub fn inflation_from_observations(observations: &[Observation]) -> Result<Inflation, SourceError> {
    let required = |index: usize, label: &str| {
        observations
            .get(index)
            .and_then(Observation::numeric)
            .ok_or_else(|| SourceError::invalid(format!("{label} CPI observation missing or not numeric")))
    };

    let current = required(0, "current")?;
    let year_ago = required(YEAR_AGO_INDEX, "year-ago")?;
    if year_ago == 0.0 {
        return Err(SourceError::invalid("year-ago CPI is zero"));
    }

    let rate = (current - year_ago) / year_ago * 100.0;
    let change = match observations.get(1).and_then(Observation::numeric) {
        Some(previous) if previous != 0.0 => (current - previous) / previous * 100.0,
        _ => 0.0,
    };

    Ok(Inflation {
        rate: round_to(rate, 2),
        change: round_to(change, 3),
    })
}

/// CPI from FRED
#[derive(Debug, Clone)]
pub struct FredCpi {
    fred: FredClient,
}

impl FredCpi {
    pub fn new(fred: FredClient) -> Self {
        Self { fred }
    }
}

#[async_trait]
impl Source<Inflation> for FredCpi {
    fn name(&self) -> &str {
        "FRED API (CPIAUCSL)"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<Inflation, SourceError> {
        let observations = self.fred.observations(CPI_SERIES, OBSERVATION_LIMIT).await?;
        inflation_from_observations(&observations)
    }
}

pub fn validate(inflation: &Inflation) -> Result<(), String> {
    if inflation.rate.is_finite() && inflation.change.is_finite() {
        Ok(())
    } else {
        Err("inflation values are not finite".to_string())
    }
}

pub fn fallback() -> Inflation {
    Inflation {
        rate: FALLBACK_RATE,
        change: FALLBACK_CHANGE,
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<Inflation> {
    let fred = FredClient::new(
        client.clone(),
        &settings.endpoints.fred,
        settings.fred_api_key.clone(),
    );
    ResourceDescriptor::new(
        "inflation",
        TimeDelta::minutes(INFLATION_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(FredCpi::new(fred))
    .validator(validate)
}
