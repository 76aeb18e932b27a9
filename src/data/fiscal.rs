//! US federal debt from the Treasury's Fiscal Data service
//!
//! Two datasets are read concurrently: "Debt to the Penny" for outstanding
//! debt and "Average Interest Rates" for the weighted rate on
//! interest-bearing debt. Both must answer for the source to succeed.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{get_json, parse_number, round_to};
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const FISCAL_TTL_MINUTES: i64 = 5;

pub const US_POPULATION: f64 = 335_000_000.0;
pub const US_TAXPAYERS: f64 = 160_000_000.0;
/// Nominal GDP used for the debt-to-GDP ratio (~$27T)
pub const US_GDP: f64 = 27_000_000_000_000.0;
/// Daily increase estimate as a fraction of total debt
pub const DAILY_INCREASE_RATE: f64 = 0.0001;

/// Security description of the aggregate row in the rates dataset
const TOTAL_INTEREST_BEARING: &str = "Total Interest-bearing Debt";

/// Latest month plus the same month a year earlier
const RATE_RECORDS: usize = 13;

pub const FALLBACK_TOTAL_DEBT: f64 = 35_400_000_000_000.0;
pub const FALLBACK_PUBLIC_DEBT: f64 = 26_800_000_000_000.0;
pub const FALLBACK_INTRAGOVERNMENTAL: f64 = 8_600_000_000_000.0;
pub const FALLBACK_AVERAGE_RATE: f64 = 3.25;
pub const FALLBACK_MONTHLY_CHANGE: f64 = 0.08;
pub const FALLBACK_YEARLY_CHANGE: f64 = 0.95;
pub const FALLBACK_LABEL: &str = "Fallback estimate";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtToPenny {
    pub total_debt: f64,
    pub public_debt: f64,
    pub intergovernmental_holdings: f64,
    /// Record date of the figures, `YYYY-MM-DD`
    pub date_of_data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AverageInterestRates {
    pub weighted_average_rate: f64,
    pub monthly_change: f64,
    pub year_over_year_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtStatistics {
    pub debt_per_citizen: f64,
    pub debt_per_taxpayer: f64,
    #[serde(rename = "debtToGDP")]
    pub debt_to_gdp: f64,
    pub daily_increase: f64,
}

impl DebtStatistics {
    pub fn from_total(total_debt: f64) -> Self {
        Self {
            debt_per_citizen: round_to(total_debt / US_POPULATION, 2),
            debt_per_taxpayer: round_to(total_debt / US_TAXPAYERS, 2),
            debt_to_gdp: round_to(total_debt / US_GDP * 100.0, 2),
            daily_increase: round_to(total_debt * DAILY_INCREASE_RATE, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreasuryFiscal {
    pub debt_to_penny: DebtToPenny,
    pub average_interest_rates: AverageInterestRates,
    pub debt_statistics: DebtStatistics,
}

#[derive(Debug, Deserialize)]
struct FiscalResponse<R> {
    data: Vec<R>,
}

#[derive(Debug, Deserialize)]
struct DebtRecord {
    record_date: String,
    tot_pub_debt_out_amt: String,
    debt_held_public_amt: String,
    intragov_hold_amt: String,
}

#[derive(Debug, Deserialize)]
struct RateRecord {
    avg_interest_rate_amt: String,
}

fn debt_from_records(records: &[DebtRecord]) -> Result<DebtToPenny, SourceError> {
    let latest = records
        .first()
        .ok_or_else(|| SourceError::invalid("debt_to_penny returned no records"))?;

    Ok(DebtToPenny {
        total_debt: parse_number("tot_pub_debt_out_amt", &latest.tot_pub_debt_out_amt)?,
        public_debt: parse_number("debt_held_public_amt", &latest.debt_held_public_amt)?,
        intergovernmental_holdings: parse_number("intragov_hold_amt", &latest.intragov_hold_amt)?,
        date_of_data: latest.record_date.clone(),
    })
}

/// Monthly change uses the previous record; the yearly change uses the
/// record twelve months back and degrades to the monthly change when the
/// dataset is shorter than that.
fn rates_from_records(records: &[RateRecord]) -> Result<AverageInterestRates, SourceError> {
    let rate_at = |index: usize| {
        records
            .get(index)
            .map(|record| parse_number("avg_interest_rate_amt", &record.avg_interest_rate_amt))
            .transpose()
    };

    let current = rate_at(0)?.ok_or_else(|| SourceError::invalid("avg_interest_rates returned no records"))?;
    let monthly_change = rate_at(1)?.map_or(0.0, |previous| current - previous);
    let year_over_year_change = rate_at(RATE_RECORDS - 1)?.map_or(monthly_change, |year_ago| current - year_ago);

    Ok(AverageInterestRates {
        weighted_average_rate: current,
        monthly_change: round_to(monthly_change, 3),
        year_over_year_change: round_to(year_over_year_change, 3),
    })
}

/// `debt_to_penny` and `avg_interest_rates` together
#[derive(Debug, Clone)]
pub struct FiscalDataSource {
    client: Client,
    base_url: String,
}

impl FiscalDataSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn debt_records(&self) -> Result<Vec<DebtRecord>, SourceError> {
        let request = self
            .client
            .get(format!("{}/accounting/od/debt_to_penny", self.base_url))
            .query(&[("format", "json"), ("sort", "-record_date"), ("page_size", "5")]);
        let response: FiscalResponse<DebtRecord> = get_json(request).await?;
        Ok(response.data)
    }

    async fn rate_records(&self) -> Result<Vec<RateRecord>, SourceError> {
        let filter = format!("security_desc:eq:{TOTAL_INTEREST_BEARING}");
        let page_size = RATE_RECORDS.to_string();
        let request = self
            .client
            .get(format!("{}/accounting/od/avg_interest_rates", self.base_url))
            .query(&[
                ("format", "json"),
                ("sort", "-record_date"),
                ("filter", filter.as_str()),
                ("page_size", page_size.as_str()),
            ]);
        let response: FiscalResponse<RateRecord> = get_json(request).await?;
        Ok(response.data)
    }
}

#[async_trait]
impl Source<TreasuryFiscal> for FiscalDataSource {
    fn name(&self) -> &str {
        "Treasury Fiscal Data"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<TreasuryFiscal, SourceError> {
        let (debt, rates) = tokio::try_join!(self.debt_records(), self.rate_records())?;

        let debt_to_penny = debt_from_records(&debt)?;
        let average_interest_rates = rates_from_records(&rates)?;
        let debt_statistics = DebtStatistics::from_total(debt_to_penny.total_debt);

        Ok(TreasuryFiscal {
            debt_to_penny,
            average_interest_rates,
            debt_statistics,
        })
    }
}

pub fn validate(fiscal: &TreasuryFiscal) -> Result<(), String> {
    if fiscal.debt_to_penny.total_debt > 0.0 {
        Ok(())
    } else {
        Err(format!("total debt {} is not positive", fiscal.debt_to_penny.total_debt))
    }
}

pub fn fallback() -> TreasuryFiscal {
    TreasuryFiscal {
        debt_to_penny: DebtToPenny {
            total_debt: FALLBACK_TOTAL_DEBT,
            public_debt: FALLBACK_PUBLIC_DEBT,
            intergovernmental_holdings: FALLBACK_INTRAGOVERNMENTAL,
            date_of_data: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
        },
        average_interest_rates: AverageInterestRates {
            weighted_average_rate: FALLBACK_AVERAGE_RATE,
            monthly_change: FALLBACK_MONTHLY_CHANGE,
            year_over_year_change: FALLBACK_YEARLY_CHANGE,
        },
        debt_statistics: DebtStatistics::from_total(FALLBACK_TOTAL_DEBT),
    }
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<TreasuryFiscal> {
    ResourceDescriptor::new(
        "treasury-fiscal",
        TimeDelta::minutes(FISCAL_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(FiscalDataSource::new(client.clone(), &settings.endpoints.fiscal_data))
    .validator(validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use serde_json::json;

    fn rate_rows(rates: &[&str]) -> serde_json::Value {
        let rows: Vec<_> = rates
            .iter()
            .map(|rate| json!({ "security_desc": TOTAL_INTEREST_BEARING, "avg_interest_rate_amt": rate }))
            .collect();
        json!({ "data": rows })
    }

    #[tokio::test]
    async fn test_fetches_both_datasets() {
        let server = MockServer::start();
        let debt = server.mock(|when, then| {
            when.method("GET")
                .path("/accounting/od/debt_to_penny")
                .query_param("sort", "-record_date");
            then.status(200).json_body(json!({
                "data": [{
                    "record_date": "2025-01-17",
                    "tot_pub_debt_out_amt": "36000000000000.00",
                    "debt_held_public_amt": "28800000000000.00",
                    "intragov_hold_amt": "7200000000000.00"
                }]
            }));
        });
        let rates = server.mock(|when, then| {
            when.method("GET")
                .path("/accounting/od/avg_interest_rates")
                .query_param("page_size", "13");
            then.status(200).json_body(rate_rows(&["3.300", "3.250"]));
        });

        let source = FiscalDataSource::new(Client::new(), server.base_url());
        let fiscal = source.fetch().await.expect("should parse");

        assert_eq!(fiscal.debt_to_penny.total_debt, 36e12);
        assert_eq!(fiscal.debt_to_penny.date_of_data, "2025-01-17");
        assert_eq!(fiscal.average_interest_rates.weighted_average_rate, 3.3);
        assert_eq!(fiscal.average_interest_rates.monthly_change, 0.05);
        assert_eq!(fiscal.average_interest_rates.year_over_year_change, 0.05);
        assert_eq!(fiscal.debt_statistics.debt_to_gdp, 133.33);
        assert_eq!(fiscal.debt_statistics.debt_per_taxpayer, 225_000.0);
        assert_eq!(fiscal.debt_statistics.daily_increase, 3_600_000_000.0);
        debt.assert();
        rates.assert();
    }

    #[tokio::test]
    async fn test_one_failing_dataset_fails_source() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/accounting/od/debt_to_penny");
            then.status(503);
        });
        server.mock(|when, then| {
            when.method("GET").path("/accounting/od/avg_interest_rates");
            then.status(200).json_body(rate_rows(&["3.3"]));
        });

        let source = FiscalDataSource::new(Client::new(), server.base_url());
        let error = source.fetch().await.unwrap_err();

        assert!(matches!(error, SourceError::Status(_)));
    }

    #[test]
    fn test_yearly_change_uses_twelve_months_back() {
        let mut rates = vec!["3.0"; RATE_RECORDS];
        rates[0] = "3.4";
        rates[1] = "3.35";
        let records: Vec<RateRecord> = rates
            .iter()
            .map(|rate| RateRecord {
                avg_interest_rate_amt: rate.to_string(),
            })
            .collect();

        let parsed = rates_from_records(&records).expect("complete");

        assert_eq!(parsed.monthly_change, 0.05);
        assert_eq!(parsed.year_over_year_change, 0.4);
    }

    #[test]
    fn test_empty_debt_records_are_invalid() {
        assert!(matches!(
            debt_from_records(&[]),
            Err(SourceError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_fallback_statistics_follow_debt() {
        let fallback = fallback();
        assert_eq!(fallback.debt_statistics.debt_per_citizen, 105_671.64);
        assert_eq!(fallback.debt_statistics.debt_per_taxpayer, 221_250.0);
        assert_eq!(fallback.debt_statistics.debt_to_gdp, 131.11);
        assert!(validate(&fallback).is_ok());
    }
}
