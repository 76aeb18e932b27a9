//! Federal Reserve Economic Data (FRED) observations
//!
//! FRED reports missing values as the literal string `"."`; `Observation`
//! keeps the raw text and callers decide which observations they require.

use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;

use super::get_json;
use crate::fetch::SourceError;

/// Name of the credential FRED sources need
pub const FRED_KEY_NAME: &str = "FRED_API_KEY";

/// FRED's missing-value sentinel
pub const MISSING_VALUE: &str = ".";

/// One dated value of a FRED series
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Observation {
    pub date: String,
    pub value: String,
}

impl Observation {
    /// The value as a number, or `None` for the sentinel and other junk
    pub fn numeric(&self) -> Option<f64> {
        if self.value == MISSING_VALUE {
            return None;
        }
        self.value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
    }

    pub fn parsed_date(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d").ok()
    }
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    observations: Vec<Observation>,
}

/// Thin client for `/fred/series/observations`
#[derive(Debug, Clone)]
pub struct FredClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl FredClient {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key,
        }
    }

    /// The configured key, or `MissingCredential`
    pub fn api_key(&self) -> Result<&str, SourceError> {
        self.api_key
            .as_deref()
            .ok_or(SourceError::MissingCredential(FRED_KEY_NAME))
    }

    /// Fetches the newest `limit` observations of `series_id`, newest first
    ///
    /// Fails with `MissingCredential` before any request when no key is set.
    pub async fn observations(&self, series_id: &str, limit: u32) -> Result<Vec<Observation>, SourceError> {
        let api_key = self.api_key()?;

        let limit = limit.to_string();
        let request = self
            .client
            .get(format!("{}/fred/series/observations", self.base_url))
            .query(&[
                ("series_id", series_id),
                ("api_key", api_key),
                ("file_type", "json"),
                ("limit", limit.as_str()),
                ("sort_order", "desc"),
            ]);
        let response: ObservationsResponse = get_json(request).await?;
        Ok(response.observations)
    }
}
