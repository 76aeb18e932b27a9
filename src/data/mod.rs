//! Upstream adapters and the normalized types they produce
//!
//! Each submodule owns one resource: its payload type, the `Source`
//! implementations for its providers, its validator and fallback constant,
//! and a `descriptor` function wiring them together.

pub mod dominance;
pub mod fiscal;
pub mod fred;
pub mod global;
pub mod inflation;
pub mod liquidity;
pub mod markets;
pub mod network;
pub mod options;
pub mod price;
pub mod treasury;
pub mod volume;
pub mod whales;
pub mod yahoo;

pub use dominance::Dominance;
pub use fiscal::TreasuryFiscal;
pub use global::GlobalMetrics;
pub use inflation::Inflation;
pub use liquidity::Liquidity;
pub use markets::FinancialMarkets;
pub use network::NetworkStats;
pub use options::OptionsFlow;
pub use price::BtcPrice;
pub use treasury::TreasuryYield;
pub use volume::Volume;
pub use whales::WhaleAlerts;

use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;

use crate::fetch::SourceError;

/// Sends `request` and decodes a 2xx JSON body
///
/// Non-2xx statuses become `SourceError::Status`; bodies that are not the
/// expected shape become `SourceError::Decode`.
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, SourceError> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::Status(status));
    }
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Parses a numeric string field, rejecting empties and non-finite values
pub(crate) fn parse_number(field: &str, raw: &str) -> Result<f64, SourceError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| SourceError::invalid(format!("{field} is not numeric: {raw:?}")))
}

/// Rounds to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10_f64.powi(places);
    (value * factor).round() / factor
}
