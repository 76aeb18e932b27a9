//! Yahoo Finance `v8/finance/chart` metadata

use reqwest::Client;
use serde::Deserialize;

use super::get_json;
use crate::fetch::SourceError;

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

/// The quote fields we read from a chart's `meta` block
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    pub regular_market_price: Option<f64>,
    pub regular_market_change_percent: Option<f64>,
    pub previous_close: Option<f64>,
    pub chart_previous_close: Option<f64>,
}

impl ChartMeta {
    /// Last close, preferring `previousClose` over the chart's own
    pub fn last_close(&self) -> Option<f64> {
        self.previous_close.or(self.chart_previous_close)
    }
}

#[derive(Debug, Clone)]
pub struct YahooChartClient {
    client: Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Chart metadata for `symbol`, which must already be path-encoded
    /// (`%5ETNX` for `^TNX`)
    pub async fn meta(&self, symbol: &str) -> Result<ChartMeta, SourceError> {
        let request = self
            .client
            .get(format!("{}/v8/finance/chart/{}", self.base_url, symbol));
        let response: ChartResponse = get_json(request).await?;

        response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .map(|result| result.meta)
            .ok_or_else(|| SourceError::invalid(format!("chart.result is empty for {symbol}")))
    }
}
