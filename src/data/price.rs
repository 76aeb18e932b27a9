//! Spot BTC/USD price from CoinGecko
//!
//! Used internally to value whale transactions.

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::get_json;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const PRICE_TTL_MINUTES: i64 = 5;

/// Last-resort price when CoinGecko is unreachable
pub const FALLBACK_PRICE_USD: f64 = 60_000.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BtcPrice {
    pub usd: f64,
}

#[derive(Debug, Deserialize)]
struct SimplePriceResponse {
    bitcoin: SimplePrice,
}

#[derive(Debug, Deserialize)]
struct SimplePrice {
    usd: Option<f64>,
}

/// CoinGecko `/simple/price` for bitcoin in USD
#[derive(Debug, Clone)]
pub struct CoinGeckoPrice {
    client: Client,
    base_url: String,
}

impl CoinGeckoPrice {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Source<BtcPrice> for CoinGeckoPrice {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn fetch(&self) -> Result<BtcPrice, SourceError> {
        let request = self
            .client
            .get(format!("{}/simple/price", self.base_url))
            .query(&[("ids", "bitcoin"), ("vs_currencies", "usd")]);
        let response: SimplePriceResponse = get_json(request).await?;

        let usd = response
            .bitcoin
            .usd
            .ok_or_else(|| SourceError::invalid("bitcoin.usd missing"))?;
        Ok(BtcPrice { usd })
    }
}

pub fn validate(price: &BtcPrice) -> Result<(), String> {
    if price.usd > 0.0 {
        Ok(())
    } else {
        Err(format!("price {} is not positive", price.usd))
    }
}

pub fn fallback() -> BtcPrice {
    BtcPrice {
        usd: FALLBACK_PRICE_USD,
    }
}

pub fn descriptor(client: &Client, coingecko_url: &str) -> ResourceDescriptor<BtcPrice> {
    ResourceDescriptor::new(
        "btc-price",
        TimeDelta::minutes(PRICE_TTL_MINUTES),
        Fallback {
            label: "Default price",
            value: fallback,
        },
    )
    .source(CoinGeckoPrice::new(client.clone(), coingecko_url))
    .validator(validate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::MockServer;
    use serde_json::json;

    #[tokio::test]
    async fn test_fetch_parses_price() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET")
                .path("/simple/price")
                .query_param("ids", "bitcoin");
            then.status(200).json_body(json!({ "bitcoin": { "usd": 97_250.5 } }));
        });

        let source = CoinGeckoPrice::new(Client::new(), server.base_url());
        let price = source.fetch().await.expect("price should parse");

        assert_eq!(price.usd, 97_250.5);
        mock.assert();
    }

    #[tokio::test]
    async fn test_fetch_rejects_missing_price() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/simple/price");
            then.status(200).json_body(json!({ "bitcoin": {} }));
        });

        let source = CoinGeckoPrice::new(Client::new(), server.base_url());
        let error = source.fetch().await.unwrap_err();

        assert!(matches!(error, SourceError::InvalidPayload(_)));
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(validate(&BtcPrice { usd: 0.0 }).is_err());
        assert!(validate(&fallback()).is_ok());
    }
}
