//! Large unconfirmed Bitcoin transactions ("whale alerts")
//!
//! Transactions come from Blockchain.com's unconfirmed pool and are valued
//! with the cached `btc-price` resource.

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::get_json;
use super::price::BtcPrice;
use crate::config::Settings;
use crate::fetch::{CachedResource, Fallback, ResourceDescriptor, Source, SourceError};

pub const WHALES_TTL_MINUTES: i64 = 2;

pub const SATOSHIS_PER_BTC: f64 = 100_000_000.0;

/// Minimum total output for a transaction to count as a whale move
pub const WHALE_THRESHOLD_BTC: f64 = 100.0;
pub const HIGH_SIGNIFICANCE_BTC: f64 = 1_000.0;
pub const MEDIUM_SIGNIFICANCE_BTC: f64 = 500.0;

/// Most recent whale transactions kept in the response
pub const MAX_TRANSACTIONS: usize = 20;

pub const UNKNOWN_ADDRESS: &str = "Unknown";

pub const FALLBACK_LABEL: &str = "Fallback (no data)";

/// Addresses attributed to major exchanges
pub const KNOWN_EXCHANGES: &[&str] = &[
    "1NDyJtNTjmwk5xPNhjgAMu4HDHigtobu1s",
    "34xp4vRoCGJym3xR7yCVPFHoCNxv4Twseo",
    "3D2oetdNuZUqQHPJmcMDDHYoqkyNVsFk9r",
    "bc1qgdjqv0av3q56jvd82tkdjpy7gdp9ut8tlqmgrpmv24sq90ecnvqqjwvw97",
    "bc1qa5wkgaew2dkv56kfvj49j0av5nml45x9ek9hz6",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    LargeTransfer,
    ExchangeInflow,
    ExchangeOutflow,
}

impl TransactionType {
    pub fn classify(from: &str, to: &str) -> Self {
        let from_exchange = KNOWN_EXCHANGES.contains(&from);
        let to_exchange = KNOWN_EXCHANGES.contains(&to);
        match (from_exchange, to_exchange) {
            (true, false) => TransactionType::ExchangeOutflow,
            (false, true) => TransactionType::ExchangeInflow,
            _ => TransactionType::LargeTransfer,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Significance {
    High,
    Medium,
    Low,
}

impl Significance {
    pub fn for_amount(btc: f64) -> Self {
        if btc >= HIGH_SIGNIFICANCE_BTC {
            Significance::High
        } else if btc >= MEDIUM_SIGNIFICANCE_BTC {
            Significance::Medium
        } else {
            Significance::Low
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhaleTransaction {
    pub hash: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    /// Total output in BTC
    pub amount: f64,
    #[serde(rename = "amountUSD")]
    pub amount_usd: f64,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub significance: Significance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhaleAlerts {
    pub transactions: Vec<WhaleTransaction>,
    /// BTC price used for the USD values
    pub current_price: f64,
    /// USD value of every whale transaction seen, not only those listed
    pub total_volume_24h: f64,
    pub largest_transaction: Option<WhaleTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct UnconfirmedResponse {
    #[serde(default)]
    pub txs: Vec<RawTransaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTransaction {
    pub hash: String,
    /// Seconds since the Unix epoch
    pub time: i64,
    #[serde(default)]
    pub inputs: Vec<RawInput>,
    #[serde(default)]
    pub out: Vec<RawOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawInput {
    pub prev_out: Option<RawOutput>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawOutput {
    /// Satoshis
    #[serde(default)]
    pub value: u64,
    pub addr: Option<String>,
}

impl RawTransaction {
    fn amount_btc(&self) -> f64 {
        let satoshis: u64 = self.out.iter().map(|output| output.value).sum();
        satoshis as f64 / SATOSHIS_PER_BTC
    }

    fn sender(&self) -> &str {
        self.inputs
            .first()
            .and_then(|input| input.prev_out.as_ref())
            .and_then(|prev| prev.addr.as_deref())
            .unwrap_or(UNKNOWN_ADDRESS)
    }

    fn recipient(&self) -> &str {
        self.out
            .first()
            .and_then(|output| output.addr.as_deref())
            .unwrap_or(UNKNOWN_ADDRESS)
    }
}

/// Filters, classifies and ranks raw pool transactions
pub fn whale_alerts(transactions: &[RawTransaction], btc_price: f64) -> WhaleAlerts {
    let mut whales: Vec<WhaleTransaction> = transactions
        .iter()
        .filter_map(|tx| {
            let amount = tx.amount_btc();
            if amount < WHALE_THRESHOLD_BTC {
                return None;
            }
            let (from, to) = (tx.sender(), tx.recipient());
            Some(WhaleTransaction {
                hash: tx.hash.clone(),
                timestamp: tx.time * 1_000,
                amount,
                amount_usd: amount * btc_price,
                from: from.to_string(),
                to: to.to_string(),
                kind: TransactionType::classify(from, to),
                significance: Significance::for_amount(amount),
            })
        })
        .collect();

    let total_volume_24h = whales.iter().map(|tx| tx.amount_usd).sum();
    let largest_transaction = whales
        .iter()
        .fold(None::<&WhaleTransaction>, |largest, tx| match largest {
            Some(current) if current.amount >= tx.amount => Some(current),
            _ => Some(tx),
        })
        .cloned();

    whales.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    whales.truncate(MAX_TRANSACTIONS);

    WhaleAlerts {
        transactions: whales,
        current_price: btc_price,
        total_volume_24h,
        largest_transaction,
    }
}

/// Blockchain.com unconfirmed transactions valued at the cached BTC price
pub struct BlockchainWhales {
    client: Client,
    base_url: String,
    price: Arc<CachedResource<BtcPrice>>,
}

impl BlockchainWhales {
    pub fn new(client: Client, base_url: impl Into<String>, price: Arc<CachedResource<BtcPrice>>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            price,
        }
    }
}

#[async_trait]
impl Source<WhaleAlerts> for BlockchainWhales {
    fn name(&self) -> &str {
        "Blockchain.com"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<WhaleAlerts, SourceError> {
        let request = self
            .client
            .get(format!("{}/unconfirmed-transactions", self.base_url))
            .query(&[("format", "json")]);

        let (price, response) = tokio::join!(
            self.price.get(),
            get_json::<UnconfirmedResponse>(request)
        );

        Ok(whale_alerts(&response?.txs, price.data.usd))
    }
}

pub fn fallback() -> WhaleAlerts {
    WhaleAlerts {
        transactions: Vec::new(),
        current_price: 0.0,
        total_volume_24h: 0.0,
        largest_transaction: None,
    }
}

pub fn descriptor(
    client: &Client,
    settings: &Settings,
    price: Arc<CachedResource<BtcPrice>>,
) -> ResourceDescriptor<WhaleAlerts> {
    ResourceDescriptor::new(
        "whale-alerts",
        TimeDelta::minutes(WHALES_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(BlockchainWhales::new(
        client.clone(),
        &settings.endpoints.blockchain_info,
        price,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::price;
    use httpmock::MockServer;
    use serde_json::json;

    fn tx(hash: &str, time: i64, btc: f64, from: Option<&str>, to: Option<&str>) -> RawTransaction {
        RawTransaction {
            hash: hash.to_string(),
            time,
            inputs: vec![RawInput {
                prev_out: Some(RawOutput {
                    value: 0,
                    addr: from.map(str::to_string),
                }),
            }],
            out: vec![RawOutput {
                value: (btc * SATOSHIS_PER_BTC) as u64,
                addr: to.map(str::to_string),
            }],
        }
    }

    #[test]
    fn test_classification() {
        let exchange = KNOWN_EXCHANGES[0];
        assert_eq!(TransactionType::classify(exchange, "bc1qwallet"), TransactionType::ExchangeOutflow);
        assert_eq!(TransactionType::classify("bc1qwallet", exchange), TransactionType::ExchangeInflow);
        assert_eq!(TransactionType::classify(exchange, KNOWN_EXCHANGES[1]), TransactionType::LargeTransfer);
        assert_eq!(TransactionType::classify("a", "b"), TransactionType::LargeTransfer);
    }

    #[test]
    fn test_significance_tiers() {
        assert_eq!(Significance::for_amount(1_000.0), Significance::High);
        assert_eq!(Significance::for_amount(999.9), Significance::Medium);
        assert_eq!(Significance::for_amount(500.0), Significance::Medium);
        assert_eq!(Significance::for_amount(100.0), Significance::Low);
    }

    #[test]
    fn test_filters_small_transactions_and_totals() {
        let transactions = vec![
            tx("small", 100, 99.5, Some("a"), Some("b")),
            tx("big", 200, 1_200.0, Some("a"), Some(KNOWN_EXCHANGES[2])),
            tx("mid", 300, 600.0, None, None),
        ];

        let alerts = whale_alerts(&transactions, 50_000.0);

        let hashes: Vec<_> = alerts.transactions.iter().map(|tx| tx.hash.as_str()).collect();
        assert_eq!(hashes, vec!["mid", "big"]);
        assert_eq!(alerts.total_volume_24h, 90_000_000.0);
        assert_eq!(alerts.current_price, 50_000.0);

        let largest = alerts.largest_transaction.expect("largest");
        assert_eq!(largest.hash, "big");
        assert_eq!(largest.kind, TransactionType::ExchangeInflow);
        assert_eq!(largest.timestamp, 200_000);

        let mid = &alerts.transactions[0];
        assert_eq!(mid.from, UNKNOWN_ADDRESS);
        assert_eq!(mid.to, UNKNOWN_ADDRESS);
        assert_eq!(mid.significance, Significance::Medium);
    }

    #[test]
    fn test_keeps_twenty_most_recent() {
        let transactions: Vec<_> = (0..25)
            .map(|i| tx(&format!("tx{i}"), i, 150.0, None, None))
            .collect();

        let alerts = whale_alerts(&transactions, 1.0);

        assert_eq!(alerts.transactions.len(), MAX_TRANSACTIONS);
        assert_eq!(alerts.transactions[0].hash, "tx24");
        assert_eq!(alerts.transactions[19].hash, "tx5");
        assert_eq!(alerts.total_volume_24h, 25.0 * 150.0);
    }

    #[test]
    fn test_serialized_field_names() {
        let alerts = whale_alerts(&[tx("h", 1, 100.0, None, None)], 2.0);
        let json = serde_json::to_value(&alerts).expect("serialize");

        assert_eq!(json["transactions"][0]["type"], "large_transfer");
        assert_eq!(json["transactions"][0]["amountUSD"], 200.0);
        assert_eq!(json["totalVolume24h"], 200.0);
        assert_eq!(json["largestTransaction"]["significance"], "low");
    }

    #[tokio::test]
    async fn test_fetch_values_with_cached_price() {
        let server = MockServer::start();
        let price_mock = server.mock(|when, then| {
            when.method("GET").path("/simple/price");
            then.status(200).json_body(json!({ "bitcoin": { "usd": 100_000.0 } }));
        });
        let pool = server.mock(|when, then| {
            when.method("GET")
                .path("/unconfirmed-transactions")
                .query_param("format", "json");
            then.status(200).json_body(json!({
                "txs": [{
                    "hash": "abc",
                    "time": 1_737_000_000,
                    "inputs": [{ "prev_out": { "addr": KNOWN_EXCHANGES[0], "value": 50_000_000_000_u64 } }],
                    "out": [
                        { "addr": "bc1qcold", "value": 40_000_000_000_u64 },
                        { "addr": "bc1qchange", "value": 9_999_000_000_u64 }
                    ]
                }]
            }));
        });

        let client = Client::new();
        let price = Arc::new(CachedResource::new(price::descriptor(&client, &server.base_url())));
        let source = BlockchainWhales::new(client, server.base_url(), price.clone());

        let alerts = source.fetch().await.expect("should parse");
        source.fetch().await.expect("second fetch");

        assert_eq!(alerts.transactions.len(), 1);
        assert_eq!(alerts.transactions[0].amount, 499.99);
        assert_eq!(alerts.transactions[0].kind, TransactionType::ExchangeOutflow);
        assert_eq!(alerts.current_price, 100_000.0);
        price_mock.assert();
        pool.assert_hits(2);
    }

    #[tokio::test]
    async fn test_price_and_pool_requests_overlap() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/simple/price");
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(json!({ "bitcoin": { "usd": 95_000.0 } }));
        });
        server.mock(|when, then| {
            when.method("GET").path("/unconfirmed-transactions");
            then.status(200)
                .delay(Duration::from_millis(800))
                .json_body(json!({ "txs": [] }));
        });

        let client = Client::new();
        let price = Arc::new(CachedResource::new(price::descriptor(&client, &server.base_url())));
        let source = BlockchainWhales::new(client, server.base_url(), price.clone());

        let started = std::time::Instant::now();
        let alerts = source.fetch().await.expect("should parse");

        assert!(started.elapsed() < Duration::from_millis(1_500));
        assert_eq!(alerts.current_price, 95_000.0);
        assert!(price.cached().is_some());
    }
}
