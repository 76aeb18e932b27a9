//! Bitcoin network statistics from Blockchain.com

use async_trait::async_trait;
use chrono::TimeDelta;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{get_json, round_to};
use crate::config::Settings;
use crate::fetch::{Fallback, ResourceDescriptor, Source, SourceError};

pub const NETWORK_TTL_MINUTES: i64 = 5;

/// 1 EH/s = 10^9 TH/s
pub const TH_PER_EH: f64 = 1_000_000_000.0;

pub const FALLBACK_HASH_RATE_TH: f64 = 900_345_494_013.0;
pub const FALLBACK_DIFFICULTY: f64 = 83_148_355_189_239.0;
pub const FALLBACK_BLOCK_TIME_MINUTES: f64 = 10.0;
pub const FALLBACK_LABEL: &str = "Fallback estimate";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    /// Hash rate in TH/s
    pub hash_rate: f64,
    /// Hash rate in EH/s, 1 dp
    #[serde(rename = "hashRateEH")]
    pub hash_rate_eh: f64,
    pub difficulty: f64,
    /// Mean minutes between recent blocks
    pub avg_block_time: f64,
}

impl NetworkStats {
    pub fn new(hash_rate: f64, difficulty: f64, avg_block_time: f64) -> Self {
        Self {
            hash_rate,
            hash_rate_eh: round_to(hash_rate / TH_PER_EH, 1),
            difficulty,
            avg_block_time,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BlockchainStats {
    hash_rate: f64,
    difficulty: f64,
    minutes_between_blocks: f64,
}

/// `api.blockchain.info/stats`
#[derive(Debug, Clone)]
pub struct BlockchainStatsSource {
    client: Client,
    base_url: String,
}

impl BlockchainStatsSource {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Source<NetworkStats> for BlockchainStatsSource {
    fn name(&self) -> &str {
        "Blockchain.com"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn fetch(&self) -> Result<NetworkStats, SourceError> {
        let request = self
            .client
            .get(format!("{}/stats", self.base_url))
            .header("Accept", "application/json");
        let stats: BlockchainStats = get_json(request).await?;

        Ok(NetworkStats::new(
            stats.hash_rate,
            stats.difficulty,
            stats.minutes_between_blocks,
        ))
    }
}

pub fn validate(stats: &NetworkStats) -> Result<(), String> {
    if stats.hash_rate <= 0.0 {
        return Err(format!("hash rate {} is not positive", stats.hash_rate));
    }
    if stats.difficulty <= 0.0 {
        return Err(format!("difficulty {} is not positive", stats.difficulty));
    }
    Ok(())
}

pub fn fallback() -> NetworkStats {
    NetworkStats::new(
        FALLBACK_HASH_RATE_TH,
        FALLBACK_DIFFICULTY,
        FALLBACK_BLOCK_TIME_MINUTES,
    )
}

pub fn descriptor(client: &Client, settings: &Settings) -> ResourceDescriptor<NetworkStats> {
    ResourceDescriptor::new(
        "network-stats",
        TimeDelta::minutes(NETWORK_TTL_MINUTES),
        Fallback {
            label: FALLBACK_LABEL,
            value: fallback,
        },
    )
    .source(BlockchainStatsSource::new(
        client.clone(),
        &settings.endpoints.blockchain_api,
    ))
    .validator(validate)
}
