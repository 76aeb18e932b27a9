//! The dashboard: every resource behind its own cache, addressable by name
//!
//! `Dashboard` owns one `CachedResource` per resource plus the internal
//! `btc-price` resource shared with whale alerts. Callers pick a resource
//! with `ResourceKind` and get back its `Sourced` JSON.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::cache::{Clock, SystemClock};
use crate::config::Settings;
use crate::data::{
    dominance, fiscal, global, inflation, liquidity, markets, network, options, price, treasury,
    volume, whales, BtcPrice, Dominance, FinancialMarkets, GlobalMetrics, Inflation, Liquidity,
    NetworkStats, OptionsFlow, TreasuryFiscal, TreasuryYield, Volume, WhaleAlerts,
};
use crate::fetch::{CachedResource, Origin};

/// A resource exposed by the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Dominance,
    Volume,
    NetworkStats,
    GlobalMetrics,
    Inflation,
    Treasury,
    TreasuryFiscal,
    FinancialMarkets,
    Liquidity,
    WhaleAlerts,
    OptionsFlow,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::Dominance,
        ResourceKind::Volume,
        ResourceKind::NetworkStats,
        ResourceKind::GlobalMetrics,
        ResourceKind::Inflation,
        ResourceKind::Treasury,
        ResourceKind::TreasuryFiscal,
        ResourceKind::FinancialMarkets,
        ResourceKind::Liquidity,
        ResourceKind::WhaleAlerts,
        ResourceKind::OptionsFlow,
    ];

    /// Stable name used in logs, the CLI and cache status
    pub fn name(self) -> &'static str {
        match self {
            ResourceKind::Dominance => "dominance",
            ResourceKind::Volume => "volume",
            ResourceKind::NetworkStats => "network-stats",
            ResourceKind::GlobalMetrics => "global-metrics",
            ResourceKind::Inflation => "inflation",
            ResourceKind::Treasury => "treasury",
            ResourceKind::TreasuryFiscal => "treasury-fiscal",
            ResourceKind::FinancialMarkets => "financial-markets",
            ResourceKind::Liquidity => "liquidity",
            ResourceKind::WhaleAlerts => "whale-alerts",
            ResourceKind::OptionsFlow => "options-flow",
        }
    }

    /// HTTP route serving the resource
    pub fn route(self) -> &'static str {
        match self {
            ResourceKind::Dominance => "/api/bitcoin/dominance",
            ResourceKind::Volume => "/api/bitcoin/volume",
            ResourceKind::NetworkStats => "/api/bitcoin/network-stats",
            ResourceKind::GlobalMetrics => "/api/crypto/global-metrics",
            ResourceKind::Inflation => "/api/financial/inflation",
            ResourceKind::Treasury => "/api/financial/treasury",
            ResourceKind::TreasuryFiscal => "/api/financial/treasury-fiscal",
            ResourceKind::FinancialMarkets => "/api/financial/markets",
            ResourceKind::Liquidity => "/api/liquidity",
            ResourceKind::WhaleAlerts => "/api/whale-alerts",
            ResourceKind::OptionsFlow => "/api/options-flow",
        }
    }

    /// Looks a resource up by name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|kind| kind.name() == s)
    }

    /// Comma-separated list of every resource name
    pub fn names() -> String {
        Self::ALL.map(ResourceKind::name).join(", ")
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static catalogue entry for `list`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    pub name: &'static str,
    pub route: &'static str,
    pub ttl_seconds: i64,
    pub sources: Vec<String>,
    pub fallback: &'static str,
}

/// What a resource's cache cell currently holds
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
    pub name: &'static str,
    pub cached_at: Option<DateTime<Utc>>,
    pub is_expired: Option<bool>,
    pub source: Option<String>,
    pub origin: Option<Origin>,
}

fn info<T>(kind: ResourceKind, resource: &CachedResource<T>) -> ResourceInfo
where
    T: Clone + Send + Sync + 'static,
{
    let descriptor = resource.descriptor();
    ResourceInfo {
        name: descriptor.name,
        route: kind.route(),
        ttl_seconds: descriptor.ttl.num_seconds(),
        sources: descriptor.source_names().into_iter().map(String::from).collect(),
        fallback: descriptor.fallback.label,
    }
}

fn status<T>(resource: &CachedResource<T>) -> CacheStatus
where
    T: Clone + Send + Sync + 'static,
{
    let cached = resource.cached();
    CacheStatus {
        name: resource.name(),
        cached_at: cached.as_ref().map(|c| c.cached_at),
        is_expired: cached.as_ref().map(|c| c.is_expired),
        source: cached.as_ref().map(|c| c.data.source.clone()),
        origin: cached.as_ref().map(|c| c.data.origin),
    }
}

async fn resolve<T>(resource: &CachedResource<T>, refresh: bool) -> serde_json::Result<Value>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let sourced = if refresh {
        resource.refresh().await
    } else {
        resource.get().await
    };
    serde_json::to_value(sourced)
}

/// Applies the same generic expression to whichever resource `kind` names
macro_rules! dispatch {
    ($self:ident, $kind:expr, $resource:ident => $body:expr) => {
        match $kind {
            ResourceKind::Dominance => {
                let $resource = &$self.dominance;
                $body
            }
            ResourceKind::Volume => {
                let $resource = &$self.volume;
                $body
            }
            ResourceKind::NetworkStats => {
                let $resource = &$self.network_stats;
                $body
            }
            ResourceKind::GlobalMetrics => {
                let $resource = &$self.global_metrics;
                $body
            }
            ResourceKind::Inflation => {
                let $resource = &$self.inflation;
                $body
            }
            ResourceKind::Treasury => {
                let $resource = &$self.treasury;
                $body
            }
            ResourceKind::TreasuryFiscal => {
                let $resource = &$self.treasury_fiscal;
                $body
            }
            ResourceKind::FinancialMarkets => {
                let $resource = &$self.financial_markets;
                $body
            }
            ResourceKind::Liquidity => {
                let $resource = &$self.liquidity;
                $body
            }
            ResourceKind::WhaleAlerts => {
                let $resource = &$self.whale_alerts;
                $body
            }
            ResourceKind::OptionsFlow => {
                let $resource = &$self.options_flow;
                $body
            }
        }
    };
}

pub struct Dashboard {
    btc_price: Arc<CachedResource<BtcPrice>>,
    dominance: CachedResource<Dominance>,
    volume: CachedResource<Volume>,
    network_stats: CachedResource<NetworkStats>,
    global_metrics: CachedResource<GlobalMetrics>,
    inflation: CachedResource<Inflation>,
    treasury: CachedResource<TreasuryYield>,
    treasury_fiscal: CachedResource<TreasuryFiscal>,
    financial_markets: CachedResource<FinancialMarkets>,
    liquidity: CachedResource<Liquidity>,
    whale_alerts: CachedResource<WhaleAlerts>,
    options_flow: CachedResource<OptionsFlow>,
}

impl Dashboard {
    pub fn new(settings: &Settings) -> reqwest::Result<Self> {
        Self::with_clock(settings, Arc::new(SystemClock))
    }

    /// Builds every resource against `clock`; one HTTP client is shared
    pub fn with_clock(settings: &Settings, clock: Arc<dyn Clock>) -> reqwest::Result<Self> {
        let client = settings.http_client()?;

        let btc_price = Arc::new(CachedResource::with_clock(
            price::descriptor(&client, &settings.endpoints.coingecko),
            clock.clone(),
        ));

        Ok(Self {
            dominance: CachedResource::with_clock(dominance::descriptor(&client, settings), clock.clone()),
            volume: CachedResource::with_clock(volume::descriptor(&client, settings), clock.clone()),
            network_stats: CachedResource::with_clock(network::descriptor(&client, settings), clock.clone()),
            global_metrics: CachedResource::with_clock(global::descriptor(&client, settings), clock.clone()),
            inflation: CachedResource::with_clock(inflation::descriptor(&client, settings), clock.clone()),
            treasury: CachedResource::with_clock(treasury::descriptor(&client, settings), clock.clone()),
            treasury_fiscal: CachedResource::with_clock(fiscal::descriptor(&client, settings), clock.clone()),
            financial_markets: CachedResource::with_clock(markets::descriptor(&client, settings), clock.clone()),
            liquidity: CachedResource::with_clock(liquidity::descriptor(&client, settings), clock.clone()),
            whale_alerts: CachedResource::with_clock(
                whales::descriptor(&client, settings, btc_price.clone()),
                clock.clone(),
            ),
            options_flow: CachedResource::with_clock(options::descriptor(&client, settings), clock.clone()),
            btc_price,
        })
    }

    /// Resolves `kind` (from cache when fresh) as `Sourced` JSON
    ///
    /// With `refresh` the resource's cache is cleared first.
    pub async fn get_json(&self, kind: ResourceKind, refresh: bool) -> serde_json::Result<Value> {
        dispatch!(self, kind, resource => resolve(resource, refresh).await)
    }

    pub fn clear(&self, kind: ResourceKind) {
        dispatch!(self, kind, resource => resource.clear())
    }

    pub fn info(&self, kind: ResourceKind) -> ResourceInfo {
        dispatch!(self, kind, resource => info(kind, resource))
    }

    pub fn catalogue(&self) -> Vec<ResourceInfo> {
        ResourceKind::ALL.into_iter().map(|kind| self.info(kind)).collect()
    }

    /// Cache state of every resource, `btc-price` included
    pub fn cache_status(&self) -> Vec<CacheStatus> {
        let mut statuses: Vec<CacheStatus> = ResourceKind::ALL
            .into_iter()
            .map(|kind| dispatch!(self, kind, resource => status(resource)))
            .collect();
        statuses.push(status(&self.btc_price));
        statuses
    }

    pub fn btc_price(&self) -> &CachedResource<BtcPrice> {
        &self.btc_price
    }

    pub fn dominance(&self) -> &CachedResource<Dominance> {
        &self.dominance
    }

    pub fn inflation(&self) -> &CachedResource<Inflation> {
        &self.inflation
    }

    pub fn treasury(&self) -> &CachedResource<TreasuryYield> {
        &self.treasury
    }

    pub fn whale_alerts(&self) -> &CachedResource<WhaleAlerts> {
        &self.whale_alerts
    }
}
