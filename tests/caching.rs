//! End-to-end caching and fallback behavior against mocked upstreams
//!
//! Every provider is pointed at one `MockServer` and time is driven by a
//! `ManualClock`, so TTL expiry is exercised without sleeping.

use chrono::{TimeDelta, TimeZone, Utc};
use httpmock::MockServer;
use serde_json::{json, Value};
use std::sync::Arc;

use bitcoinhub::cache::ManualClock;
use bitcoinhub::config::{Endpoints, Settings};
use bitcoinhub::fetch::Origin;
use bitcoinhub::{Dashboard, ResourceKind};

fn start_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap()))
}

fn dashboard(server: &MockServer, clock: &Arc<ManualClock>, keys: bool) -> Dashboard {
    let settings = Settings {
        fred_api_key: keys.then(|| "fred-key".to_string()),
        cmc_api_key: keys.then(|| "cmc-key".to_string()),
        endpoints: Endpoints::all_at(&server.base_url()),
        ..Settings::default()
    };
    Dashboard::with_clock(&settings, clock.clone()).expect("client builds")
}

async fn get(dashboard: &Dashboard, kind: ResourceKind) -> Value {
    dashboard.get_json(kind, false).await.expect("serializable")
}

#[tokio::test]
async fn test_fresh_value_served_without_upstream_hits() {
    let server = MockServer::start();
    let global = server.mock(|when, then| {
        when.method("GET").path("/global");
        then.status(200).json_body(json!({
            "data": {
                "market_cap_percentage": { "btc": 63.5 },
                "total_market_cap": { "usd": 3.5e12 }
            }
        }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, false);

    let first = get(&dashboard, ResourceKind::Dominance).await;
    assert_eq!(first["dominance"], 63.5);
    assert_eq!(first["source"], "CoinGecko Global");
    assert_eq!(first["origin"], "live");

    clock.advance(TimeDelta::seconds(299));
    let second = get(&dashboard, ResourceKind::Dominance).await;
    assert_eq!(first, second);
    global.assert_hits(1);

    clock.advance(TimeDelta::seconds(1));
    get(&dashboard, ResourceKind::Dominance).await;
    global.assert_hits(2);
}

#[tokio::test]
async fn test_secondary_source_is_attributed() {
    let server = MockServer::start();
    let global = server.mock(|when, then| {
        when.method("GET").path("/global");
        then.status(500);
    });
    let cmc = server.mock(|when, then| {
        when.method("GET")
            .path("/v1/global-metrics/quotes/latest")
            .header("x-cmc_pro_api_key", "cmc-key");
        then.status(200).json_body(json!({
            "data": { "btc_dominance": 58.2, "quote": { "USD": { "total_market_cap": 3.3e12 } } }
        }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, true);

    let value = get(&dashboard, ResourceKind::Dominance).await;

    assert_eq!(value["dominance"], 58.2);
    assert_eq!(value["source"], "CoinMarketCap");
    assert_eq!(value["origin"], "live");
    global.assert();
    cmc.assert();
}

#[tokio::test]
async fn test_fallback_is_cached_until_expiry() {
    let server = MockServer::start();
    let coingecko = server.mock(|when, then| {
        when.method("GET").path("/simple/price");
        then.status(503);
    });
    let binance = server.mock(|when, then| {
        when.method("GET").path("/api/v3/ticker/24hr");
        then.status(503);
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, false);

    let value = get(&dashboard, ResourceKind::Volume).await;
    assert_eq!(value["origin"], "fallback");
    assert_eq!(value["source"], "Market Estimate");
    assert_eq!(value["volume24h"], 95_000_000_000.0);

    get(&dashboard, ResourceKind::Volume).await;
    coingecko.assert_hits(1);
    binance.assert_hits(1);

    clock.advance(TimeDelta::minutes(2));
    get(&dashboard, ResourceKind::Volume).await;
    coingecko.assert_hits(2);
    binance.assert_hits(2);
}

#[tokio::test]
async fn test_zero_volume_falls_through_to_binance() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET").path("/simple/price");
        then.status(200)
            .json_body(json!({ "bitcoin": { "usd": 97_000.0, "usd_24h_vol": 0 } }));
    });
    server.mock(|when, then| {
        when.method("GET").path("/api/v3/ticker/24hr");
        then.status(200)
            .json_body(json!({ "quoteVolume": "1000000000", "priceChangePercent": "-0.5" }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, false);

    let value = get(&dashboard, ResourceKind::Volume).await;

    assert_eq!(value["source"], "Binance (Estimated Market)");
    assert_eq!(value["volume24h"], 4_000_000_000.0);
    assert_eq!(value["volumeChange24h"], -0.5);
}

#[tokio::test]
async fn test_missing_year_ago_cpi_serves_fallback() {
    let server = MockServer::start();
    let observations: Vec<Value> = (0..24)
        .map(|i| {
            let value = if i == 12 { ".".to_string() } else { format!("{}", 320 - i) };
            json!({ "date": format!("month-{i}"), "value": value })
        })
        .collect();
    let fred = server.mock(|when, then| {
        when.method("GET")
            .path("/fred/series/observations")
            .query_param("series_id", "CPIAUCSL")
            .query_param("api_key", "fred-key");
        then.status(200).json_body(json!({ "observations": observations }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, true);

    let value = get(&dashboard, ResourceKind::Inflation).await;

    assert_eq!(value["origin"], "fallback");
    assert_eq!(value["source"], "Fallback estimate");
    assert_eq!(value["rate"], 2.4);
    assert_eq!(value["change"], 0.1);
    fred.assert();
}

#[tokio::test]
async fn test_refresh_clears_before_reading() {
    let server = MockServer::start();
    let stats = server.mock(|when, then| {
        when.method("GET").path("/stats");
        then.status(200).json_body(json!({
            "hash_rate": 820_000_000_000.0,
            "difficulty": 109_000_000_000_000.0,
            "minutes_between_blocks": 10.1
        }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, false);

    get(&dashboard, ResourceKind::NetworkStats).await;
    dashboard
        .get_json(ResourceKind::NetworkStats, true)
        .await
        .expect("serializable");
    stats.assert_hits(2);

    dashboard.clear(ResourceKind::NetworkStats);
    get(&dashboard, ResourceKind::NetworkStats).await;
    stats.assert_hits(3);
}

#[tokio::test]
async fn test_whale_alerts_reuse_cached_price() {
    let server = MockServer::start();
    let price = server.mock(|when, then| {
        when.method("GET")
            .path("/simple/price")
            .query_param("vs_currencies", "usd");
        then.status(200).json_body(json!({ "bitcoin": { "usd": 90_000.0 } }));
    });
    let pool = server.mock(|when, then| {
        when.method("GET").path("/unconfirmed-transactions");
        then.status(200).json_body(json!({
            "txs": [{
                "hash": "f00d",
                "time": 1_736_942_400,
                "inputs": [{ "prev_out": { "addr": "bc1qsender", "value": 20_000_000_000_u64 } }],
                "out": [{ "addr": "bc1qreceiver", "value": 20_000_000_000_u64 }]
            }]
        }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, false);

    let first = get(&dashboard, ResourceKind::WhaleAlerts).await;
    assert_eq!(first["transactions"][0]["amount"], 200.0);
    assert_eq!(first["transactions"][0]["amountUSD"], 18_000_000.0);

    clock.advance(TimeDelta::minutes(3));
    get(&dashboard, ResourceKind::WhaleAlerts).await;

    pool.assert_hits(2);
    price.assert_hits(1);

    let cached_price = dashboard.btc_price().cached().expect("price cached");
    assert_eq!(cached_price.data.origin, Origin::Live);
    assert_eq!(cached_price.data.data.usd, 90_000.0);
}

#[tokio::test]
async fn test_missing_treasury_values_fall_through_to_yahoo() {
    let server = MockServer::start();
    let fred = server.mock(|when, then| {
        when.method("GET")
            .path("/fred/series/observations")
            .query_param("series_id", "DGS10");
        then.status(200).json_body(json!({
            "observations": [
                { "date": "2025-01-15", "value": "." },
                { "date": "2025-01-14", "value": "." },
                { "date": "2025-01-13", "value": "." }
            ]
        }));
    });
    let yahoo = server.mock(|when, then| {
        when.method("GET").path("/v8/finance/chart/%5ETNX");
        then.status(200).json_body(json!({
            "chart": {
                "result": [{ "meta": { "regularMarketPrice": 4.62, "chartPreviousClose": 4.5 } }],
                "error": null
            }
        }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, true);

    let value = get(&dashboard, ResourceKind::Treasury).await;

    assert_eq!(value["source"], "Yahoo Finance (^TNX)");
    assert_eq!(value["origin"], "live");
    assert_eq!(value["yield"], 4.62);
    assert_eq!(value["change"], 0.12);
    fred.assert();
    yahoo.assert();
}

#[tokio::test]
async fn test_failed_liquidity_series_keep_resolved_ones() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method("GET")
            .path("/fred/series/observations")
            .query_param("series_id", "M2SL");
        then.status(200).json_body(json!({
            "observations": [
                { "date": "2025-01-01", "value": "21000" },
                { "date": "2024-01-01", "value": "20500" }
            ]
        }));
    });
    let clock = start_clock();
    let dashboard = dashboard(&server, &clock, true);

    let value = get(&dashboard, ResourceKind::Liquidity).await;

    assert_eq!(value["origin"], "live");
    assert_eq!(value["summary"]["totalIndicators"], 1);
    assert_eq!(value["indicators"][0]["seriesId"], "M2SL");
}
