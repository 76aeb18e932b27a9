//! HTTP surface
//!
//! Every resource is served as `GET <route>` with an optional
//! `?refresh=true` that clears its cache first. Resource handlers always
//! answer 200; upstream trouble shows up as a fallback `origin` in the body.
//!
//! # Routes
//!
//! - `GET /api/health` - liveness plus the state of every cache cell
//! - `GET /api/bitcoin/{dominance,volume,network-stats}`
//! - `GET /api/crypto/global-metrics`
//! - `GET /api/financial/{inflation,treasury,treasury-fiscal,markets}`
//! - `GET /api/liquidity`, `/api/whale-alerts`, `/api/options-flow`

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::AppError;
use crate::service::{Dashboard, ResourceKind};

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    refresh: Option<String>,
}

impl RefreshQuery {
    fn requested(&self) -> bool {
        self.refresh.as_deref() == Some("true")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!(error = %self, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

async fn resource(
    dashboard: Arc<Dashboard>,
    kind: ResourceKind,
    query: RefreshQuery,
) -> Result<Json<serde_json::Value>, AppError> {
    let refresh = query.requested();
    if refresh {
        info!(resource = %kind, "refresh requested");
    }
    Ok(Json(dashboard.get_json(kind, refresh).await?))
}

async fn health(State(dashboard): State<Arc<Dashboard>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "caches": dashboard.cache_status(),
    }))
}

pub fn router(dashboard: Arc<Dashboard>) -> Router {
    let mut router = Router::new().route("/api/health", get(health));
    for kind in ResourceKind::ALL {
        router = router.route(
            kind.route(),
            get(
                move |State(dashboard): State<Arc<Dashboard>>, Query(query): Query<RefreshQuery>| {
                    resource(dashboard, kind, query)
                },
            ),
        );
    }
    router.with_state(dashboard)
}

/// Binds `addr` and serves until Ctrl-C
pub async fn run(dashboard: Arc<Dashboard>, addr: &str) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr).await.map_err(|source| AppError::Bind {
        addr: addr.to_string(),
        source,
    })?;

    info!(addr, resources = ResourceKind::ALL.len(), "dashboard listening");

    axum::serve(listener, router(dashboard))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
        .map_err(AppError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Endpoints, Settings};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use httpmock::MockServer;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn dashboard_at(base_url: &str) -> Arc<Dashboard> {
        let settings = Settings {
            endpoints: Endpoints::all_at(base_url),
            ..Settings::default()
        };
        Arc::new(Dashboard::new(&settings).expect("client builds"))
    }

    async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_health_lists_caches() {
        let app = router(dashboard_at("http://127.0.0.1:9"));

        let (status, body) = get_json(&app, "/api/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["caches"].as_array().map(Vec::len), Some(ResourceKind::ALL.len() + 1));
    }

    #[tokio::test]
    async fn test_failing_upstream_still_answers_ok() {
        let app = router(dashboard_at("http://127.0.0.1:9"));

        let (status, body) = get_json(&app, "/api/financial/treasury").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["origin"], "fallback");
        assert_eq!(body["yield"], 4.25);
    }

    #[tokio::test]
    async fn test_refresh_query_bypasses_cache() {
        let server = MockServer::start();
        let stats = server.mock(|when, then| {
            when.method("GET").path("/stats");
            then.status(200).json_body(json!({
                "hash_rate": 800_000_000_000.0,
                "difficulty": 100_000_000_000_000.0,
                "minutes_between_blocks": 9.8
            }));
        });
        let app = router(dashboard_at(&server.base_url()));

        let (_, first) = get_json(&app, "/api/bitcoin/network-stats").await;
        let (_, second) = get_json(&app, "/api/bitcoin/network-stats").await;
        stats.assert_hits(1);
        assert_eq!(first, second);
        assert_eq!(first["source"], "Blockchain.com");
        assert_eq!(first["hashRateEH"], 800.0);

        get_json(&app, "/api/bitcoin/network-stats?refresh=true").await;
        stats.assert_hits(2);

        get_json(&app, "/api/bitcoin/network-stats?refresh=false").await;
        stats.assert_hits(2);
    }

    #[tokio::test]
    async fn test_markets_route_serves_yahoo_quotes() {
        let server = MockServer::start();
        for (symbol, price) in [("DX-Y.NYB", 104.0), ("GC=F", 2700.0), ("%5EGSPC", 6000.0), ("%5EVIX", 15.0)] {
            server.mock(|when, then| {
                when.method("GET").path(format!("/v8/finance/chart/{symbol}"));
                then.status(200).json_body(json!({
                    "chart": { "result": [{ "meta": { "regularMarketPrice": price } }] }
                }));
            });
        }
        let app = router(dashboard_at(&server.base_url()));

        let (status, body) = get_json(&app, "/api/financial/markets").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["source"], "Yahoo Finance");
        assert_eq!(body["origin"], "live");
        assert_eq!(body["gold"]["value"], 2700.0);
        assert_eq!(body["vix"]["estimated"], false);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = router(dashboard_at("http://127.0.0.1:9"));

        let response = app
            .oneshot(Request::builder().uri("/api/bitcoin/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
