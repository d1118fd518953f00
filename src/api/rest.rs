// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// `/health` plus everything under `/api/v1/`. Any other path is served from
// the configured public directory; the browser dashboard ships in `public/`.
//
// CORS is configured permissively; the board is read-mostly and carries no
// credentials.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::info;

use crate::app_state::AppState;
use crate::runtime_config::REFRESH_INTERVAL_RANGE;
use crate::symbol_aggregator::run_refresh_cycle;
use crate::timeframe_analysis::TimeframeSnapshot;
use crate::tracked_symbols::{normalize_symbol, AddOutcome};

// =============================================================================
// Router construction
// =============================================================================

/// Build the full router with CORS middleware, static fallback and shared
/// state.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public_dir = state.runtime_config.read().public_dir.clone();

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/dashboard", get(dashboard))
        .route("/api/v1/refresh", post(refresh_now))
        .route("/api/v1/symbols", get(list_symbols).post(add_symbol))
        .route("/api/v1/symbols/:symbol", delete(remove_symbol))
        .route("/api/v1/chart/:symbol/:interval", get(chart))
        .route(
            "/api/v1/refresh-interval",
            get(get_refresh_interval).post(set_refresh_interval),
        )
        .route("/api/v1/ws", get(crate::api::ws::ws_handler))
        .fallback_service(ServeDir::new(public_dir))
        .layer(cors)
        .with_state(state)
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

// =============================================================================
// Health
// =============================================================================

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// =============================================================================
// Dashboard
// =============================================================================

async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.build_snapshot())
}

/// Run a refresh cycle now and return the resulting board.
async fn refresh_now(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = run_refresh_cycle(&state).await;
    info!(
        epoch = report.epoch,
        failed = report.failed,
        published = report.published,
        "manual refresh via API"
    );
    Json(state.build_snapshot())
}

// =============================================================================
// Tracked symbols
// =============================================================================

async fn list_symbols(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({ "symbols": state.tracked_symbols() }))
}

#[derive(Deserialize)]
struct AddSymbolRequest {
    symbol: String,
}

async fn add_symbol(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddSymbolRequest>,
) -> Response {
    let outcome = state.add_symbol(&req.symbol);
    match outcome {
        AddOutcome::Added(_) => {
            // Fill in the new row without waiting for the next tick.
            let cycle_state = Arc::clone(&state);
            tokio::spawn(async move {
                run_refresh_cycle(&cycle_state).await;
            });
            (StatusCode::CREATED, Json(outcome)).into_response()
        }
        AddOutcome::AlreadyTracked(_) => (StatusCode::OK, Json(outcome)).into_response(),
        AddOutcome::Invalid => api_error(
            StatusCode::BAD_REQUEST,
            format!("'{}' is not a valid symbol", req.symbol),
        ),
    }
}

async fn remove_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Response {
    match state.remove_symbol(&symbol) {
        Some(removed) => Json(serde_json::json!({ "removed": removed })).into_response(),
        None => api_error(StatusCode::NOT_FOUND, format!("'{symbol}' is not tracked")),
    }
}

// =============================================================================
// Chart data
// =============================================================================

#[derive(Serialize)]
struct ChartResponse {
    symbol: String,
    interval: String,
    snapshot: Arc<TimeframeSnapshot>,
}

async fn chart(
    State(state): State<Arc<AppState>>,
    Path((symbol, interval)): Path<(String, String)>,
) -> Response {
    let Some(symbol) = normalize_symbol(&symbol) else {
        return api_error(StatusCode::BAD_REQUEST, "empty symbol");
    };

    match state.chart_cache.get(&symbol, &interval) {
        Some(snapshot) => Json(ChartResponse {
            symbol,
            interval,
            snapshot,
        })
        .into_response(),
        None => {
            let cached = state.chart_cache.intervals(&symbol);
            (
                StatusCode::NOT_FOUND,
                Json(serde_json::json!({
                    "error": format!("no chart data for {symbol} {interval}"),
                    "cached_intervals": cached,
                })),
            )
                .into_response()
        }
    }
}

// =============================================================================
// Auto-refresh period
// =============================================================================

#[derive(Serialize)]
struct RefreshIntervalResponse {
    refresh_interval_secs: u64,
    min_secs: u64,
    max_secs: u64,
}

impl RefreshIntervalResponse {
    fn new(secs: u64) -> Self {
        Self {
            refresh_interval_secs: secs,
            min_secs: *REFRESH_INTERVAL_RANGE.start(),
            max_secs: *REFRESH_INTERVAL_RANGE.end(),
        }
    }
}

#[derive(Deserialize)]
struct RefreshIntervalRequest {
    refresh_interval_secs: u64,
}

async fn get_refresh_interval(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(RefreshIntervalResponse::new(state.refresh_interval().as_secs()))
}

async fn set_refresh_interval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshIntervalRequest>,
) -> Response {
    match state.set_refresh_interval(req.refresh_interval_secs) {
        Ok(secs) => Json(RefreshIntervalResponse::new(secs)).into_response(),
        Err(e) => api_error(StatusCode::BAD_REQUEST, e),
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::tests::test_state;
    use crate::market_data::source::testing::StaticSource;
    use axum::body::Body;
    use axum::http::{header, Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    const ALL: [&str; 4] = ["1d", "4h", "1h", "15m"];

    fn source() -> StaticSource {
        let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        StaticSource::new()
            .with_symbol("BTCUSDT", 101.0, &closes, &ALL)
            .with_symbol("ETHUSDT", 99.0, &closes, &ALL)
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_is_ok() {
        let state = Arc::new(test_state("rest-health", &[], StaticSource::new()));
        let (status, body) = call(router(state), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn refresh_populates_dashboard_and_chart() {
        let state = Arc::new(test_state("rest-refresh", &["BTCUSDT", "NOPEUSDT"], source()));

        let (status, body) = call(router(state.clone()), Method::POST, "/api/v1/refresh", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["epoch"], 1);
        let rows = body["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["status"], "loaded");
        assert_eq!(rows[0]["display_pair"], "BTC/USDT");
        assert_eq!(rows[0]["timeframes"].as_array().unwrap().len(), 4);
        assert_eq!(rows[1]["status"], "failed");
        assert_eq!(body["recent_errors"].as_array().unwrap().len(), 1);

        let (status, body) = call(router(state.clone()), Method::GET, "/api/v1/chart/btc/4h", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "BTCUSDT");
        assert_eq!(body["snapshot"]["series"]["closes"].as_array().unwrap().len(), 80);

        let (status, body) = call(router(state.clone()), Method::GET, "/api/v1/chart/BTCUSDT/1w", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["cached_intervals"], serde_json::json!(["15m", "1d", "1h", "4h"]));

        let (status, _) = call(router(state), Method::GET, "/api/v1/chart/ETHUSDT/4h", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn symbol_management() {
        let state = Arc::new(test_state("rest-symbols", &["BTCUSDT"], source()));

        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/v1/symbols",
            Some(serde_json::json!({ "symbol": "eth" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, serde_json::json!({ "outcome": "added", "symbol": "ETHUSDT" }));

        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/v1/symbols",
            Some(serde_json::json!({ "symbol": "ETHUSDT" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["outcome"], "already_tracked");

        let (status, _) = call(
            router(state.clone()),
            Method::POST,
            "/api/v1/symbols",
            Some(serde_json::json!({ "symbol": "--" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, body) = call(router(state.clone()), Method::GET, "/api/v1/symbols", None).await;
        assert_eq!(body["symbols"], serde_json::json!(["BTCUSDT", "ETHUSDT"]));

        let (status, body) = call(router(state.clone()), Method::DELETE, "/api/v1/symbols/btcusdt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["removed"], "BTCUSDT");

        let (status, _) = call(router(state), Method::DELETE, "/api/v1/symbols/BTCUSDT", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn refresh_interval_get_and_set() {
        let state = Arc::new(test_state("rest-interval", &[], StaticSource::new()));

        let (_, body) = call(router(state.clone()), Method::GET, "/api/v1/refresh-interval", None).await;
        assert_eq!(body["refresh_interval_secs"], 60);
        assert_eq!(body["min_secs"], 5);
        assert_eq!(body["max_secs"], 3600);

        let (status, _) = call(
            router(state.clone()),
            Method::POST,
            "/api/v1/refresh-interval",
            Some(serde_json::json!({ "refresh_interval_secs": 4000 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(
            router(state.clone()),
            Method::POST,
            "/api/v1/refresh-interval",
            Some(serde_json::json!({ "refresh_interval_secs": 30 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refresh_interval_secs"], 30);
        assert_eq!(state.refresh_interval().as_secs(), 30);
    }

    #[tokio::test]
    async fn bundled_dashboard_page_is_served_at_root() {
        let state = test_state("rest-root", &[], StaticSource::new());
        state.runtime_config.write().public_dir =
            concat!(env!("CARGO_MANIFEST_DIR"), "/public").to_string();

        let app = router(Arc::new(state));
        for uri in ["/", "/app.js"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
        }
    }

    #[tokio::test]
    async fn unknown_paths_are_served_from_public_dir() {
        let state = test_state("rest-static", &[], StaticSource::new());
        let dir = std::env::temp_dir().join(format!("signal-board-public-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("index.html"), "<h1>board</h1>").unwrap();
        state.runtime_config.write().public_dir = dir.display().to_string();

        let app = router(Arc::new(state));
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/index.html").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>board</h1>");

        let response = app
            .oneshot(Request::builder().uri("/missing.js").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
