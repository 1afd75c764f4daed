// =============================================================================
// REST API Endpoints — Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/` and return JSON. The browser dashboard
// renders charts, tables and metric cards from these payloads.
//
// Per-symbol failures never fail a whole dashboard request: each symbol gets
// its own error message and the rest are still served.
//
// CORS is configured permissively for development; tighten `allowed_origins`
// in production.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::dashboard::metrics::NOT_ENOUGH_DATA;
use crate::dashboard::{build_table, catalog, summary_metrics, SummaryMetrics, TableRow};
use crate::provider::DataProvider;
use crate::store::{combine_entries, ExportSummary};
use crate::types::{normalize_symbol, EnrichedSeries, Period};

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS middleware and shared state.
pub fn router<P: DataProvider + 'static>(state: Arc<AppState<P>>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health::<P>))
        .route("/api/v1/catalog", get(get_catalog::<P>))
        .route("/api/v1/series/:symbol", get(series::<P>))
        .route("/api/v1/metrics/:symbol", get(metrics::<P>))
        .route("/api/v1/dashboard", get(dashboard::<P>))
        .route("/api/v1/refresh", post(refresh::<P>))
        .route("/api/v1/cache/clear", post(clear_cache::<P>))
        .route("/api/v1/export", post(export::<P>))
        .route("/api/v1/errors", get(errors::<P>))
        .layer(cors)
        .with_state(state)
}

// =============================================================================
// Query helpers
// =============================================================================

#[derive(Debug, Deserialize)]
struct PeriodQuery {
    period: Option<String>,
}

fn resolve_period(raw: Option<&str>, default: Period) -> Result<Period, ApiError> {
    match raw {
        None => Ok(default),
        Some(s) if s.trim().is_empty() => Ok(default),
        Some(s) => s
            .parse()
            .map_err(|e: anyhow::Error| api_error(StatusCode::BAD_REQUEST, e.to_string())),
    }
}

/// Load one symbol, mapping failures to HTTP errors and logging them.
async fn load_one<P: DataProvider>(
    state: &AppState<P>,
    raw_symbol: &str,
    period: Period,
) -> Result<Arc<EnrichedSeries>, ApiError> {
    let symbol = normalize_symbol(raw_symbol)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    match state.load_series(&symbol, period).await {
        Ok(series) if series.is_empty() => {
            let message = format!("no data returned for {symbol}");
            state.push_error(&symbol, message.clone());
            Err(api_error(StatusCode::NOT_FOUND, message))
        }
        Ok(series) => Ok(series),
        Err(e) => {
            warn!(%symbol, %period, error = %e, "failed to load series");
            state.push_error(&symbol, format!("{e:#}"));
            Err(api_error(StatusCode::BAD_GATEWAY, format!("{e:#}")))
        }
    }
}

// =============================================================================
// Health / catalog
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    state_version: u64,
    memo_entries: usize,
    server_time: i64,
}

async fn health<P: DataProvider>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        state_version: state.current_state_version(),
        memo_entries: state.memo.len(),
        server_time: chrono::Utc::now().timestamp_millis(),
    })
}

async fn get_catalog<P: DataProvider>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse {
    Json(catalog(state.config.default_period))
}

// =============================================================================
// Series / metrics
// =============================================================================

async fn series<P: DataProvider>(
    State(state): State<Arc<AppState<P>>>,
    Path(symbol): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = resolve_period(query.period.as_deref(), state.config.default_period)?;
    let series = load_one(&state, &symbol, period).await?;
    Ok(Json(series.as_ref().clone()))
}

async fn metrics<P: DataProvider>(
    State(state): State<Arc<AppState<P>>>,
    Path(symbol): Path<String>,
    Query(query): Query<PeriodQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = resolve_period(query.period.as_deref(), state.config.default_period)?;
    let series = load_one(&state, &symbol, period).await?;
    summary_metrics(&series)
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::UNPROCESSABLE_ENTITY, NOT_ENOUGH_DATA))
}

// =============================================================================
// Dashboard — several symbols in one pass
// =============================================================================

#[derive(Debug, Deserialize)]
struct DashboardQuery {
    symbols: String,
    period: Option<String>,
}

#[derive(Serialize)]
struct SymbolPanel {
    symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics: Option<SummaryMetrics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metrics_error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    series: Option<EnrichedSeries>,
}

#[derive(Serialize)]
struct DashboardResponse {
    period: Period,
    panels: Vec<SymbolPanel>,
    table: Vec<TableRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    export: Option<ExportSummary>,
}

async fn dashboard<P: DataProvider>(
    State(state): State<Arc<AppState<P>>>,
    Query(query): Query<DashboardQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let period = resolve_period(query.period.as_deref(), state.config.default_period)?;
    let symbols: Vec<&str> = query
        .symbols
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let mut panels = Vec::with_capacity(symbols.len());
    let mut loaded: Vec<Arc<EnrichedSeries>> = Vec::new();
    for raw in symbols {
        match load_one(&state, raw, period).await {
            Ok(series) => {
                let metrics = summary_metrics(&series);
                panels.push(SymbolPanel {
                    symbol: series.symbol.clone(),
                    error: None,
                    metrics_error: metrics.is_none().then_some(NOT_ENOUGH_DATA),
                    metrics,
                    series: Some(series.as_ref().clone()),
                });
                loaded.push(series);
            }
            Err((_, Json(body))) => panels.push(SymbolPanel {
                symbol: raw.to_string(),
                error: Some(body["error"].as_str().unwrap_or("unknown error").to_string()),
                metrics: None,
                metrics_error: None,
                series: None,
            }),
        }
    }

    let table = build_table(loaded.iter().map(|s| s.as_ref()), &state.config.currency_prefix);

    let export = if state.config.export_on_dashboard {
        match run_export(&state).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!(error = %e, "combined export after dashboard request failed");
                None
            }
        }
    } else {
        None
    };

    Ok(Json(DashboardResponse {
        period,
        panels,
        table,
        export,
    }))
}

// =============================================================================
// Refresh / cache control / export
// =============================================================================

#[derive(Debug, Deserialize)]
struct RefreshRequest {
    symbols: Vec<String>,
    period: Option<String>,
}

#[derive(Serialize)]
struct RefreshResult {
    symbol: String,
    ok: bool,
    rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

async fn refresh<P: DataProvider>(
    State(state): State<Arc<AppState<P>>>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let period = resolve_period(req.period.as_deref(), state.config.default_period)?;

    let results: Vec<RefreshResult> = state
        .refresh(&req.symbols, period)
        .await
        .into_iter()
        .map(|(symbol, result)| match result {
            Ok(series) if !series.is_empty() => RefreshResult {
                symbol,
                ok: true,
                rows: series.len(),
                error: None,
            },
            Ok(_) => {
                let message = format!("no data returned for {symbol}");
                state.push_error(&symbol, message.clone());
                RefreshResult {
                    symbol,
                    ok: false,
                    rows: 0,
                    error: Some(message),
                }
            }
            Err(e) => {
                state.push_error(&symbol, format!("{e:#}"));
                RefreshResult {
                    symbol,
                    ok: false,
                    rows: 0,
                    error: Some(format!("{e:#}")),
                }
            }
        })
        .collect();

    info!(
        period = %period,
        requested = results.len(),
        ok = results.iter().filter(|r| r.ok).count(),
        "refresh completed"
    );
    Ok(Json(results))
}

async fn clear_cache<P: DataProvider>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse {
    let removed = state.clear_memo();
    info!(removed, "in-process cache cleared");
    Json(serde_json::json!({ "removed": removed }))
}

async fn export<P: DataProvider>(
    State(state): State<Arc<AppState<P>>>,
) -> Result<impl IntoResponse, ApiError> {
    run_export(&state)
        .await
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
}

async fn run_export<P: DataProvider>(state: &AppState<P>) -> anyhow::Result<ExportSummary> {
    let data_dir = state.store.data_dir().to_path_buf();
    tokio::task::spawn_blocking(move || combine_entries(&data_dir)).await?
}

async fn errors<P: DataProvider>(State(state): State<Arc<AppState<P>>>) -> impl IntoResponse {
    Json(state.errors())
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime_config::RuntimeConfig;
    use crate::types::PriceBar;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::{Local, NaiveDate};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    /// Serves a fixed history for every symbol except EMPTY and FAIL.
    struct StubProvider {
        calls: Arc<AtomicUsize>,
    }

    impl DataProvider for StubProvider {
        async fn fetch_history(&self, symbol: &str, _period: Period) -> anyhow::Result<Vec<PriceBar>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match symbol {
                "EMPTY" => Ok(Vec::new()),
                "FAIL" => anyhow::bail!("provider timed out"),
                "ONE" => Ok(history(1)),
                _ => Ok(history(40)),
            }
        }
    }

    /// `n` daily bars ending today, so the entry is never stale.
    fn history(n: u64) -> Vec<PriceBar> {
        let today: NaiveDate = Local::now().date_naive();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                PriceBar {
                    date: today - chrono::Days::new(n - 1 - i),
                    open: close,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10.0,
                }
            })
            .collect()
    }

    fn test_state_with_calls(dir: &std::path::Path) -> (Arc<AppState<StubProvider>>, Arc<AtomicUsize>) {
        let config = RuntimeConfig {
            data_dir: dir.to_path_buf(),
            ..RuntimeConfig::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = StubProvider {
            calls: calls.clone(),
        };
        (Arc::new(AppState::new(config, provider).unwrap()), calls)
    }

    fn test_state(dir: &std::path::Path) -> Arc<AppState<StubProvider>> {
        test_state_with_calls(dir).0
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, serde_json::Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if body.is_some() {
            builder = builder.header("content-type", "application/json");
        }
        let req = builder
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(test_state(dir.path())), "GET", "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn series_is_served_and_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let (state, calls) = test_state_with_calls(dir.path());

        let (status, body) =
            call(router(state.clone()), "GET", "/api/v1/series/btc-usd?period=3mo", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["symbol"], "BTC-USD");
        assert_eq!(body["bars"].as_array().unwrap().len(), 40);
        assert!(body["bars"][0]["rsi"].is_null());

        call(router(state.clone()), "GET", "/api/v1/series/BTC-USD?period=3mo", None).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.memo.len(), 1);
    }

    #[tokio::test]
    async fn bad_period_and_symbol_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (status, _) = call(router(state.clone()), "GET", "/api/v1/series/X?period=9y", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(router(state), "GET", "/api/v1/series/all_data", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn empty_and_failed_fetches_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (status, body) = call(router(state.clone()), "GET", "/api/v1/series/EMPTY", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("EMPTY"));

        let (status, _) = call(router(state.clone()), "GET", "/api/v1/series/FAIL", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (_, errors) = call(router(state), "GET", "/api/v1/errors", None).await;
        assert_eq!(errors.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn metrics_need_two_rows() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (status, body) = call(router(state.clone()), "GET", "/api/v1/metrics/ONE", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], NOT_ENOUGH_DATA);

        let (status, body) = call(router(state), "GET", "/api/v1/metrics/VALE3.SA", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["last_close"], 139.0);
        assert_eq!(body["direction"], "up");
    }

    #[tokio::test]
    async fn dashboard_isolates_per_symbol_failures_and_exports() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let (status, body) = call(
            router(state),
            "GET",
            "/api/v1/dashboard?symbols=PETR4.SA,FAIL,ETH-USD&period=1y",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let panels = body["panels"].as_array().unwrap();
        assert_eq!(panels.len(), 3);
        assert!(panels[0]["error"].is_null());
        assert!(panels[1]["error"].as_str().unwrap().contains("timed out"));
        assert_eq!(panels[2]["symbol"], "ETH-USD");
        assert_eq!(body["table"].as_array().unwrap().len(), 80);
        assert_eq!(body["export"]["rows"], 80);
        assert!(dir.path().join("all_data.json").exists());
    }

    #[tokio::test]
    async fn refresh_and_clear_reset_memo() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        call(router(state.clone()), "GET", "/api/v1/series/ITUB4.SA", None).await;
        assert_eq!(state.memo.len(), 1);

        let (status, body) = call(
            router(state.clone()),
            "POST",
            "/api/v1/refresh",
            Some(r#"{"symbols":["ITUB4.SA","EMPTY"]}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["ok"], true);
        assert_eq!(body[1]["ok"], false);

        let (_, body) = call(router(state.clone()), "POST", "/api/v1/cache/clear", None).await;
        assert_eq!(body["removed"], 1);
        assert_eq!(state.memo.len(), 0);
        // Snapshot files survive a memo clear.
        assert!(state.store.entry_path("ITUB4.SA").exists());
    }

    #[tokio::test]
    async fn catalog_lists_groups_and_periods() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = call(router(test_state(dir.path())), "GET", "/api/v1/catalog", None).await;
        assert_eq!(status, StatusCode::OK);

        let classes: Vec<&str> = body["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["class"].as_str().unwrap())
            .collect();
        assert_eq!(classes, vec!["stocks", "crypto", "forex"]);
        assert!(body["groups"][1]["symbols"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("BTC-USD")));
        assert_eq!(body["periods"].as_array().unwrap().len(), Period::ALL.len());
        assert_eq!(body["default_period"], "1y");
    }

    #[tokio::test]
    async fn export_combines_cached_entries() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let (status, body) = call(router(state.clone()), "POST", "/api/v1/export", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"], 0);

        call(router(state.clone()), "GET", "/api/v1/series/BBAS3.SA", None).await;
        call(router(state.clone()), "GET", "/api/v1/series/LTC-USD", None).await;
        let (status, body) = call(router(state), "POST", "/api/v1/export", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"], 80);
        assert_eq!(body["symbols"], serde_json::json!(["BBAS3.SA", "LTC-USD"]));
        assert!(dir.path().join("all_data.json").exists());
    }
}
