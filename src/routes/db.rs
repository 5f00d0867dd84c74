//! # routes::db
//!
//! Persistence gateway endpoints.
//!
//! | Method | Path                      | Description                              |
//! |--------|---------------------------|------------------------------------------|
//! | POST   | `/api/db/connect`         | configure backend URL + key and test it  |
//! | GET    | `/api/db/test`            | re-run the connection test               |
//! | GET    | `/api/db/schema`          | SQL for the expected tables              |
//! | GET    | `/api/db/analytics`       | P&L and win rate over recent trades      |
//! | POST   | `/api/db/positions/save`  | current positions → `trades`             |
//! | POST   | `/api/db/portfolio/save`  | portfolio metrics → `portfolio_history`  |
//! | GET    | `/api/db/{table}?limit=N` | rows                                     |
//! | POST   | `/api/db/{table}`         | insert one row                           |

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::AppError;
use crate::events::DashboardEvent;
use crate::models::record::TRADES_TABLE;
use crate::models::TradeRecord;
use crate::persistence::{Persistence, RestClient, Row, TABLES_SQL};
use crate::state::SharedState;

pub const DEFAULT_LIMIT: u32 = 100;
pub const MAX_LIMIT: u32 = 1000;
/// Window for `/api/db/analytics`.
pub const ANALYTICS_WINDOW: u32 = 100;

async fn require_persistence(state: &SharedState) -> Result<Arc<Persistence>, AppError> {
    state
        .persistence()
        .await
        .ok_or_else(|| AppError::Unavailable("No backend connected. Configure it via POST /api/db/connect".into()))
}

// ─── POST /api/db/connect ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub url: String,
    pub key: String,
}

/// The new gateway replaces the current one only when its connection test
/// passes; a failed attempt leaves the session as it was.
pub async fn connect(
    State(state): State<SharedState>,
    Json(req): Json<ConnectRequest>,
) -> Result<impl IntoResponse, AppError> {
    let url = req.url.trim();
    let key = req.key.trim();
    if url.is_empty() || key.is_empty() {
        return Err(AppError::BadRequest("url and key are required".into()));
    }

    let gateway = Persistence::Rest(RestClient::new(
        state.http_client.clone(),
        url,
        key,
        state.config.request_timeout,
    ));
    let backend = gateway.describe();

    if let Err(e) = gateway.test_connection().await {
        warn!(error = %e, %backend, "Backend connection test failed — keeping the current gateway");
        let current = state.persistence().await.map(|p| p.describe());
        state.broadcast(&DashboardEvent::PersistenceStatus {
            connected: current.is_some(),
            backend:   current,
            message:   format!("{backend}: {e}"),
        });
        return Err(e.into());
    }

    state.set_persistence(Some(gateway)).await;
    state.broadcast(&DashboardEvent::PersistenceStatus {
        connected: true,
        backend:   Some(backend.clone()),
        message:   "connected".into(),
    });

    Ok(Json(json!({ "ok": true, "backend": backend })))
}

// ─── GET /api/db/test ─────────────────────────────────────────────────────────

pub async fn test_connection(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let gateway = require_persistence(&state).await?;
    gateway.test_connection().await?;
    Ok(Json(json!({ "ok": true, "backend": gateway.describe() })))
}

// ─── GET /api/db/schema ───────────────────────────────────────────────────────

pub async fn schema() -> impl IntoResponse {
    Json(json!({ "ok": true, "sql": TABLES_SQL }))
}

// ─── Generic Table Access ─────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

pub async fn select(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<impl IntoResponse, AppError> {
    let gateway = require_persistence(&state).await?;
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let rows = gateway.select(&table, limit).await?;
    Ok(Json(json!({ "ok": true, "table": table, "count": rows.len(), "rows": rows })))
}

pub async fn insert(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Json(record): Json<Row>,
) -> Result<impl IntoResponse, AppError> {
    let gateway = require_persistence(&state).await?;
    gateway.insert(&table, &record).await?;

    info!(%table, "💾 Row inserted");
    Ok(Json(json!({ "ok": true, "table": table })))
}

// ─── POST /api/db/positions/save ──────────────────────────────────────────────

/// Needs an open broker session; each position becomes an `open` trade row.
pub async fn save_positions(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let gateway = require_persistence(&state).await?;

    let positions = {
        let broker = state.broker.read().await;
        if !broker.is_connected() {
            return Err(AppError::BadRequest("Connect the broker first to save positions".into()));
        }
        broker.get_positions().await
    };

    let mut saved = 0usize;
    let mut errors = Vec::new();
    for position in positions.iter() {
        match gateway.save_trade(&TradeRecord::from_position(position)).await {
            Ok(()) => saved += 1,
            Err(e) => {
                warn!(error = %e, ticket = position.ticket, "Position not saved");
                errors.push(e);
            }
        }
    }

    // Nothing made it: surface the first failure with its hint.
    if saved == 0 && !errors.is_empty() {
        return Err(errors.remove(0).into());
    }

    info!(saved, failed = errors.len(), "💾 Positions saved");
    let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
    Ok(Json(json!({
        "ok":     errors.is_empty(),
        "saved":  saved,
        "failed": messages.len(),
        "errors": messages,
    })))
}

// ─── POST /api/db/portfolio/save ──────────────────────────────────────────────

pub async fn save_portfolio(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let gateway = require_persistence(&state).await?;
    let snapshot = state.portfolio.read().await.snapshot();

    gateway.save_snapshot(&snapshot).await?;

    info!(total_value = snapshot.total_value, "💾 Portfolio snapshot saved");
    Ok(Json(json!({ "ok": true, "snapshot": snapshot })))
}

// ─── GET /api/db/analytics ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeAnalytics {
    pub total_trades: usize,
    pub total_pnl:    f64,
    pub win_count:    usize,
    /// Percent of all rows, including those without a P&L.
    pub win_rate:     f64,
}

impl TradeAnalytics {
    /// Rows without a numeric `pnl` count as trades but not as wins.
    pub fn from_rows(rows: &[Row]) -> Self {
        let pnls: Vec<f64> = rows.iter().filter_map(|row| row.get("pnl").and_then(numeric)).collect();
        let total_trades = rows.len();
        let win_count = pnls.iter().filter(|p| **p > 0.0).count();

        Self {
            total_trades,
            total_pnl: pnls.iter().sum(),
            win_count,
            win_rate: if total_trades > 0 {
                win_count as f64 / total_trades as f64 * 100.0
            } else {
                0.0
            },
        }
    }
}

/// Numeric columns may come back as JSON numbers or strings.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub async fn analytics(State(state): State<SharedState>) -> Result<impl IntoResponse, AppError> {
    let gateway = require_persistence(&state).await?;
    let rows = gateway.select(TRADES_TABLE, ANALYTICS_WINDOW).await?;

    Ok(Json(json!({ "ok": true, "analytics": TradeAnalytics::from_rows(&rows) })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::persistence::tests::{fake_backend, rest_gateway, TEST_KEY};
    use crate::routes::{router, tests::call};
    use crate::state::tests::demo_state;
    use crate::test_support::spawn_server;

    fn rows(values: Value) -> Vec<Row> {
        serde_json::from_value(values).unwrap()
    }

    #[test]
    fn test_analytics_over_mixed_rows() {
        let analytics = TradeAnalytics::from_rows(&rows(json!([
            { "pnl": 10.0 },
            { "pnl": "-4.5" },
            { "pnl": null },
            { "pnl": 2 },
        ])));

        assert_eq!(analytics.total_trades, 4);
        assert_eq!(analytics.win_count, 2);
        assert!((analytics.total_pnl - 7.5).abs() < 1e-9);
        assert!((analytics.win_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_analytics_without_trades() {
        let analytics = TradeAnalytics::from_rows(&[]);
        assert_eq!(analytics.total_trades, 0);
        assert_eq!(analytics.win_rate, 0.0);
    }

    #[tokio::test]
    async fn test_endpoints_need_a_backend() {
        let app = router(demo_state());
        let (status, body) = call(&app, "GET", "/api/db/trades", None).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_connect_keeps_gateway_only_on_success() {
        let base = spawn_server(fake_backend()).await;
        let state = demo_state();
        let app = router(state.clone());

        let (status, body) = call(&app, "POST", "/api/db/connect", Some(json!({ "url": base, "key": "nope" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["hint"].as_str().unwrap().contains("API key"));
        assert!(state.persistence().await.is_none());

        let (status, _) = call(&app, "POST", "/api/db/connect", Some(json!({ "url": base, "key": TEST_KEY }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(state.persistence().await.is_some());

        let (status, _) = call(&app, "GET", "/api/db/test", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_failed_reconnect_keeps_working_gateway() {
        let base = spawn_server(fake_backend()).await;
        let state = demo_state();
        let app = router(state.clone());

        let (status, _) = call(&app, "POST", "/api/db/connect", Some(json!({ "url": base, "key": TEST_KEY }))).await;
        assert_eq!(status, StatusCode::OK);
        let before = state.persistence().await.unwrap().describe();

        let (status, _) = call(&app, "POST", "/api/db/connect", Some(json!({ "url": "http://127.0.0.1:1", "key": "k" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        assert_eq!(state.persistence().await.unwrap().describe(), before);
        let (status, _) = call(&app, "GET", "/api/db/test", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_insert_then_select_generic_table() {
        let state = demo_state();
        state.set_persistence(Some(rest_gateway(TEST_KEY).await)).await;
        let app = router(state);

        let row = json!({ "timestamp": "2024-01-01T00:00:00Z", "total_value": 10500.0, "daily_pnl": 500.0, "total_trades": 3 });
        let (status, _) = call(&app, "POST", "/api/db/portfolio_history", Some(row)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = call(&app, "GET", "/api/db/portfolio_history?limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["rows"][0]["total_value"], 10500.0);
    }

    #[tokio::test]
    async fn test_missing_table_and_invalid_name() {
        let state = demo_state();
        state.set_persistence(Some(rest_gateway(TEST_KEY).await)).await;
        let app = router(state);

        let (status, body) = call(&app, "GET", "/api/db/orders", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["hint"].is_string());

        let (status, _) = call(&app, "POST", "/api/db/bad-name", Some(json!({ "a": 1 }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_save_positions_requires_broker_session() {
        let state = demo_state();
        state.set_persistence(Some(rest_gateway(TEST_KEY).await)).await;
        let app = router(state.clone());

        let (status, _) = call(&app, "POST", "/api/db/positions/save", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        call(&app, "POST", "/api/broker/connect", None).await;
        let (status, body) = call(&app, "POST", "/api/db/positions/save", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], 1);

        let trades = state.persistence().await.unwrap().load_trades(10).await.unwrap();
        assert_eq!(trades[0].status, crate::models::TradeStatus::Open);
        assert_eq!(trades[0].pnl, Some(7.0));

        let (_, body) = call(&app, "GET", "/api/db/analytics", None).await;
        assert_eq!(body["analytics"]["total_trades"], 1);
        assert_eq!(body["analytics"]["win_rate"], 100.0);
    }

    #[tokio::test]
    async fn test_save_portfolio_snapshot() {
        let state = demo_state();
        state.set_persistence(Some(rest_gateway(TEST_KEY).await)).await;
        let app = router(state.clone());

        let (status, body) = call(&app, "POST", "/api/db/portfolio/save", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["total_value"], 10000.0);

        let history = state.persistence().await.unwrap().load_portfolio_history(10).await.unwrap();
        assert_eq!(history.len(), 1);
    }
}
