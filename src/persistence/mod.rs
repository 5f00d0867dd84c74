//! # persistence — Persistence Gateway
//!
//! Writes and reads the dashboard's two logical tables on the hosted
//! backend.  Exactly one implementation is chosen from `PERSISTENCE_MODE` at
//! startup:
//!
//! | Mode     | Implementation                          |
//! |----------|-----------------------------------------|
//! | `rest`   | [`RestClient`] — PostgREST over HTTP    |
//! | `native` | `NativeClient` — direct Postgres (sqlx) |
//!
//! No retries, no transactions, no migrations: the operator creates the
//! tables up front (see [`TABLES_SQL`]).

#[cfg(feature = "postgres")]
pub mod native;
pub mod rest;

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ConnectError, ReadError, WriteError};
use crate::models::record::{PORTFOLIO_TABLE, TRADES_TABLE};
use crate::models::{PortfolioSnapshot, TradeRecord};

#[cfg(feature = "postgres")]
pub use native::NativeClient;
pub use rest::RestClient;

/// One row as a JSON object.
pub type Row = serde_json::Map<String, Value>;

/// DDL the operator runs once on the backend.
pub const TABLES_SQL: &str = r#"-- Create trades table
CREATE TABLE trades (
    id SERIAL PRIMARY KEY,
    symbol VARCHAR(50),
    side VARCHAR(10),
    size DECIMAL(18,8),
    entry_price DECIMAL(18,8),
    current_price DECIMAL(18,8),
    pnl DECIMAL(18,8),
    status VARCHAR(16) DEFAULT 'open',
    timestamp TIMESTAMPTZ DEFAULT NOW()
);

-- Create portfolio_history table
CREATE TABLE portfolio_history (
    id SERIAL PRIMARY KEY,
    total_value DECIMAL(18,8),
    daily_pnl DECIMAL(18,8),
    total_trades INTEGER,
    timestamp TIMESTAMPTZ DEFAULT NOW()
);
"#;

/// Plain, unquoted SQL identifier: `[A-Za-z_][A-Za-z0-9_]*`, at most 63 bytes.
pub fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ─── Gateway ──────────────────────────────────────────────────────────────────

pub enum Persistence {
    Rest(RestClient),
    #[cfg(feature = "postgres")]
    Native(NativeClient),
}

impl Persistence {
    /// Short label for status displays.
    pub fn describe(&self) -> String {
        match self {
            Persistence::Rest(client) => format!("rest {}", client.base_url()),
            #[cfg(feature = "postgres")]
            Persistence::Native(_) => "native postgres".to_string(),
        }
    }

    pub async fn test_connection(&self) -> Result<(), ConnectError> {
        let result = match self {
            Persistence::Rest(client) => client.test_connection().await,
            #[cfg(feature = "postgres")]
            Persistence::Native(client) => client.test_connection().await,
        };
        if result.is_ok() {
            info!(backend = %self.describe(), "✅ Backend connection successful");
        }
        result
    }

    pub async fn insert(&self, table: &str, record: &Row) -> Result<(), WriteError> {
        if !is_valid_identifier(table) {
            return Err(WriteError::InvalidTable(table.to_string()));
        }
        debug!(table, columns = record.len(), "Inserting row");

        match self {
            Persistence::Rest(client) => client.insert(table, record).await,
            #[cfg(feature = "postgres")]
            Persistence::Native(client) => client.insert(table, record).await,
        }
    }

    /// Up to `limit` rows; an empty table gives an empty vec.
    pub async fn select(&self, table: &str, limit: u32) -> Result<Vec<Row>, ReadError> {
        if !is_valid_identifier(table) {
            return Err(ReadError::InvalidTable(table.to_string()));
        }
        debug!(table, limit, "Selecting rows");

        match self {
            Persistence::Rest(client) => client.select(table, limit).await,
            #[cfg(feature = "postgres")]
            Persistence::Native(client) => client.select(table, limit).await,
        }
    }

    // ─── Typed Helpers ────────────────────────────────────────────────────────

    pub async fn save_trade(&self, record: &TradeRecord) -> Result<(), WriteError> {
        self.insert(TRADES_TABLE, &to_row(record)).await
    }

    pub async fn save_snapshot(&self, snapshot: &PortfolioSnapshot) -> Result<(), WriteError> {
        self.insert(PORTFOLIO_TABLE, &to_row(snapshot)).await
    }

    /// Trades, skipping rows that don't parse as a [`TradeRecord`].
    pub async fn load_trades(&self, limit: u32) -> Result<Vec<TradeRecord>, ReadError> {
        let rows = self.select(TRADES_TABLE, limit).await?;
        Ok(from_rows(rows))
    }

    pub async fn load_portfolio_history(&self, limit: u32) -> Result<Vec<PortfolioSnapshot>, ReadError> {
        let rows = self.select(PORTFOLIO_TABLE, limit).await?;
        Ok(from_rows(rows))
    }
}

fn to_row<T: serde::Serialize>(value: &T) -> Row {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map,
        _ => Row::new(),
    }
}

fn from_rows<T: serde::de::DeserializeOwned>(rows: Vec<Row>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value(Value::Object(row)) {
            Ok(v) => Some(v),
            Err(e) => {
                debug!(error = %e, "Skipping row that does not match the record shape");
                None
            }
        })
        .collect()
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{
        extract::{Path, Query, State},
        http::{HeaderMap, StatusCode},
        routing::get,
        Json, Router,
    };
    use serde_json::json;

    use crate::models::{OrderRequest, Side, TradeStatus};
    use crate::test_support::spawn_server;

    pub const TEST_KEY: &str = "test-key";

    type Tables = Arc<Mutex<HashMap<String, Vec<Value>>>>;

    fn authorised(headers: &HeaderMap) -> bool {
        let apikey = headers.get("apikey").and_then(|v| v.to_str().ok());
        let bearer = headers.get("authorization").and_then(|v| v.to_str().ok());
        apikey == Some(TEST_KEY) && bearer == Some("Bearer test-key")
    }

    fn unauthorised() -> (StatusCode, Json<Value>) {
        (StatusCode::UNAUTHORIZED, Json(json!({ "message": "Invalid API key" })))
    }

    fn missing_table(table: &str) -> (StatusCode, Json<Value>) {
        (
            StatusCode::NOT_FOUND,
            Json(json!({
                "code": "PGRST205",
                "message": format!("Could not find the table 'public.{table}' in the schema cache"),
            })),
        )
    }

    /// PostgREST double holding `trades` and `portfolio_history` in memory.
    pub fn fake_backend() -> Router {
        let tables: Tables = Arc::new(Mutex::new(HashMap::from([
            (TRADES_TABLE.to_string(), Vec::new()),
            (PORTFOLIO_TABLE.to_string(), Vec::new()),
        ])));

        Router::new()
            .route("/rest/v1/", get(|headers: HeaderMap| async move {
                if authorised(&headers) {
                    (StatusCode::OK, Json(json!({ "swagger": "2.0" })))
                } else {
                    unauthorised()
                }
            }))
            .route(
                "/rest/v1/:table",
                get(|State(tables): State<Tables>,
                     Path(table): Path<String>,
                     Query(q): Query<HashMap<String, String>>,
                     headers: HeaderMap| async move {
                    if !authorised(&headers) {
                        return unauthorised();
                    }
                    let limit: usize = q.get("limit").and_then(|l| l.parse().ok()).unwrap_or(usize::MAX);
                    let guard = tables.lock().unwrap();
                    match guard.get(&table) {
                        Some(rows) => (StatusCode::OK, Json(Value::Array(rows.iter().take(limit).cloned().collect()))),
                        None => missing_table(&table),
                    }
                })
                .post(|State(tables): State<Tables>,
                       Path(table): Path<String>,
                       headers: HeaderMap,
                       Json(row): Json<Value>| async move {
                    if !authorised(&headers) {
                        return unauthorised();
                    }
                    let mut guard = tables.lock().unwrap();
                    match guard.get_mut(&table) {
                        Some(rows) => {
                            rows.push(row.clone());
                            (StatusCode::CREATED, Json(json!([row])))
                        }
                        None => missing_table(&table),
                    }
                }),
            )
            .with_state(tables)
    }

    pub async fn rest_gateway(key: &str) -> Persistence {
        let base = spawn_server(fake_backend()).await;
        Persistence::Rest(RestClient::new(reqwest::Client::new(), &base, key, Duration::from_secs(5)))
    }

    #[test]
    fn test_identifier_validation() {
        assert!(is_valid_identifier("trades"));
        assert!(is_valid_identifier("_portfolio_history2"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("1trades"));
        assert!(!is_valid_identifier("trades; drop table x"));
        assert!(!is_valid_identifier("trades?limit=1"));
    }

    #[tokio::test]
    async fn test_connection_ok_and_bad_key() {
        assert!(rest_gateway(TEST_KEY).await.test_connection().await.is_ok());

        let err = rest_gateway("wrong").await.test_connection().await.unwrap_err();
        match &err {
            ConnectError::BackendStatus { status, .. } => assert_eq!(*status, 401),
            other => panic!("expected status error, got {other:?}"),
        }
        assert!(err.hint().unwrap().contains("API key"));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let gateway = Persistence::Rest(RestClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:1",
            TEST_KEY,
            Duration::from_secs(2),
        ));
        assert!(matches!(gateway.test_connection().await, Err(ConnectError::BackendUnreachable(_))));
        assert!(matches!(gateway.select("trades", 10).await, Err(ReadError::Transport(_))));
    }

    #[tokio::test]
    async fn test_select_on_empty_table_is_empty() {
        let gateway = rest_gateway(TEST_KEY).await;
        let rows = gateway.select(TRADES_TABLE, 20).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_insert_then_select_round_trips_trade() {
        let gateway = rest_gateway(TEST_KEY).await;
        let order = OrderRequest {
            symbol:      "XAUUSD".into(),
            side:        Side::Buy,
            volume:      0.2,
            price:       None,
            stop_loss:   None,
            take_profit: None,
        };
        gateway.save_trade(&TradeRecord::from_order(&order, 2050.0)).await.unwrap();

        let rows = gateway.select(TRADES_TABLE, 1).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["symbol"], "XAUUSD");
        assert_eq!(rows[0]["side"], "buy");
        assert_eq!(rows[0]["size"], 0.2);

        let trades = gateway.load_trades(10).await.unwrap();
        assert_eq!(trades[0].status, TradeStatus::Executed);
    }

    #[tokio::test]
    async fn test_select_honours_limit() {
        let gateway = rest_gateway(TEST_KEY).await;
        for i in 0..5 {
            gateway
                .save_snapshot(&PortfolioSnapshot::now(10_000.0 + i as f64, 0.0, i))
                .await
                .unwrap();
        }
        assert_eq!(gateway.select(PORTFOLIO_TABLE, 3).await.unwrap().len(), 3);
        assert_eq!(gateway.load_portfolio_history(100).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_carries_body_and_hint() {
        let gateway = rest_gateway(TEST_KEY).await;
        let mut row = Row::new();
        row.insert("test_field".into(), json!("Hello"));

        let err = gateway.insert("test_table", &row).await.unwrap_err();
        match &err {
            WriteError::Rejected { status, body } => {
                assert_eq!(*status, 404);
                assert!(body.contains("test_table"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert!(err.hint().unwrap().starts_with("Table not found"));
    }

    #[tokio::test]
    async fn test_select_missing_table_is_read_error() {
        let gateway = rest_gateway(TEST_KEY).await;
        let err = gateway.select("nope", 10).await.unwrap_err();
        assert!(matches!(err, ReadError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_invalid_table_never_reaches_backend() {
        let gateway = rest_gateway(TEST_KEY).await;
        assert!(matches!(gateway.insert("a/b", &Row::new()).await, Err(WriteError::InvalidTable(_))));
        assert!(matches!(gateway.select("a b", 1).await, Err(ReadError::InvalidTable(_))));
    }
}
