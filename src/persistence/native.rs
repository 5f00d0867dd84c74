//! # persistence::native — PostgreSQL client
//!
//! Talks to the backend's Postgres directly with `sqlx` instead of going
//! through the REST surface.  Behaviour matches [`super::RestClient`]:
//! same tables, same row shape, same error kinds.
//!
//! ## Setup
//! 1. Set `PERSISTENCE_MODE=native` and `DATABASE_URL` in `.env`
//! 2. Build with `cargo run --features postgres`
//! 3. Create the tables yourself (`GET /api/db/schema`)

use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use tracing::{error, info};

use crate::error::{ConnectError, ReadError, WriteError};
use crate::persistence::{is_valid_identifier, Row};

pub struct NativeClient {
    pool: PgPool,
}

impl NativeClient {
    pub async fn connect(database_url: &str, timeout: Duration) -> Result<Self, ConnectError> {
        info!("Connecting to PostgreSQL...");

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(timeout)
            .connect(database_url)
            .await
            .map_err(|e| {
                error!(error = %e, "Failed to connect to PostgreSQL");
                ConnectError::BackendUnreachable(e.to_string())
            })?;

        info!("✅ PostgreSQL connected");
        Ok(Self { pool })
    }

    pub async fn test_connection(&self) -> Result<(), ConnectError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| match http_like_status(&e) {
                Some(status) => ConnectError::BackendStatus { status, body: e.to_string() },
                None => ConnectError::BackendUnreachable(e.to_string()),
            })
    }

    pub async fn insert(&self, table: &str, record: &Row) -> Result<(), WriteError> {
        let columns: Vec<&str> = record.keys().map(String::as_str).collect();
        if let Some(bad) = columns.iter().find(|c| !is_valid_identifier(c)) {
            return Err(WriteError::Rejected {
                status: 400,
                body:   format!("invalid column name '{bad}'"),
            });
        }

        sqlx::query(&insert_sql(table, &columns))
            .bind(Json(record))
            .execute(&self.pool)
            .await
            .map(|_| ())
            .map_err(|e| match http_like_status(&e) {
                Some(status) => WriteError::Rejected { status, body: e.to_string() },
                None => WriteError::Transport(e.to_string()),
            })
    }

    pub async fn select(&self, table: &str, limit: u32) -> Result<Vec<Row>, ReadError> {
        let rows: Json<Vec<Row>> = sqlx::query_scalar(&select_sql(table))
            .bind(i64::from(limit))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match http_like_status(&e) {
                Some(status) => ReadError::Status { status, body: e.to_string() },
                None => ReadError::Transport(e.to_string()),
            })?;

        Ok(rows.0)
    }
}

/// Columns absent from the record keep their table defaults.
fn insert_sql(table: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {table} DEFAULT VALUES");
    }
    let list = columns.join(", ");
    format!("INSERT INTO {table} ({list}) SELECT {list} FROM json_populate_record(NULL::{table}, $1::json)")
}

fn select_sql(table: &str) -> String {
    format!("SELECT COALESCE(json_agg(t), '[]'::json) FROM (SELECT * FROM {table} LIMIT $1) t")
}

/// Maps Postgres error classes onto the status codes the REST surface would
/// have returned, so both clients give the same guidance.
fn http_like_status(e: &sqlx::Error) -> Option<u16> {
    let db = e.as_database_error()?;
    let status = match db.code().as_deref() {
        Some("42P01") => 404, // undefined_table
        Some("42501") => 403, // insufficient_privilege
        Some("28P01") | Some("28000") => 401,
        _ => 400,
    };
    Some(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_sql_lists_only_given_columns() {
        let sql = insert_sql("trades", &["symbol", "side"]);
        assert_eq!(
            sql,
            "INSERT INTO trades (symbol, side) SELECT symbol, side FROM json_populate_record(NULL::trades, $1::json)"
        );
    }

    #[test]
    fn test_insert_sql_without_columns_uses_defaults() {
        assert_eq!(insert_sql("portfolio_history", &[]), "INSERT INTO portfolio_history DEFAULT VALUES");
    }
}
