//! # persistence::rest
//!
//! Direct calls to the hosted backend's REST surface.
//!
//! ```text
//! GET  {base}/rest/v1/                → reachability / key check
//! GET  {base}/rest/v1/{table}?limit=N → rows as a JSON array
//! POST {base}/rest/v1/{table}         → insert one row
//! ```
//! Every request carries `apikey`, `Authorization: Bearer {key}` and
//! `Content-Type: application/json`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::{ConnectError, ReadError, WriteError};
use crate::persistence::Row;

#[derive(Debug, Clone)]
pub struct RestClient {
    http:     reqwest::Client,
    base_url: String,
    rest_url: String,
    headers:  HeaderMap,
    timeout:  Duration,
}

impl RestClient {
    pub fn new(http: reqwest::Client, base_url: &str, key: &str, timeout: Duration) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();
        let rest_url = format!("{base_url}/rest/v1");

        let mut headers = HeaderMap::new();
        // A key with non-visible characters can't be a header; the backend
        // will then answer 401 and the operator gets the key hint.
        if let Ok(v) = HeaderValue::from_str(key) {
            headers.insert("apikey", v);
        }
        if let Ok(v) = HeaderValue::from_str(&format!("Bearer {key}")) {
            headers.insert(AUTHORIZATION, v);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        Self { http, base_url, rest_url, headers, timeout }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Success iff the REST root answers 200.
    pub async fn test_connection(&self) -> Result<(), ConnectError> {
        let response = self
            .http
            .get(format!("{}/", self.rest_url))
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %self.rest_url, "Backend unreachable");
                ConnectError::BackendUnreachable(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(http_status = %status, "Backend connection test failed");
        Err(ConnectError::BackendStatus { status: status.as_u16(), body })
    }

    /// Success iff the backend answers 200 or 201.
    pub async fn insert(&self, table: &str, record: &Row) -> Result<(), WriteError> {
        let response = self
            .http
            .post(format!("{}/{table}", self.rest_url))
            .headers(self.headers.clone())
            .json(record)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, table, "Insert request failed");
                WriteError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!(http_status = %status, table, body = %body, "Insert rejected");
        Err(WriteError::Rejected { status: status.as_u16(), body })
    }

    pub async fn select(&self, table: &str, limit: u32) -> Result<Vec<Row>, ReadError> {
        let response = self
            .http
            .get(format!("{}/{table}", self.rest_url))
            .query(&[("limit", limit)])
            .headers(self.headers.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, table, "Select request failed");
                ReadError::Transport(e.to_string())
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            warn!(http_status = %status, table, "Select failed");
            return Err(ReadError::Status { status: status.as_u16(), body });
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ReadError::Decode(e.to_string()))?;

        match payload {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Object(row) => Ok(row),
                    other => Err(ReadError::Decode(format!("expected object row, got {other}"))),
                })
                .collect(),
            other => Err(ReadError::Decode(format!("expected array, got {other}"))),
        }
    }
}
