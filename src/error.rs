//! # error
//!
//! Connector error kinds plus the centralised application error type.
//!
//! Gateways return their own error enums ([`ConnectError`], [`OrderError`],
//! [`WriteError`], [`ReadError`]).  Handlers return `Result<_, AppError>`,
//! and Axum's `IntoResponse` impl turns every failure into an inline JSON
//! message so the dashboard never crashes on a downstream fault.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// ─── Connector Errors ─────────────────────────────────────────────────────────

/// The terminal or the backend could not be reached or refused the session.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("terminal unavailable: {0}")]
    TerminalUnavailable(String),

    #[error("terminal login failed: {0}")]
    AuthFailed(String),

    #[error("terminal returned no account info")]
    NoAccountInfo,

    #[error("backend unreachable: {0}")]
    BackendUnreachable(String),

    #[error("backend connection failed: HTTP {status}")]
    BackendStatus { status: u16, body: String },
}

/// The broker did not accept the order.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid order: {0}")]
    Invalid(String),

    /// Non-success return code from the terminal.
    #[error("order failed: retcode={code} {message}")]
    Rejected { code: u32, message: String },

    #[error("order error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum WriteError {
    /// Backend answered with something other than 200/201.  `body` is the
    /// raw response text.
    #[error("insert failed: HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("insert error: {0}")]
    Transport(String),

    #[error("invalid table name '{0}'")]
    InvalidTable(String),
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("select failed: HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("select error: {0}")]
    Transport(String),

    #[error("unexpected response shape: {0}")]
    Decode(String),

    #[error("invalid table name '{0}'")]
    InvalidTable(String),
}

// ─── Backend Guidance ─────────────────────────────────────────────────────────

/// Turns a backend failure into operator guidance.
///
/// The hosted REST surface gives no structured error code, so this matches
/// on status and body text.
pub fn backend_hint(status: u16, body: &str) -> Option<&'static str> {
    let lower = body.to_ascii_lowercase();

    if status == 401 || lower.contains("invalid api key") || lower.contains("jwt") {
        Some("The backend rejected the API key: check BACKEND_KEY (anon key) or BACKEND_SERVICE_KEY")
    } else if status == 403
        || lower.contains("permission denied")
        || lower.contains("row-level security")
    {
        Some("Access denied: add a row-level security policy for this table or use the service-role key")
    } else if status == 404
        || lower.contains("does not exist")
        || lower.contains("could not find the table")
    {
        Some("Table not found: create it first (see GET /api/db/schema)")
    } else {
        None
    }
}

impl ConnectError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ConnectError::BackendStatus { status, body } => backend_hint(*status, body),
            ConnectError::TerminalUnavailable(_) => {
                Some("Start the MetaTrader 5 terminal and its bridge, then retry")
            }
            _ => None,
        }
    }
}

impl WriteError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            WriteError::Rejected { status, body } => backend_hint(*status, body),
            _ => None,
        }
    }
}

impl ReadError {
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            ReadError::Status { status, body } => backend_hint(*status, body),
            _ => None,
        }
    }
}

// ─── AppError ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// A connector (e.g. persistence) is not configured for this session.
    #[error("Unavailable: {0}")]
    Unavailable(String),

    /// A downstream gateway failed.
    #[error("{message}")]
    Gateway {
        message: String,
        hint:    Option<&'static str>,
    },

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<ConnectError> for AppError {
    fn from(e: ConnectError) -> Self {
        AppError::Gateway { hint: e.hint(), message: e.to_string() }
    }
}

impl From<OrderError> for AppError {
    fn from(e: OrderError) -> Self {
        match e {
            OrderError::Invalid(msg) => AppError::BadRequest(msg),
            other => AppError::Gateway { hint: None, message: other.to_string() },
        }
    }
}

impl From<WriteError> for AppError {
    fn from(e: WriteError) -> Self {
        match e {
            WriteError::InvalidTable(name) => AppError::BadRequest(format!("invalid table name '{name}'")),
            other => AppError::Gateway { hint: other.hint(), message: other.to_string() },
        }
    }
}

impl From<ReadError> for AppError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::InvalidTable(name) => AppError::BadRequest(format!("invalid table name '{name}'")),
            other => AppError::Gateway { hint: other.hint(), message: other.to_string() },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, hint) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone(), None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), None),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone(), None),
            AppError::Gateway { message, hint } => (StatusCode::BAD_GATEWAY, message.clone(), *hint),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
                None,
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
            "hint":  hint,
        }));

        (status, body).into_response()
    }
}
