//! # routes
//!
//! HTTP surface of the dashboard backend.
//!
//! | Module        | Concern                                        |
//! |---------------|------------------------------------------------|
//! | [`monitor`]   | health check and `/ws/dashboard`               |
//! | [`market`]    | quotes, chart series, watchlist                |
//! | [`portfolio`] | portfolio metrics, equity curve, trading toggle |
//! | [`broker`]    | connect / disconnect, positions, orders        |
//! | [`db`]        | persistence gateway                            |

pub mod broker;
pub mod db;
pub mod market;
pub mod monitor;
pub mod portfolio;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::state::SharedState;

/// All application routes, state attached.  Middleware is added by the caller.
pub fn router(state: SharedState) -> Router {
    Router::new()
        // ── Monitor ──────────────────────────────────────────────────────────
        .route("/api/health",              get(monitor::health))
        .route("/ws/dashboard",            get(monitor::ws_dashboard))
        // ── Market Data ──────────────────────────────────────────────────────
        .route("/api/market/quotes",       get(market::get_quotes))
        .route("/api/market/series",       get(market::get_series))
        .route("/api/watchlist",           put(market::set_watchlist))
        // ── Portfolio ────────────────────────────────────────────────────────
        .route("/api/portfolio",           get(portfolio::get_portfolio))
        .route("/api/portfolio/curve",     get(portfolio::get_curve))
        .route("/api/trading/start",       post(portfolio::start_trading))
        .route("/api/trading/stop",        post(portfolio::stop_trading))
        // ── Broker ───────────────────────────────────────────────────────────
        .route("/api/broker/connect",      post(broker::connect))
        .route("/api/broker/disconnect",   post(broker::disconnect))
        .route("/api/broker/positions",    get(broker::get_positions))
        .route("/api/broker/order",        post(broker::place_order))
        // ── Persistence ──────────────────────────────────────────────────────
        .route("/api/db/connect",          post(db::connect))
        .route("/api/db/test",             get(db::test_connection))
        .route("/api/db/schema",           get(db::schema))
        .route("/api/db/analytics",        get(db::analytics))
        .route("/api/db/positions/save",   post(db::save_positions))
        .route("/api/db/portfolio/save",   post(db::save_portfolio))
        .route("/api/db/:table",           get(db::select).post(db::insert))
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    /// Run one request through `app` and decode the JSON reply.
    pub async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
