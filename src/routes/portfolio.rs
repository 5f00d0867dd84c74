//! # routes::portfolio
//!
//! Session-level portfolio metrics and the Start/Stop Trading toggle.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use tracing::info;

use crate::events::DashboardEvent;
use crate::state::{SharedState, INITIAL_PORTFOLIO_VALUE};

/// Length of the simulated equity curve.
pub const CURVE_DAYS: usize = 30;

/// GET /api/portfolio
pub async fn get_portfolio(State(state): State<SharedState>) -> impl IntoResponse {
    let portfolio = state.portfolio.read().await.clone();
    Json(json!({ "ok": true, "portfolio": portfolio }))
}

/// GET /api/portfolio/curve — simulated walk from the initial value.
pub async fn get_curve(State(state): State<SharedState>) -> impl IntoResponse {
    let curve = state.simulator.portfolio_curve(CURVE_DAYS, INITIAL_PORTFOLIO_VALUE);
    Json(json!({ "ok": true, "days": CURVE_DAYS, "curve": curve }))
}

/// POST /api/trading/start
pub async fn start_trading(State(state): State<SharedState>) -> impl IntoResponse {
    set_trading(&state, true).await
}

/// POST /api/trading/stop
pub async fn stop_trading(State(state): State<SharedState>) -> impl IntoResponse {
    set_trading(&state, false).await
}

async fn set_trading(state: &SharedState, active: bool) -> Json<serde_json::Value> {
    state.portfolio.write().await.trading_active = active;

    if active {
        info!("▶️ Trading started");
    } else {
        info!("⏹️ Trading stopped");
    }
    state.broadcast(&DashboardEvent::TradingToggled { active });

    Json(json!({ "ok": true, "trading_active": active }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::{router, tests::call};
    use crate::state::tests::demo_state;

    #[tokio::test]
    async fn test_curve_has_thirty_one_points() {
        let app = router(demo_state());
        let (status, body) = call(&app, "GET", "/api/portfolio/curve", None).await;

        assert_eq!(status, StatusCode::OK);
        let curve = body["curve"].as_array().unwrap();
        assert_eq!(curve.len(), 31);
        assert!(curve.iter().all(|p| p["value"].as_f64().unwrap().is_finite()));
    }

    #[tokio::test]
    async fn test_trading_toggle_updates_state_and_broadcasts() {
        let state = demo_state();
        let mut rx = state.broadcast_tx.subscribe();
        let app = router(state.clone());

        let (_, body) = call(&app, "POST", "/api/trading/start", None).await;
        assert_eq!(body["trading_active"], true);
        assert!(state.portfolio.read().await.trading_active);
        assert!(rx.recv().await.unwrap().contains("TRADING_TOGGLED"));

        call(&app, "POST", "/api/trading/stop", None).await;
        let (_, body) = call(&app, "GET", "/api/portfolio", None).await;
        assert_eq!(body["portfolio"]["trading_active"], false);
    }
}
