//! # routes::broker
//!
//! | Method | Path                     | Description                                |
//! |--------|--------------------------|--------------------------------------------|
//! | POST   | `/api/broker/connect`    | open a session (body: credentials, optional) |
//! | POST   | `/api/broker/disconnect` | close the session                          |
//! | GET    | `/api/broker/positions`  | open positions with P&L %                  |
//! | POST   | `/api/broker/order`      | market order                               |

use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::error::AppError;
use crate::events::DashboardEvent;
use crate::models::{Credentials, OrderRequest, Position, TradeRecord};
use crate::state::SharedState;

// ─── POST /api/broker/connect ─────────────────────────────────────────────────

/// Without a body the configured credentials are used; without those the
/// terminal's current login.
pub async fn connect(
    State(state): State<SharedState>,
    payload: Option<Json<Credentials>>,
) -> Result<impl IntoResponse, AppError> {
    let credentials = payload
        .map(|Json(c)| c)
        .or_else(|| state.config.mt5_credentials.clone());

    let session = state.broker.write().await.connect(credentials.as_ref()).await?;

    state.broadcast(&DashboardEvent::BrokerConnected { session: Box::new(session.clone()) });
    Ok(Json(json!({ "ok": true, "session": session })))
}

// ─── POST /api/broker/disconnect ──────────────────────────────────────────────

pub async fn disconnect(State(state): State<SharedState>) -> impl IntoResponse {
    state.broker.write().await.disconnect().await;
    state.broadcast(&DashboardEvent::BrokerDisconnected);
    Json(json!({ "ok": true }))
}

// ─── GET /api/broker/positions ────────────────────────────────────────────────

#[derive(Serialize)]
struct PositionView<'a> {
    #[serde(flatten)]
    position:    &'a Position,
    pnl_percent: f64,
}

pub async fn get_positions(State(state): State<SharedState>) -> impl IntoResponse {
    let positions = state.broker.read().await.get_positions().await;

    let views: Vec<PositionView> = positions
        .iter()
        .map(|position| PositionView { position, pnl_percent: position.pnl_percent() })
        .collect();

    Json(json!({ "ok": true, "count": views.len(), "positions": views }))
}

// ─── POST /api/broker/order ───────────────────────────────────────────────────

/// Accepted orders bump `total_trades` and, when a backend is connected,
/// are recorded in `trades` with status `executed` at the broker's fill
/// price.
pub async fn place_order(
    State(state): State<SharedState>,
    Json(order): Json<OrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = state.broker.read().await.place_order(&order).await;

    let confirmation = match result {
        Ok(confirmation) => confirmation,
        Err(e) => {
            warn!(error = %e, symbol = %order.symbol, "❌ Order failed");
            state.broadcast(&DashboardEvent::OrderFailed {
                order: Box::new(order),
                error: e.to_string(),
            });
            return Err(e.into());
        }
    };

    state.record_trade().await;

    let fill_price = match confirmation.price.or(order.price) {
        Some(price) => price,
        None => {
            warn!(ticket = ?confirmation.ticket, "Broker reported no fill price — recording entry price 0");
            0.0
        }
    };

    let saved = match state.persistence().await {
        Some(gateway) => match gateway.save_trade(&TradeRecord::from_order(&order, fill_price)).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Order placed but the trade record was not saved");
                false
            }
        },
        None => false,
    };

    info!(ticket = ?confirmation.ticket, demo = confirmation.demo, saved, "✅ Order placed");
    state.broadcast(&DashboardEvent::OrderPlaced {
        order:        Box::new(order),
        confirmation: Box::new(confirmation.clone()),
    });

    Ok(Json(json!({
        "ok":           true,
        "confirmation": confirmation,
        "saved":        saved,
    })))
}
