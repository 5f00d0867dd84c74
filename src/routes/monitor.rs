//! # routes::monitor
//!
//! | Method    | Path            | Description                              |
//! |-----------|-----------------|------------------------------------------|
//! | GET       | `/api/health`   | session, broker and persistence status   |
//! | GET (WS)  | `/ws/dashboard` | snapshot, then every [`DashboardEvent`]  |
//!
//! [`DashboardEvent`]: crate::events::DashboardEvent

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::state::SharedState;

// ─── GET /api/health ──────────────────────────────────────────────────────────

pub async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let mut body = status_snapshot(&state).await;
    body["ok"] = json!(true);
    body["uptime_secs"] = json!((Utc::now() - state.started_at).num_seconds());
    Json(body)
}

/// Everything a freshly opened dashboard needs to render its sidebar.
async fn status_snapshot(state: &SharedState) -> Value {
    let (mode, connected, session) = {
        let broker = state.broker.read().await;
        (broker.mode(), broker.is_connected(), broker.session().cloned())
    };
    let persistence = state.persistence().await;
    let portfolio = state.portfolio.read().await.clone();

    json!({
        "session_id": state.session_id,
        "broker": {
            "mode":      mode.to_string(),
            "connected": connected,
            "session":   session,
        },
        "persistence": {
            "connected": persistence.is_some(),
            "backend":   persistence.map(|p| p.describe()),
        },
        "portfolio": portfolio,
        "watchlist": state.watchlist().await,
    })
}

// ─── WebSocket Handler ────────────────────────────────────────────────────────

/// Upgrade HTTP → WebSocket and subscribe to the broadcast channel.
pub async fn ws_dashboard(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// What the socket loop does after one `select!` round.
enum Flow {
    Continue,
    Close,
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 Dashboard client connected");

    if sender.send(Message::Text(snapshot_event(&state).await)).await.is_err() {
        return;
    }

    loop {
        let flow = tokio::select! {
            event = rx.recv() => forward_event(&mut sender, event).await,
            incoming = receiver.next() => answer_client(&mut sender, incoming).await,
        };
        if let Flow::Close = flow {
            break;
        }
    }

    info!("🔌 Dashboard client disconnected");
}

/// First frame on every socket: the status payload tagged `SNAPSHOT`.
async fn snapshot_event(state: &SharedState) -> String {
    let mut snapshot = status_snapshot(state).await;
    snapshot["event"] = json!("SNAPSHOT");
    snapshot.to_string()
}

async fn forward_event(
    sender: &mut SplitSink<WebSocket, Message>,
    event: Result<String, RecvError>,
) -> Flow {
    match event {
        Ok(payload) => match sender.send(Message::Text(payload)).await {
            Ok(()) => Flow::Continue,
            Err(_) => Flow::Close,
        },
        Err(RecvError::Closed) => Flow::Close,
        Err(RecvError::Lagged(skipped)) => {
            debug!(skipped, "Dashboard client lagging — events dropped");
            Flow::Continue
        }
    }
}

/// Clients only send pings and close frames; anything else is ignored.
async fn answer_client(
    sender: &mut SplitSink<WebSocket, Message>,
    incoming: Option<Result<Message, axum::Error>>,
) -> Flow {
    match incoming {
        None | Some(Err(_)) | Some(Ok(Message::Close(_))) => Flow::Close,
        Some(Ok(Message::Ping(payload))) => {
            let _ = sender.send(Message::Pong(payload)).await;
            Flow::Continue
        }
        Some(Ok(_)) => Flow::Continue,
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use crate::routes::{router, tests::call};
    use crate::state::tests::demo_state;

    #[tokio::test]
    async fn test_health_reports_demo_session() {
        let app = router(demo_state());
        let (status, body) = call(&app, "GET", "/api/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["broker"]["mode"], "demo");
        assert_eq!(body["broker"]["connected"], false);
        assert_eq!(body["persistence"]["connected"], false);
        assert_eq!(body["portfolio"]["portfolio_value"], 10000.0);
    }

    #[tokio::test]
    async fn test_socket_opens_with_tagged_snapshot() {
        let state = demo_state();
        let frame: serde_json::Value = serde_json::from_str(&super::snapshot_event(&state).await).unwrap();

        assert_eq!(frame["event"], "SNAPSHOT");
        assert_eq!(frame["broker"]["mode"], "demo");
        assert_eq!(frame["watchlist"][0], "EURUSD");
    }
}
