//! # engine::refresh
//!
//! Auto-refresh loop for the live-data strip.  Every tick it pulls quotes
//! for the watchlist through the broker gateway and broadcasts them as a
//! [`DashboardEvent::Quotes`].  Ticks with no subscribers are skipped.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::events::DashboardEvent;
use crate::state::SharedState;

/// Spawn the refresh task; `None` when auto-refresh is disabled.
pub fn spawn_auto_refresh(state: SharedState) -> Option<JoinHandle<()>> {
    let period = state.config.auto_refresh?;
    info!(every = ?period, "🔄 Auto-refresh enabled");
    Some(tokio::spawn(run(state, period)))
}

async fn run(state: SharedState, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if state.broadcast_tx.receiver_count() == 0 {
            continue;
        }
        refresh_once(&state).await;
    }
}

/// One refresh cycle.  Returns the number of symbols quoted.
pub async fn refresh_once(state: &SharedState) -> usize {
    let watchlist = state.watchlist().await;
    let quotes = state.broker.read().await.get_quotes(&watchlist).await;
    let count = quotes.len();

    debug!(symbols = count, "Pushing quote refresh");
    state.broadcast(&DashboardEvent::Quotes { quotes });
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::demo_state;

    #[tokio::test]
    async fn test_refresh_broadcasts_watchlist_quotes() {
        let state = demo_state();
        let mut rx = state.broadcast_tx.subscribe();

        assert_eq!(refresh_once(&state).await, 4);

        let message: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(message["event"], "QUOTES");
        assert!(message["quotes"]["EURUSD"]["bid"].as_f64().unwrap() > 0.0);
        assert!(message["quotes"].get("XAUUSD").is_some());
    }

    #[tokio::test]
    async fn test_disabled_refresh_spawns_nothing() {
        let state = demo_state();
        assert!(spawn_auto_refresh(state).is_none());
    }
}
