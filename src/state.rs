//! # state
//!
//! AppState — the single dashboard session.  Holds the portfolio metrics,
//! the watchlist, both gateways, the event channel and the shared HTTP
//! client.  Created once at startup and handed to every handler.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

use crate::broker::{BrokerGateway, TerminalClient};
use crate::config::{BrokerMode, Config, PersistenceMode};
use crate::engine::simulator::MarketDataSimulator;
use crate::events::DashboardEvent;
use crate::models::PortfolioSnapshot;
use crate::persistence::{Persistence, RestClient};

/// Starting portfolio value of a fresh session.
pub const INITIAL_PORTFOLIO_VALUE: f64 = 10_000.0;

// ─── Portfolio Metrics ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioState {
    pub portfolio_value: f64,
    pub daily_pnl:       f64,
    pub total_trades:    u64,
    /// Start/Stop Trading toggle.
    pub trading_active:  bool,
}

impl Default for PortfolioState {
    fn default() -> Self {
        Self {
            portfolio_value: INITIAL_PORTFOLIO_VALUE,
            daily_pnl:       0.0,
            total_trades:    0,
            trading_active:  false,
        }
    }
}

impl PortfolioState {
    pub fn snapshot(&self) -> PortfolioSnapshot {
        PortfolioSnapshot::now(self.portfolio_value, self.daily_pnl, self.total_trades)
    }
}

// ─── AppState ─────────────────────────────────────────────────────────────────

pub struct AppState {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config:     Arc<Config>,

    pub simulator: Arc<MarketDataSimulator>,

    /// Write lock only for connect / disconnect.
    pub broker: RwLock<BrokerGateway>,

    /// `None` until a backend is configured and its connection test passes.
    pub persistence: RwLock<Option<Arc<Persistence>>>,

    pub portfolio: RwLock<PortfolioState>,

    /// Symbols on the live-data strip.
    pub watchlist: RwLock<Vec<String>>,

    /// Pre-serialised [`DashboardEvent`]s for WebSocket clients.
    pub broadcast_tx: broadcast::Sender<String>,

    /// Shared by both gateways (connection pooling).
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Fresh session with gateways built from `config` but not yet
    /// connected.
    pub fn new(config: Config) -> Self {
        let (broadcast_tx, _) = broadcast::channel(256);
        let http_client = reqwest::Client::new();
        let simulator = Arc::new(MarketDataSimulator::new(config.simulator.clone()));

        let broker = match config.broker_mode {
            BrokerMode::Demo => BrokerGateway::demo(simulator.clone()),
            BrokerMode::Live => BrokerGateway::live(
                TerminalClient::new(http_client.clone(), &config.mt5_base_url, config.request_timeout),
                simulator.clone(),
            ),
        };

        Self {
            session_id:   Uuid::new_v4(),
            started_at:   Utc::now(),
            watchlist:    RwLock::new(config.watchlist.clone()),
            config:       Arc::new(config),
            simulator,
            broker:       RwLock::new(broker),
            persistence:  RwLock::new(None),
            portfolio:    RwLock::new(PortfolioState::default()),
            broadcast_tx,
            http_client,
        }
    }

    // ── Helper Methods ────────────────────────────────────────────────────────

    /// Send to all WebSocket clients; a no-op when nobody listens.
    pub fn broadcast(&self, event: &DashboardEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }

    /// Clone of the current persistence gateway (lock released on return).
    pub async fn persistence(&self) -> Option<Arc<Persistence>> {
        self.persistence.read().await.clone()
    }

    pub async fn set_persistence(&self, gateway: Option<Persistence>) {
        let mut guard = self.persistence.write().await;
        *guard = gateway.map(Arc::new);
    }

    pub async fn watchlist(&self) -> Vec<String> {
        self.watchlist.read().await.clone()
    }

    pub async fn record_trade(&self) {
        let mut guard = self.portfolio.write().await;
        guard.total_trades += 1;
    }

    /// Build the persistence gateway the config asks for.  `None` when the
    /// required settings are missing.
    pub async fn persistence_from_config(&self) -> Option<Persistence> {
        let config = &self.config;
        match config.persistence_mode {
            PersistenceMode::Rest => {
                let url = config.backend_url.as_deref()?;
                let key = config.effective_backend_key()?;
                Some(Persistence::Rest(RestClient::new(
                    self.http_client.clone(),
                    url,
                    key,
                    config.request_timeout,
                )))
            }
            #[cfg(feature = "postgres")]
            PersistenceMode::Native => {
                let url = config.database_url.as_deref()?;
                match crate::persistence::NativeClient::connect(url, config.request_timeout).await {
                    Ok(client) => Some(Persistence::Native(client)),
                    Err(e) => {
                        warn!(error = %e, "Native persistence unavailable");
                        None
                    }
                }
            }
            #[cfg(not(feature = "postgres"))]
            PersistenceMode::Native => {
                warn!("PERSISTENCE_MODE=native requires building with --features postgres");
                None
            }
        }
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

/// Build the session and bring up whatever connectors the config enables.
/// Connector failures leave the session running in its degraded mode.
pub async fn build_state(config: Config) -> SharedState {
    let state = Arc::new(AppState::new(config));

    // ── Broker ────────────────────────────────────────────────────────────────
    if state.config.broker_mode == BrokerMode::Live {
        let credentials = state.config.mt5_credentials.clone();
        let mut broker = state.broker.write().await;
        if let Err(e) = broker.connect(credentials.as_ref()).await {
            warn!(error = %e, "Terminal not connected at startup — serving demo data");
        }
    }

    // ── Persistence ───────────────────────────────────────────────────────────
    match state.persistence_from_config().await {
        Some(gateway) => match gateway.test_connection().await {
            Ok(()) => state.set_persistence(Some(gateway)).await,
            Err(e) => warn!(error = %e, hint = ?e.hint(), "Backend connection test failed — persistence disabled"),
        },
        None => info!("No backend configured — persistence disabled"),
    }

    state
}
