//! # broker — Broker Gateway
//!
//! One gateway per session, built from `BROKER_MODE` at startup.
//!
//! ```text
//!                 connect ok
//!  Disconnected ─────────────▶ Connected
//!       ▲                          │
//!       └────────── disconnect ────┘
//! ```
//!
//! While Disconnected (or in demo mode) every call is served by the
//! [`DemoBroker`].  In live mode a failing terminal never reaches the caller:
//! quotes degrade to demo quotes and positions to an empty book.

pub mod demo;
pub mod terminal;

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::BrokerMode;
use crate::engine::simulator::MarketDataSimulator;
use crate::error::{ConnectError, OrderError};
use crate::models::{Credentials, OrderConfirmation, OrderRequest, Position, Quote, SessionInfo};

pub use demo::DemoBroker;
pub use terminal::TerminalClient;

use terminal::TerminalOrderRequest;

/// Where orders and prices come from once connected.
pub enum Venue {
    Demo,
    LiveTerminal(TerminalClient),
}

pub struct BrokerGateway {
    venue:   Venue,
    demo:    DemoBroker,
    session: Option<SessionInfo>,
}

impl BrokerGateway {
    pub fn demo(simulator: Arc<MarketDataSimulator>) -> Self {
        Self {
            venue:   Venue::Demo,
            demo:    DemoBroker::new(simulator),
            session: None,
        }
    }

    pub fn live(client: TerminalClient, simulator: Arc<MarketDataSimulator>) -> Self {
        Self {
            venue:   Venue::LiveTerminal(client),
            demo:    DemoBroker::new(simulator),
            session: None,
        }
    }

    pub fn mode(&self) -> BrokerMode {
        match self.venue {
            Venue::Demo => BrokerMode::Demo,
            Venue::LiveTerminal(_) => BrokerMode::Live,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&SessionInfo> {
        self.session.as_ref()
    }

    /// The live terminal, only while connected.
    fn live_terminal(&self) -> Option<&TerminalClient> {
        match (&self.venue, &self.session) {
            (Venue::LiveTerminal(client), Some(_)) => Some(client),
            _ => None,
        }
    }

    // ─── Lifecycle ────────────────────────────────────────────────────────────

    /// Open a session.  Without credentials a live gateway attaches to the
    /// account the terminal is already logged into.
    pub async fn connect(
        &mut self,
        credentials: Option<&Credentials>,
    ) -> Result<SessionInfo, ConnectError> {
        let session = match &self.venue {
            Venue::Demo => self.demo.session(),
            Venue::LiveTerminal(client) => {
                let account = client.open_session(credentials).await.map_err(|e| {
                    error!(error = %e, url = %client.base_url(), "Terminal connect failed");
                    e
                })?;

                SessionInfo {
                    login:        account.login,
                    server:       account.server,
                    currency:     account.currency,
                    balance:      account.balance,
                    equity:       account.equity,
                    mode:         "live".to_string(),
                    connected_at: chrono::Utc::now(),
                }
            }
        };

        info!(login = session.login, server = %session.server, mode = %session.mode, "🔌 Broker connected");
        self.session = Some(session.clone());
        Ok(session)
    }

    pub async fn disconnect(&mut self) {
        if let Some(client) = self.live_terminal() {
            client.shutdown().await;
        }
        if self.session.take().is_some() {
            info!("Broker disconnected");
        }
    }

    // ─── Market Data ──────────────────────────────────────────────────────────

    /// Latest quote per symbol.  Never fails.
    pub async fn get_quotes(&self, symbols: &[String]) -> BTreeMap<String, Quote> {
        let Some(client) = self.live_terminal() else {
            return self.demo.quotes(symbols);
        };

        let mut quotes = BTreeMap::new();
        for symbol in symbols {
            match client.symbol_tick(symbol).await {
                Ok(Some(quote)) => {
                    quotes.insert(symbol.clone(), quote);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, symbol = %symbol, "Live quotes failed — falling back to demo quotes");
                    return self.demo.quotes(symbols);
                }
            }
        }
        quotes
    }

    // ─── Positions ────────────────────────────────────────────────────────────

    pub async fn get_positions(&self) -> Arc<Vec<Position>> {
        let Some(client) = self.live_terminal() else {
            return self.demo.positions();
        };

        match client.positions().await {
            Ok(positions) => Arc::new(positions),
            Err(e) => {
                error!(error = %e, "Error getting live positions");
                Arc::new(Vec::new())
            }
        }
    }

    // ─── Orders ───────────────────────────────────────────────────────────────

    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderConfirmation, OrderError> {
        validate_order(order)?;

        let Some(client) = self.live_terminal() else {
            return Ok(self.demo.place_order(order));
        };

        let result = client.order_send(&TerminalOrderRequest::from_order(order)).await?;
        let ticket = result.order;

        Ok(OrderConfirmation {
            ticket,
            message: match ticket {
                Some(t) => format!("Order placed successfully! Ticket: {t}"),
                None => "Order placed successfully!".to_string(),
            },
            // The terminal reports 0.0 when it has no deal price.
            price: result.price.filter(|p| p.is_finite() && *p > 0.0),
            demo: false,
        })
    }
}

fn validate_order(order: &OrderRequest) -> Result<(), OrderError> {
    if order.symbol.trim().is_empty() {
        return Err(OrderError::Invalid("symbol is required".into()));
    }
    if !order.volume.is_finite() || order.volume <= 0.0 {
        return Err(OrderError::Invalid(format!("volume must be > 0 (got {})", order.volume)));
    }
    for (name, level) in [("price", order.price), ("stop_loss", order.stop_loss), ("take_profit", order.take_profit)] {
        if let Some(v) = level {
            if !v.is_finite() || v <= 0.0 {
                return Err(OrderError::Invalid(format!("{name} must be > 0 (got {v})")));
            }
        }
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
