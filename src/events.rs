//! # events
//!
//! Defines [`DashboardEvent`], everything pushed to `/ws/dashboard`
//! subscribers.
//!
//! Events go through a `tokio::sync::broadcast::Sender<String>` as
//! pre-serialised JSON, which keeps the channel free of Clone constraints.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{OrderConfirmation, OrderRequest, Quote, SessionInfo};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardEvent {
    /// Periodic refresh of the live-data strip.
    Quotes {
        quotes: BTreeMap<String, Quote>,
    },

    BrokerConnected {
        session: Box<SessionInfo>,
    },

    BrokerDisconnected,

    OrderPlaced {
        order:        Box<OrderRequest>,
        confirmation: Box<OrderConfirmation>,
    },

    /// Rejected by the broker or never reached it.
    OrderFailed {
        order: Box<OrderRequest>,
        error: String,
    },

    TradingToggled {
        active: bool,
    },

    /// Persistence gateway (re)configured or its connection test ran.
    PersistenceStatus {
        connected: bool,
        backend:   Option<String>,
        message:   String,
    },
}

impl DashboardEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}
