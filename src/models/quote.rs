//! # models::quote
//!
//! Defines [`Quote`], the per-symbol price snapshot shown on the live-data
//! strip of the dashboard, plus the broker session types returned by
//! `connect`.
//!
//! A quote is ephemeral: it is regenerated (demo) or re-fetched (live) on
//! every refresh cycle and never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Quote ────────────────────────────────────────────────────────────────────

/// A single bid/ask snapshot for one symbol.
///
/// Invariant: `ask >= bid >= 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// The trading symbol, e.g. `"EURUSD"`, `"BTCUSD"`, `"XAUUSD"`.
    pub symbol: String,

    /// Price at which the market buys from us.
    pub bid: f64,

    /// Price at which the market sells to us.
    pub ask: f64,

    /// Last traded price. Demo quotes use the bid/ask midpoint.
    pub last: f64,

    /// Tick volume.
    pub volume: u64,

    /// Epoch seconds of the tick.
    pub timestamp: i64,
}

impl Quote {
    /// `ask - bid`, shown as the delta under each live price.
    #[inline]
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    #[inline]
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }

    /// `true` when the quote honours `ask >= bid >= 0` with finite prices.
    pub fn is_well_formed(&self) -> bool {
        self.bid.is_finite() && self.ask.is_finite() && self.bid >= 0.0 && self.ask >= self.bid
    }
}

// ─── Session ──────────────────────────────────────────────────────────────────

/// Login details for a terminal account.
///
/// When absent, `connect` attaches to whatever session the running terminal
/// is already logged into.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub login:    u64,
    pub password: String,
    pub server:   String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("login", &self.login)
            .field("password", &"***")
            .field("server", &self.server)
            .finish()
    }
}

/// Account details reported by the broker after a successful `connect`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Account number (0 in demo mode).
    pub login:        u64,
    pub server:       String,
    pub currency:     String,
    pub balance:      f64,
    pub equity:       f64,
    /// `"live"` or `"demo"`.
    pub mode:         String,
    pub connected_at: DateTime<Utc>,
}
