//! # models::position
//!
//! Open positions and the order request/confirmation pair.
//!
//! `Position`          = what the broker (or the demo book) says is open now
//! `OrderRequest`      = what the dashboard asks the broker to execute
//! `OrderConfirmation` = what came back when the broker accepted it

use serde::{Deserialize, Serialize};

// ─── Side ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Lower-case label used by the `trades` table (`"buy"` / `"sell"`).
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Side::Buy  => "buy",
            Side::Sell => "sell",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy  => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY"  => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other  => Err(format!("unknown side '{other}'")),
        }
    }
}

// ─── Position ─────────────────────────────────────────────────────────────────

/// An open position, mirrored from the terminal or held as demo state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Broker ticket number.
    pub ticket:        u64,
    pub symbol:        String,
    pub side:          Side,
    /// Lots, always > 0.
    pub volume:        f64,
    pub entry_price:   f64,
    pub current_price: f64,
    /// Floating profit in account currency, as reported by the broker.
    pub profit:        f64,
    pub comment:       String,
}

impl Position {
    /// Percent move from entry, positive when the position is in profit.
    pub fn pnl_percent(&self) -> f64 {
        if self.entry_price <= 0.0 {
            return 0.0;
        }
        let raw = (self.current_price - self.entry_price) / self.entry_price * 100.0;
        match self.side {
            Side::Buy  => raw,
            Side::Sell => -raw,
        }
    }
}

// ─── Orders ───────────────────────────────────────────────────────────────────

/// A market order as entered on the Trade tab.
///
/// `price`, `stop_loss` and `take_profit` are only forwarded when set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol:      String,
    pub side:        Side,
    pub volume:      f64,
    #[serde(default)]
    pub price:       Option<f64>,
    #[serde(default)]
    pub stop_loss:   Option<f64>,
    #[serde(default)]
    pub take_profit: Option<f64>,
}

/// Broker acknowledgement for an accepted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// Ticket assigned by the broker (`None` for demo fills).
    pub ticket:  Option<u64>,
    pub message: String,
    /// Fill price: the terminal's deal price, or the simulated fill in demo
    /// mode.  `None` when the terminal did not report one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price:   Option<f64>,
    pub demo:    bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(side: Side, entry: f64, current: f64) -> Position {
        Position {
            ticket:        1,
            symbol:        "EURUSD".into(),
            side,
            volume:        0.1,
            entry_price:   entry,
            current_price: current,
            profit:        0.0,
            comment:       String::new(),
        }
    }

    #[test]
    fn test_pnl_percent_buy_in_profit() {
        let p = position(Side::Buy, 100.0, 110.0);
        assert!((p.pnl_percent() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_pnl_percent_sell_is_sign_adjusted() {
        let p = position(Side::Sell, 100.0, 110.0);
        assert!((p.pnl_percent() + 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_side_parse_is_case_insensitive() {
        assert_eq!("buy".parse::<Side>(), Ok(Side::Buy));
        assert_eq!("Sell".parse::<Side>(), Ok(Side::Sell));
        assert!("hold".parse::<Side>().is_err());
    }
}
