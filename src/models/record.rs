//! # models::record
//!
//! Rows written to the hosted backend.
//!
//! `TradeRecord`       → table `trades`
//! `PortfolioSnapshot` → table `portfolio_history`
//!
//! Both are built once from a user action, handed to the persistence
//! gateway, and never mutated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::{OrderRequest, Position, Side};

pub const TRADES_TABLE: &str = "trades";
pub const PORTFOLIO_TABLE: &str = "portfolio_history";

// ─── TradeStatus ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    /// Mirrored from a position that is still open.
    Open,
    /// Order accepted by the broker.
    Executed,
    Closed,
}

// ─── TradeRecord ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol:        String,
    /// Stored lower-case (`"buy"` / `"sell"`).
    #[serde(serialize_with = "side_lowercase", deserialize_with = "side_any_case")]
    pub side:          Side,
    pub size:          f64,
    pub entry_price:   f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl:           Option<f64>,
    /// Serialised as ISO-8601.
    pub timestamp:     DateTime<Utc>,
    pub status:        TradeStatus,
}

impl TradeRecord {
    /// Snapshot of a live or demo position, saved with status `open`.
    pub fn from_position(position: &Position) -> Self {
        Self {
            symbol:        position.symbol.clone(),
            side:          position.side,
            size:          position.volume,
            entry_price:   position.entry_price,
            current_price: Some(position.current_price),
            pnl:           Some(position.profit),
            timestamp:     Utc::now(),
            status:        TradeStatus::Open,
        }
    }

    /// Record of an order the broker just accepted.
    pub fn from_order(order: &OrderRequest, fill_price: f64) -> Self {
        Self {
            symbol:        order.symbol.clone(),
            side:          order.side,
            size:          order.volume,
            entry_price:   fill_price,
            current_price: None,
            pnl:           None,
            timestamp:     Utc::now(),
            status:        TradeStatus::Executed,
        }
    }
}

fn side_lowercase<S: Serializer>(side: &Side, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(side.as_db_str())
}

fn side_any_case<'de, D: Deserializer<'de>>(d: D) -> Result<Side, D::Error> {
    let raw = String::deserialize(d)?;
    raw.parse().map_err(serde::de::Error::custom)
}

// ─── PortfolioSnapshot ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp:    DateTime<Utc>,
    pub total_value:  f64,
    pub daily_pnl:    f64,
    pub total_trades: u64,
}

impl PortfolioSnapshot {
    pub fn now(total_value: f64, daily_pnl: f64, total_trades: u64) -> Self {
        Self {
            timestamp: Utc::now(),
            total_value,
            daily_pnl,
            total_trades,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_record_serialises_lowercase_side_and_status() {
        let order = OrderRequest {
            symbol:      "BTCUSD".into(),
            side:        Side::Sell,
            volume:      0.5,
            price:       None,
            stop_loss:   None,
            take_profit: None,
        };
        let record = TradeRecord::from_order(&order, 65000.0);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["side"], "sell");
        assert_eq!(json["status"], "executed");
        assert!(json.get("pnl").is_none());
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_trade_record_reads_backend_row_with_extra_columns() {
        let row = serde_json::json!({
            "id": 7,
            "symbol": "EURUSD",
            "side": "BUY",
            "size": 0.1,
            "entry_price": 1.0945,
            "current_price": 1.0952,
            "pnl": 7.0,
            "timestamp": "2024-05-01T10:00:00+00:00",
            "status": "open"
        });
        let record: TradeRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.side, Side::Buy);
        assert_eq!(record.status, TradeStatus::Open);
        assert_eq!(record.pnl, Some(7.0));
    }
}
