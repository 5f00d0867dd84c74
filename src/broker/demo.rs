//! # broker::demo
//!
//! Demo broker: quotes from the simulator, synthetic fills, and a fixed
//! in-memory position book that lives as long as the session.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use tracing::info;

use crate::engine::simulator::MarketDataSimulator;
use crate::models::{OrderConfirmation, OrderRequest, Position, Quote, SessionInfo, Side};

/// Starting balance shown for a demo session.
pub const DEMO_BALANCE: f64 = 10_000.0;

pub struct DemoBroker {
    simulator: Arc<MarketDataSimulator>,
    /// Created on first read, then handed out unchanged.
    positions: OnceLock<Arc<Vec<Position>>>,
}

impl DemoBroker {
    pub fn new(simulator: Arc<MarketDataSimulator>) -> Self {
        Self { simulator, positions: OnceLock::new() }
    }

    pub fn session(&self) -> SessionInfo {
        SessionInfo {
            login:        0,
            server:       "demo".to_string(),
            currency:     "USD".to_string(),
            balance:      DEMO_BALANCE,
            equity:       DEMO_BALANCE,
            mode:         "demo".to_string(),
            connected_at: Utc::now(),
        }
    }

    pub fn quotes<S: AsRef<str>>(&self, symbols: &[S]) -> BTreeMap<String, Quote> {
        self.simulator.demo_quotes(symbols)
    }

    /// The session's demo book.  Every call returns the same allocation.
    pub fn positions(&self) -> Arc<Vec<Position>> {
        self.positions
            .get_or_init(|| Arc::new(vec![demo_position()]))
            .clone()
    }

    pub fn place_order(&self, order: &OrderRequest) -> OrderConfirmation {
        info!(
            symbol = %order.symbol,
            side   = %order.side,
            volume = order.volume,
            "🎭 [DEMO] Simulating order fill"
        );

        OrderConfirmation {
            ticket:  None,
            message: format!("DEMO: {} order for {} {} placed", order.side, order.volume, order.symbol),
            price:   Some(self.fill_price(order)),
            demo:    true,
        }
    }

    /// Limit price if given, otherwise the side of the simulated book the
    /// order crosses.
    fn fill_price(&self, order: &OrderRequest) -> f64 {
        if let Some(price) = order.price {
            return price;
        }
        let quotes = self.simulator.demo_quotes(&[order.symbol.as_str()]);
        match (quotes.get(&order.symbol), order.side) {
            (Some(q), Side::Buy) => q.ask,
            (Some(q), Side::Sell) => q.bid,
            (None, _) => 0.0,
        }
    }
}

fn demo_position() -> Position {
    Position {
        ticket:        12345,
        symbol:        "EURUSD".to_string(),
        side:          Side::Buy,
        volume:        0.1,
        entry_price:   1.0945,
        current_price: 1.0952,
        profit:        7.00,
        comment:       "Demo position".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulator::SimulatorConfig;

    fn broker() -> DemoBroker {
        DemoBroker::new(Arc::new(MarketDataSimulator::new(SimulatorConfig { seed: Some(7), ..SimulatorConfig::default() })))
    }

    fn order(side: Side, price: Option<f64>) -> OrderRequest {
        OrderRequest {
            symbol:      "EURUSD".into(),
            side,
            volume:      0.1,
            price,
            stop_loss:   None,
            take_profit: None,
        }
    }

    #[test]
    fn test_limit_price_is_the_fill() {
        let confirmation = broker().place_order(&order(Side::Buy, Some(1.2)));
        assert_eq!(confirmation.price, Some(1.2));
    }

    #[test]
    fn test_market_fill_is_near_symbol_base() {
        let confirmation = broker().place_order(&order(Side::Sell, None));
        let price = confirmation.price.unwrap();
        assert!((price - 1.0950).abs() < 0.01, "fill {price}");
    }
}
