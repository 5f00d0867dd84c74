//! Domain models shared across the dashboard backend.

pub mod position;
pub mod price;
pub mod quote;
pub mod record;

pub use position::{OrderConfirmation, OrderRequest, Position, Side};
pub use price::{EquityPoint, PricePoint};
pub use quote::{Credentials, Quote, SessionInfo};
pub use record::{PortfolioSnapshot, TradeRecord, TradeStatus};
