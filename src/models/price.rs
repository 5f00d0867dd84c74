//! # models::price
//!
//! A single point on a simulated price chart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One sample of an ordered price series.
///
/// `price` is always finite and inside the simulator's band around its base
/// price; `volume` is a synthetic tick count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price:     f64,
    pub volume:    u64,
}

/// One day on the simulated portfolio-value curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date:  DateTime<Utc>,
    pub value: f64,
}
