//! # engine::simulator
//!
//! **Market Data Simulator** — synthetic prices for the dashboard.
//!
//! ## What it produces
//! ```text
//! generate_series  → bounded random walk for the price chart
//! demo_quotes      → bid/ask snapshot per symbol (demo broker, live fallback)
//! portfolio_curve  → daily equity curve for the performance tab
//! ```
//!
//! Each step of the walk is `prev + N(0, base * volatility)`, clamped into
//! `[base * floor_ratio, base * ceil_ratio]`.  Output is reproducible only
//! when a seed is fixed.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, warn};

use crate::models::{EquityPoint, PricePoint, Quote};

/// Base price for symbols without a known reference price.
pub const DEFAULT_BASE_PRICE: f64 = 100.0;

/// Spread as a fraction of the base price.
const SPREAD_RATIO: f64 = 0.0001;

/// Demo quotes jitter the base by up to this fraction either way.
const QUOTE_JITTER: f64 = 0.001;

/// Redraws allowed when a sample comes out NaN/Inf.
const MAX_REDRAWS: usize = 8;

/// Reference prices for the default watchlist.
pub fn base_price(symbol: &str) -> Option<f64> {
    let price = match symbol {
        "EURUSD" => 1.0950,
        "GBPUSD" => 1.2650,
        "USDJPY" => 148.50,
        "AUDUSD" => 0.6750,
        "USDCAD" => 1.3450,
        "BTCUSD" => 65000.0,
        "ETHUSD" => 3200.0,
        "XAUUSD" => 2050.0,
        _ => return None,
    };
    Some(price)
}

// ─── Config ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SimulatorConfig {
    /// Lower band edge as a fraction of the base price.
    pub floor_ratio: f64,
    /// Upper band edge as a fraction of the base price.
    pub ceil_ratio:  f64,
    /// Default per-step standard deviation as a fraction of the base price.
    pub volatility:  f64,
    /// Fixed seed; `None` seeds from OS entropy.
    pub seed:        Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            floor_ratio: 0.8,
            ceil_ratio:  1.2,
            volatility:  0.002,
            seed:        None,
        }
    }
}

// ─── Simulator ────────────────────────────────────────────────────────────────

pub struct MarketDataSimulator {
    config: SimulatorConfig,
    rng:    Mutex<StdRng>,
}

impl MarketDataSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { config, rng: Mutex::new(rng) }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Bounded random walk of `point_count` hourly points ending now.
    pub fn generate_series(
        &self,
        base_price: f64,
        point_count: usize,
        volatility: f64,
    ) -> Vec<PricePoint> {
        let step = Duration::hours(1);
        let start = Utc::now() - step * point_count.saturating_sub(1) as i32;
        self.generate_series_at(base_price, point_count, volatility, start, step)
    }

    /// Same walk as [`Self::generate_series`], stamped from `start` every `step`.
    pub fn generate_series_at(
        &self,
        base_price: f64,
        point_count: usize,
        volatility: f64,
        start: DateTime<Utc>,
        step: Duration,
    ) -> Vec<PricePoint> {
        if !base_price.is_finite() || base_price <= 0.0 || !volatility.is_finite() || volatility < 0.0 {
            warn!(base_price, volatility, "Simulator: invalid series parameters — returning empty series");
            return Vec::new();
        }

        let floor = base_price * self.config.floor_ratio;
        let ceil  = base_price * self.config.ceil_ratio;
        if !(floor > 0.0 && floor <= ceil && ceil.is_finite()) {
            warn!(floor, ceil, "Simulator: invalid price band — returning empty series");
            return Vec::new();
        }

        let sigma = base_price * volatility;
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut prev = base_price;
        let mut points = Vec::with_capacity(point_count);

        for i in 0..point_count {
            prev = next_price(&mut *rng, prev, sigma, floor, ceil);
            points.push(PricePoint {
                timestamp: start + step * i as i32,
                price:     prev,
                volume:    rng.gen_range(100..1000),
            });
        }

        debug!(base_price, point_count, volatility, "Simulator: series generated");
        points
    }

    /// Demo bid/ask for every requested symbol.  Never fails: unknown
    /// symbols are quoted around [`DEFAULT_BASE_PRICE`].
    pub fn demo_quotes<S: AsRef<str>>(&self, symbols: &[S]) -> BTreeMap<String, Quote> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Utc::now().timestamp();

        symbols
            .iter()
            .map(|symbol| {
                let symbol = symbol.as_ref();
                let base = base_price(symbol).unwrap_or(DEFAULT_BASE_PRICE);
                let bid = base + base * QUOTE_JITTER * rng.gen_range(-1.0..=1.0);
                let ask = bid + base * SPREAD_RATIO;

                let quote = Quote {
                    symbol:    symbol.to_string(),
                    bid:       round5(bid),
                    ask:       round5(ask),
                    last:      round5(bid + (ask - bid) / 2.0),
                    volume:    rng.gen_range(100..1000),
                    timestamp: now,
                };
                (symbol.to_string(), quote)
            })
            .collect()
    }

    /// Daily equity curve over `days` days ending today:
    /// `start_value + cumsum(N(0, 100))`.
    pub fn portfolio_curve(&self, days: usize, start_value: f64) -> Vec<EquityPoint> {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let start = Utc::now() - Duration::days(days as i64);
        let mut value = start_value;

        (0..=days)
            .map(|i| {
                let step = standard_normal(&mut *rng) * 100.0;
                if step.is_finite() {
                    value += step;
                }
                EquityPoint {
                    date:  start + Duration::days(i as i64),
                    value,
                }
            })
            .collect()
    }
}

// ─── Sampling ─────────────────────────────────────────────────────────────────

/// One clamped walk step; a non-finite draw is redrawn, and if every redraw
/// fails the price stays where it was.
fn next_price<R: Rng>(rng: &mut R, prev: f64, sigma: f64, floor: f64, ceil: f64) -> f64 {
    for _ in 0..MAX_REDRAWS {
        let candidate = prev + standard_normal(rng) * sigma;
        if candidate.is_finite() {
            return candidate.clamp(floor, ceil);
        }
    }
    prev.clamp(floor, ceil)
}

/// Standard normal via Box-Muller.
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(1e-15); // avoid log(0)
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

fn round5(v: f64) -> f64 {
    (v * 100_000.0).round() / 100_000.0
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(seed: u64) -> MarketDataSimulator {
        MarketDataSimulator::new(SimulatorConfig { seed: Some(seed), ..SimulatorConfig::default() })
    }

    #[test]
    fn test_series_stays_inside_band() {
        let sim = seeded(42);
        // Very high volatility forces the walk into both edges.
        let series = sim.generate_series(50_000.0, 2_000, 0.5);

        assert_eq!(series.len(), 2_000);
        for p in &series {
            assert!(p.price.is_finite());
            assert!(p.price >= 50_000.0 * 0.8 - 1e-9, "below floor: {}", p.price);
            assert!(p.price <= 50_000.0 * 1.2 + 1e-9, "above ceil: {}", p.price);
            assert!((100..1000).contains(&p.volume));
        }
    }

    #[test]
    fn test_series_timestamps_are_ordered() {
        let sim = seeded(7);
        let series = sim.generate_series(1.095, 48, 0.002);
        assert!(series.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_same_seed_same_prices() {
        let start = Utc::now();
        let a = seeded(1).generate_series_at(100.0, 50, 0.01, start, Duration::hours(1));
        let b = seeded(1).generate_series_at(100.0, 50, 0.01, start, Duration::hours(1));
        assert_eq!(a, b);
    }

    #[test]
    fn test_invalid_inputs_give_empty_series() {
        let sim = seeded(3);
        assert!(sim.generate_series(f64::NAN, 10, 0.01).is_empty());
        assert!(sim.generate_series(-5.0, 10, 0.01).is_empty());
        assert!(sim.generate_series(100.0, 10, f64::INFINITY).is_empty());
        assert!(sim.generate_series(100.0, 0, 0.01).is_empty());
    }

    #[test]
    fn test_zero_volatility_is_flat() {
        let sim = seeded(3);
        let series = sim.generate_series(2050.0, 20, 0.0);
        assert!(series.iter().all(|p| p.price == 2050.0));
    }

    #[test]
    fn test_demo_quotes_ask_not_below_bid() {
        let sim = seeded(11);
        let symbols = ["EURUSD", "BTCUSD", "XAUUSD", "USDJPY", "NOT_A_SYMBOL"];

        for _ in 0..200 {
            let quotes = sim.demo_quotes(&symbols);
            assert_eq!(quotes.len(), symbols.len());
            for q in quotes.values() {
                assert!(q.is_well_formed(), "malformed quote: {q:?}");
                assert!(q.bid <= q.last && q.last <= q.ask);
            }
        }
    }

    #[test]
    fn test_unknown_symbol_uses_default_base() {
        let sim = seeded(5);
        let quotes = sim.demo_quotes(&["ZZZ"]);
        let q = &quotes["ZZZ"];
        assert!((q.bid - DEFAULT_BASE_PRICE).abs() <= DEFAULT_BASE_PRICE * QUOTE_JITTER + 1e-9);
        assert!((q.spread() - DEFAULT_BASE_PRICE * SPREAD_RATIO).abs() < 1e-4);
    }

    #[test]
    fn test_portfolio_curve_has_one_point_per_day() {
        let sim = seeded(9);
        let curve = sim.portfolio_curve(30, 10_000.0);
        assert_eq!(curve.len(), 31);
        assert!(curve.iter().all(|p| p.value.is_finite()));
    }
}
