//! # routes::market
//!
//! | Method | Path                 | Description                                   |
//! |--------|----------------------|-----------------------------------------------|
//! | GET    | `/api/market/quotes` | latest quotes for `?symbols=` or the watchlist |
//! | GET    | `/api/market/series` | simulated chart series                        |
//! | PUT    | `/api/watchlist`     | replace the live-data symbols                 |

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::parse_watchlist;
use crate::engine::simulator::base_price;
use crate::error::AppError;
use crate::state::SharedState;

/// 30 days of hourly points, both ends included.
pub const DEFAULT_SERIES_POINTS: usize = 30 * 24 + 1;
pub const MAX_SERIES_POINTS: usize = 10_000;
/// Chart anchor when neither `base` nor `symbol` is given.
pub const CHART_SYMBOL: &str = "BTCUSD";
pub const CHART_FALLBACK_BASE: f64 = 50_000.0;

// ─── GET /api/market/quotes ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QuotesQuery {
    /// Comma-separated; defaults to the watchlist.
    pub symbols: Option<String>,
}

pub async fn get_quotes(
    State(state): State<SharedState>,
    Query(query): Query<QuotesQuery>,
) -> impl IntoResponse {
    let symbols = match query.symbols {
        Some(raw) => parse_watchlist(&raw),
        None => state.watchlist().await,
    };

    let broker = state.broker.read().await;
    let quotes = broker.get_quotes(&symbols).await;

    Json(json!({
        "ok":     true,
        "mode":   broker.mode().to_string(),
        "quotes": quotes,
    }))
}

// ─── GET /api/market/series ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SeriesQuery {
    pub symbol:     Option<String>,
    pub base:       Option<f64>,
    pub points:     Option<usize>,
    pub volatility: Option<f64>,
}

/// Hourly series ending now.  Without an explicit `base` the series is
/// anchored on the symbol's latest price (live when connected).
pub async fn get_series(
    State(state): State<SharedState>,
    Query(query): Query<SeriesQuery>,
) -> Result<impl IntoResponse, AppError> {
    let points = query.points.unwrap_or(DEFAULT_SERIES_POINTS);
    if points > MAX_SERIES_POINTS {
        return Err(AppError::BadRequest(format!("points must be <= {MAX_SERIES_POINTS}")));
    }

    let symbol = query
        .symbol
        .map(|s| s.trim().to_uppercase())
        .unwrap_or_else(|| CHART_SYMBOL.to_string());

    if let Some(base) = query.base {
        if !base.is_finite() || base <= 0.0 {
            return Err(AppError::BadRequest(format!("base must be a positive number (got {base})")));
        }
    }
    let volatility = query.volatility.unwrap_or(state.simulator.config().volatility);
    if !volatility.is_finite() || volatility < 0.0 {
        return Err(AppError::BadRequest(format!("volatility must be >= 0 (got {volatility})")));
    }

    let base = match query.base {
        Some(base) => base,
        None => anchor_price(&state, &symbol).await,
    };

    let series = state.simulator.generate_series(base, points, volatility);

    Ok(Json(json!({
        "ok":         true,
        "symbol":     symbol,
        "base":       base,
        "volatility": volatility,
        "points":     series,
    })))
}

async fn anchor_price(state: &SharedState, symbol: &str) -> f64 {
    let broker = state.broker.read().await;
    if broker.is_connected() {
        let quotes = broker.get_quotes(&[symbol.to_string()]).await;
        if let Some(quote) = quotes.get(symbol) {
            if quote.last > 0.0 {
                return quote.last;
            }
        }
    }

    if symbol == CHART_SYMBOL {
        CHART_FALLBACK_BASE
    } else {
        base_price(symbol).unwrap_or(CHART_FALLBACK_BASE)
    }
}

// ─── PUT /api/watchlist ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct WatchlistUpdate {
    pub symbols: Vec<String>,
}

pub async fn set_watchlist(
    State(state): State<SharedState>,
    Json(update): Json<WatchlistUpdate>,
) -> Result<impl IntoResponse, AppError> {
    let symbols = parse_watchlist(&update.symbols.join(","));
    if symbols.is_empty() {
        return Err(AppError::BadRequest("watchlist needs at least one symbol".into()));
    }

    info!(?symbols, "Watchlist updated");
    *state.watchlist.write().await = symbols.clone();

    Ok(Json(json!({ "ok": true, "watchlist": symbols })))
}
