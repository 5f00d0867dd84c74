//! # AutoTrader Pro — Trading Dashboard Backend
//!
//! ## Architecture Overview
//!
//! ```text
//!  ┌──────────────┐   REST /api/*            ┌───────────────────────────┐
//!  │  Dashboard   │ ────────────────────────▶│   AppState                │
//!  │  (browser)   │                          │   ├─ MarketDataSimulator  │
//!  │              │ ◀──── /ws/dashboard ──── │   ├─ BrokerGateway ───────┼──▶ MT5 terminal bridge
//!  └──────────────┘   quotes, orders, status │   └─ Persistence ─────────┼──▶ hosted backend (REST)
//!                                            │                           │    or Postgres (native)
//!                                            └───────────────────────────┘
//! ```
//!
//! With no terminal and no backend configured the server still runs:
//! prices come from the simulator and the demo broker holds the book.
//!
//! ## Environment Variables
//!
//! | Variable              | Default                 | Description                          |
//! |-----------------------|-------------------------|--------------------------------------|
//! | `BIND_ADDR`           | `0.0.0.0:3000`          | Address Axum listens on              |
//! | `BROKER_MODE`         | `demo`                  | `demo` or `live`                     |
//! | `MT5_BASE_URL`        | `http://localhost:8081` | MT5 terminal bridge                  |
//! | `MT5_LOGIN` / `MT5_PASSWORD` / `MT5_SERVER` | — | Login used when connecting      |
//! | `PERSISTENCE_MODE`    | `rest`                  | `rest` or `native`                   |
//! | `BACKEND_URL` / `BACKEND_KEY` | —               | Hosted backend REST surface          |
//! | `BACKEND_SERVICE_KEY` | —                       | Wins over `BACKEND_KEY` when set     |
//! | `DATABASE_URL`        | —                       | Postgres URL for `native` mode       |
//! | `REQUEST_TIMEOUT_SECS`| `10`                    | Timeout for every gateway call       |
//! | `WATCHLIST`           | `EURUSD,GBPUSD,BTCUSD,XAUUSD` | Live-data strip symbols        |
//! | `AUTO_REFRESH_SECS`   | `2`                     | Quote push interval, `0` disables    |
//! | `SIM_FLOOR_RATIO` / `SIM_CEIL_RATIO` / `SIM_VOLATILITY` / `SIM_SEED` | | Simulator tuning |
//! | `RUST_LOG`            | `autotrader=debug`      | Tracing filter                       |

use std::net::SocketAddr;

use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod broker;
mod config;
mod engine;
mod error;
mod events;
mod models;
mod persistence;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use config::Config;
use engine::refresh::spawn_auto_refresh;
use state::build_state;

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional — CI/prod can use real env vars) ──────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("autotrader=debug".parse()?)
            .add_directive("tower_http=info".parse()?)
            .add_directive("reqwest=warn".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        AUTOTRADER PRO — Dashboard Backend     ║
  ║        Rust + Axum  ·  Simulator & Gateways   ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Configuration ─────────────────────────────────────────────────────
    let config = Config::from_env()?;
    info!(
        broker = %config.broker_mode,
        persistence = %config.persistence_mode,
        watchlist = ?config.watchlist,
        "⚙️ Configuration loaded"
    );
    let bind_addr = config.bind_addr.clone();

    // ── 4. Build shared state (connectors degrade, never abort) ──────────────
    let state = build_state(config).await;
    spawn_auto_refresh(state.clone());

    // ── 5. Build CORS layer (dashboard served from another origin) ──────────
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // ── 6. Build the Axum router ─────────────────────────────────────────────
    let app = routes::router(state.clone())
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // ── 7. Resolve bind address ──────────────────────────────────────────────
    let addr: SocketAddr = bind_addr.parse()?;

    info!(?addr, session = %state.session_id, "🚀 AutoTrader server starting");

    // ── 8. Start the server ──────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
