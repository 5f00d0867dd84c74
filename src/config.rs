//! # config — read Config from environment variables
//!
//! Loaded once at startup.  The broker and persistence implementations are
//! chosen here, so the rest of the system only ever sees one of each.

use std::time::Duration;
use anyhow::{bail, Context};

use crate::engine::simulator::SimulatorConfig;
use crate::models::Credentials;

/// Which [`crate::broker::BrokerGateway`] venue to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerMode {
    Demo,   // simulator + in-memory positions
    Live,   // MetaTrader 5 terminal bridge
}

impl std::fmt::Display for BrokerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrokerMode::Demo => write!(f, "demo"),
            BrokerMode::Live => write!(f, "live"),
        }
    }
}

/// Which [`crate::persistence::Persistence`] variant to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    Rest,     // hosted backend REST surface
    Native,   // direct Postgres connection (feature "postgres")
}

impl std::fmt::Display for PersistenceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceMode::Rest   => write!(f, "rest"),
            PersistenceMode::Native => write!(f, "native"),
        }
    }
}

/// Everything the dashboard backend needs.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr:         String,
    pub broker_mode:       BrokerMode,
    /// Base URL of the MT5 terminal bridge.
    pub mt5_base_url:      String,
    /// Optional login used when connecting at startup.
    pub mt5_credentials:   Option<Credentials>,
    pub persistence_mode:  PersistenceMode,
    /// Hosted backend base URL, e.g. `https://xyz.supabase.co`.
    pub backend_url:       Option<String>,
    /// Anon key.
    pub backend_key:       Option<String>,
    /// Service-role key for administrative deployments; wins over the anon key.
    pub backend_service_key: Option<String>,
    /// Postgres URL for the native client.
    pub database_url:      Option<String>,
    /// Timeout applied to every gateway call.
    pub request_timeout:   Duration,
    /// Symbols shown on the live-data strip.
    pub watchlist:         Vec<String>,
    /// Quote push interval; `None` disables auto-refresh.
    pub auto_refresh:      Option<Duration>,
    pub simulator:         SimulatorConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let broker_mode = match env_or("BROKER_MODE", "demo").to_lowercase().as_str() {
            "demo" => BrokerMode::Demo,
            "live" => BrokerMode::Live,
            other => bail!("Unknown BROKER_MODE: '{other}'. Use 'demo' or 'live'"),
        };

        let persistence_mode = match env_or("PERSISTENCE_MODE", "rest").to_lowercase().as_str() {
            "rest"   => PersistenceMode::Rest,
            "native" => PersistenceMode::Native,
            other => bail!("Unknown PERSISTENCE_MODE: '{other}'. Use 'rest' or 'native'"),
        };

        let timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", "10")
            .parse()
            .context("REQUEST_TIMEOUT_SECS must be a number")?;

        let refresh_secs: u64 = env_or("AUTO_REFRESH_SECS", "2")
            .parse()
            .context("AUTO_REFRESH_SECS must be a number")?;

        let mt5_credentials = match (
            std::env::var("MT5_LOGIN").ok(),
            std::env::var("MT5_PASSWORD").ok(),
            std::env::var("MT5_SERVER").ok(),
        ) {
            (Some(login), Some(password), Some(server)) => Some(Credentials {
                login: login.parse().context("MT5_LOGIN must be an account number")?,
                password,
                server,
            }),
            _ => None,
        };

        let mut simulator = SimulatorConfig::default();
        if let Some(v) = env_f64("SIM_FLOOR_RATIO")? { simulator.floor_ratio = v; }
        if let Some(v) = env_f64("SIM_CEIL_RATIO")?  { simulator.ceil_ratio = v; }
        if let Some(v) = env_f64("SIM_VOLATILITY")?  { simulator.volatility = v; }
        simulator.seed = parse_seed(non_empty("SIM_SEED").as_deref())?;
        validate_simulator(&simulator)?;

        Ok(Self {
            bind_addr:           env_or("BIND_ADDR", "0.0.0.0:3000"),
            broker_mode,
            mt5_base_url:        env_or("MT5_BASE_URL", "http://localhost:8081"),
            mt5_credentials,
            persistence_mode,
            backend_url:         non_empty("BACKEND_URL"),
            backend_key:         non_empty("BACKEND_KEY"),
            backend_service_key: non_empty("BACKEND_SERVICE_KEY"),
            database_url:        non_empty("DATABASE_URL"),
            request_timeout:     Duration::from_secs(timeout_secs),
            watchlist:           parse_watchlist(&env_or("WATCHLIST", "EURUSD,GBPUSD,BTCUSD,XAUUSD")),
            auto_refresh:        (refresh_secs > 0).then(|| Duration::from_secs(refresh_secs)),
            simulator,
        })
    }

    /// Key sent to the REST backend: service-role when present, else anon.
    pub fn effective_backend_key(&self) -> Option<&str> {
        self.backend_service_key
            .as_deref()
            .or(self.backend_key.as_deref())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr:           "0.0.0.0:3000".to_string(),
            broker_mode:         BrokerMode::Demo,
            mt5_base_url:        "http://localhost:8081".to_string(),
            mt5_credentials:     None,
            persistence_mode:    PersistenceMode::Rest,
            backend_url:         None,
            backend_key:         None,
            backend_service_key: None,
            database_url:        None,
            request_timeout:     Duration::from_secs(10),
            watchlist:           parse_watchlist("EURUSD,GBPUSD,BTCUSD,XAUUSD"),
            auto_refresh:        Some(Duration::from_secs(2)),
            simulator:           SimulatorConfig::default(),
        }
    }
}

/// Splits a comma-separated symbol list, upper-cased, empties dropped.
pub fn parse_watchlist(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// `0 < floor <= 1 <= ceil`, all finite, and a finite non-negative volatility.
pub fn validate_simulator(sim: &SimulatorConfig) -> anyhow::Result<()> {
    let band_ok = sim.floor_ratio.is_finite()
        && sim.ceil_ratio.is_finite()
        && sim.floor_ratio > 0.0
        && sim.floor_ratio <= 1.0
        && sim.ceil_ratio >= 1.0;
    if !band_ok {
        bail!(
            "Simulator band must satisfy 0 < SIM_FLOOR_RATIO <= 1 <= SIM_CEIL_RATIO (got {} / {})",
            sim.floor_ratio,
            sim.ceil_ratio
        );
    }
    if !sim.volatility.is_finite() || sim.volatility < 0.0 {
        bail!("SIM_VOLATILITY must be a finite number >= 0 (got {})", sim.volatility);
    }
    Ok(())
}

fn parse_seed(raw: Option<&str>) -> anyhow::Result<Option<u64>> {
    raw.map(|v| v.trim().parse().context("SIM_SEED must be an unsigned integer"))
        .transpose()
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_f64(key: &str) -> anyhow::Result<Option<f64>> {
    match std::env::var(key) {
        Ok(v) => Ok(Some(v.parse().with_context(|| format!("{key} must be a number"))?)),
        Err(_) => Ok(None),
    }
}
