//! # broker::terminal
//!
//! **Terminal Client** — talks to a MetaTrader 5 terminal through its HTTP
//! bridge.
//!
//! ## Bridge API Contract
//! ```text
//! POST /terminal/initialize   → { "ok": true } | { "ok": false, "error": "..." }
//! POST /terminal/login        → { "ok": true } | { "ok": false, "error": "..." }
//! GET  /account/info          → { login, server, currency, balance, equity } | null
//! GET  /symbol/tick?symbol=X  → { bid, ask, last, volume, time } | null
//! GET  /positions             → [ { ticket, symbol, type, volume, price_open, ... } ] | null
//! POST /order/send            → { "retcode": 10009, "order": 123456, "comment": "Request completed" }
//! POST /terminal/shutdown
//! ```
//! retcode 10009 = `TRADE_RETCODE_DONE` (the only success code)

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{ConnectError, OrderError};
use crate::models::{Credentials, OrderRequest, Position, Quote, Side};

/// `TRADE_RETCODE_DONE`
pub const TRADE_RETCODE_DONE: u32 = 10009;
/// `TRADE_ACTION_DEAL` — market execution.
const TRADE_ACTION_DEAL: u32 = 1;
const ORDER_TYPE_BUY: u32 = 0;
const ORDER_TYPE_SELL: u32 = 1;
/// Max slippage in points.
const DEVIATION: u32 = 20;
pub const MAGIC: u64 = 234000;
pub const ORDER_COMMENT: &str = "AutoTrader Pro";

// ─── Bridge Payloads ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct BridgeAck {
    ok:    bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    login:    u64,
    password: &'a str,
    server:   &'a str,
}

/// Account summary reported by the terminal.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountInfo {
    pub login:    u64,
    pub server:   String,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub balance:  f64,
    pub equity:   f64,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Mirrors `MqlTick`.
#[derive(Debug, Deserialize)]
struct BridgeTick {
    bid:    f64,
    ask:    f64,
    #[serde(default)]
    last:   f64,
    #[serde(default)]
    volume: u64,
    time:   i64,
}

/// Mirrors `TradePosition`.
#[derive(Debug, Deserialize)]
struct BridgePosition {
    ticket:        u64,
    symbol:        String,
    /// 0 = BUY, 1 = SELL
    #[serde(rename = "type")]
    kind:          u32,
    volume:        f64,
    price_open:    f64,
    price_current: f64,
    profit:        f64,
    #[serde(default)]
    comment:       String,
}

impl From<BridgePosition> for Position {
    fn from(p: BridgePosition) -> Self {
        Position {
            ticket:        p.ticket,
            symbol:        p.symbol,
            side:          if p.kind == ORDER_TYPE_BUY { Side::Buy } else { Side::Sell },
            volume:        p.volume,
            entry_price:   p.price_open,
            current_price: p.price_current,
            profit:        p.profit,
            comment:       p.comment,
        }
    }
}

/// Payload for `/order/send`, mirrors `MqlTradeRequest`.
#[derive(Debug, Serialize)]
pub struct TerminalOrderRequest {
    pub action:    u32,
    pub symbol:    String,
    pub volume:    f64,
    #[serde(rename = "type")]
    pub kind:      u32,
    pub deviation: u32,
    pub magic:     u64,
    pub comment:   &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price:     Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sl:        Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tp:        Option<f64>,
}

impl TerminalOrderRequest {
    pub fn from_order(order: &OrderRequest) -> Self {
        Self {
            action:    TRADE_ACTION_DEAL,
            symbol:    order.symbol.clone(),
            volume:    order.volume,
            kind:      match order.side {
                Side::Buy  => ORDER_TYPE_BUY,
                Side::Sell => ORDER_TYPE_SELL,
            },
            deviation: DEVIATION,
            magic:     MAGIC,
            comment:   ORDER_COMMENT,
            price:     order.price,
            sl:        order.stop_loss,
            tp:        order.take_profit,
        }
    }
}

/// Response from `/order/send`.
#[derive(Debug, Deserialize)]
pub struct TerminalOrderResult {
    pub retcode: u32,
    /// Ticket (present when retcode = 10009).
    pub order:   Option<u64>,
    /// Deal price.
    #[serde(default)]
    pub price:   Option<f64>,
    pub comment: Option<String>,
}

// ─── Client ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TerminalClient {
    http:     reqwest::Client,
    base_url: String,
    timeout:  Duration,
}

impl TerminalClient {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Attach to the running terminal, optionally log in, and read the
    /// account.
    pub async fn open_session(
        &self,
        credentials: Option<&Credentials>,
    ) -> Result<AccountInfo, ConnectError> {
        let url = format!("{}/terminal/initialize", self.base_url);
        let ack = self
            .post_ack(&url, &serde_json::json!({}))
            .await
            .map_err(ConnectError::TerminalUnavailable)?;
        if !ack.ok {
            return Err(ConnectError::TerminalUnavailable(format!(
                "initialize failed: {}",
                ack.error.unwrap_or_else(|| "unknown error".into())
            )));
        }

        if let Some(creds) = credentials {
            let url = format!("{}/terminal/login", self.base_url);
            let body = LoginRequest {
                login:    creds.login,
                password: &creds.password,
                server:   &creds.server,
            };
            let ack = self
                .post_ack(&url, &body)
                .await
                .map_err(ConnectError::TerminalUnavailable)?;
            if !ack.ok {
                return Err(ConnectError::AuthFailed(
                    ack.error.unwrap_or_else(|| format!("login {} rejected", creds.login)),
                ));
            }
        }

        let url = format!("{}/account/info", self.base_url);
        let info: Option<AccountInfo> = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| ConnectError::TerminalUnavailable(e.to_string()))?
            .json()
            .await
            .map_err(|_| ConnectError::NoAccountInfo)?;

        info.ok_or(ConnectError::NoAccountInfo)
    }

    /// Best-effort `shutdown`; failures are only logged.
    pub async fn shutdown(&self) {
        let url = format!("{}/terminal/shutdown", self.base_url);
        match self.http.post(&url).timeout(self.timeout).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(http_status = %response.status(), "Terminal shutdown rejected");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Terminal shutdown request failed"),
        }
    }

    /// Latest tick for `symbol`; `Ok(None)` when the terminal has none.
    pub async fn symbol_tick(&self, symbol: &str) -> Result<Option<Quote>, reqwest::Error> {
        let url = format!("{}/symbol/tick", self.base_url);
        let tick: Option<BridgeTick> = self
            .http
            .get(&url)
            .query(&[("symbol", symbol)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(tick.map(|t| Quote {
            symbol:    symbol.to_string(),
            bid:       t.bid,
            ask:       t.ask,
            last:      t.last,
            volume:    t.volume,
            timestamp: t.time,
        }))
    }

    pub async fn positions(&self) -> Result<Vec<Position>, reqwest::Error> {
        let url = format!("{}/positions", self.base_url);
        let rows: Option<Vec<BridgePosition>> = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(rows.unwrap_or_default().into_iter().map(Position::from).collect())
    }

    /// Send an order and check the return code.
    pub async fn order_send(
        &self,
        request: &TerminalOrderRequest,
    ) -> Result<TerminalOrderResult, OrderError> {
        let url = format!("{}/order/send", self.base_url);

        info!(
            symbol = %request.symbol,
            kind   = request.kind,
            volume = request.volume,
            price  = ?request.price,
            sl     = ?request.sl,
            tp     = ?request.tp,
            url    = %url,
            "🚀 [TERMINAL] Sending order"
        );

        // ── HTTP POST ─────────────────────────────────────────────────────────
        let response = self
            .http
            .post(&url)
            .json(request)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "Terminal unreachable");
                OrderError::Transport(format!("terminal unreachable: {e}"))
            })?;

        // ── HTTP Status ───────────────────────────────────────────────────────
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(http_status = %status, body = %body, "Terminal returned HTTP error");
            return Err(OrderError::Transport(format!("terminal HTTP {status}: {body}")));
        }

        // ── Parse Response ────────────────────────────────────────────────────
        let result: TerminalOrderResult = response.json().await.map_err(|e| {
            error!(error = %e, "Terminal response parse failed");
            OrderError::Transport(format!("terminal response parse error: {e}"))
        })?;

        // ── Check retcode ─────────────────────────────────────────────────────
        if result.retcode != TRADE_RETCODE_DONE {
            let message = result.comment.unwrap_or_else(|| "unknown".to_string());
            warn!(retcode = result.retcode, comment = %message, "Terminal rejected order");
            return Err(OrderError::Rejected { code: result.retcode, message });
        }

        info!(ticket = ?result.order, "✅ [TERMINAL] Order accepted");
        Ok(result)
    }

    async fn post_ack<B: Serialize>(&self, url: &str, body: &B) -> Result<BridgeAck, String> {
        let response = self
            .http
            .post(url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(format!("HTTP {status}: {text}"));
        }

        response.json().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_request_omits_unset_levels() {
        let order = OrderRequest {
            symbol:      "EURUSD".into(),
            side:        Side::Sell,
            volume:      0.01,
            price:       None,
            stop_loss:   Some(1.1),
            take_profit: None,
        };
        let json = serde_json::to_value(TerminalOrderRequest::from_order(&order)).unwrap();

        assert_eq!(json["type"], ORDER_TYPE_SELL);
        assert_eq!(json["action"], TRADE_ACTION_DEAL);
        assert_eq!(json["deviation"], 20);
        assert_eq!(json["magic"], 234000);
        assert_eq!(json["sl"], 1.1);
        assert!(json.get("price").is_none());
        assert!(json.get("tp").is_none());
    }

    #[test]
    fn test_order_result_price_is_optional() {
        let filled: TerminalOrderResult =
            serde_json::from_value(serde_json::json!({ "retcode": 10009, "order": 1, "price": 1.5, "comment": null })).unwrap();
        assert_eq!(filled.price, Some(1.5));

        let bare: TerminalOrderResult = serde_json::from_value(serde_json::json!({ "retcode": 10019 })).unwrap();
        assert_eq!(bare.price, None);
        assert_eq!(bare.order, None);
    }

    #[test]
    fn test_bridge_position_maps_type_to_side() {
        let raw = serde_json::json!({
            "ticket": 9, "symbol": "XAUUSD", "type": 1, "volume": 0.2,
            "price_open": 2050.0, "price_current": 2040.0, "profit": 20.0
        });
        let position: Position = serde_json::from_value::<BridgePosition>(raw).unwrap().into();
        assert_eq!(position.side, Side::Sell);
        assert_eq!(position.comment, "");
        assert!(position.pnl_percent() > 0.0);
    }
}
