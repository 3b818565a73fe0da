use serde::{Deserialize, Serialize};
use std::fmt;

use super::market::{PnlPoint, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    #[default]
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "buy",
            TradeSide::Sell => "sell",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "buy" | "köp" => Some(TradeSide::Buy),
            "sell" | "sälj" => Some(TradeSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToggleAction {
    Start,
    Stop,
}

impl ToggleAction {
    /// The action the toggle button issues for the current run state.
    pub fn for_run_state(is_running: bool) -> Self {
        if is_running {
            ToggleAction::Stop
        } else {
            ToggleAction::Start
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleAction::Start => "start",
            ToggleAction::Stop => "stop",
        }
    }
}

impl fmt::Display for ToggleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trade as reported in `trade_history`. Every field is optional because the
/// backend mixes exchange fills with its own manual-trade records.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub side: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, alias = "entry_price")]
    pub price: Option<f64>,
    #[serde(default, alias = "size")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub fee: Option<Fee>,
    #[serde(default)]
    pub pnl: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

impl TradeRecord {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Fee {
    #[serde(default)]
    pub cost: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradingMetrics {
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub winning_trades: u64,
    #[serde(default)]
    pub losing_trades: u64,
    #[serde(default)]
    pub total_pnl: f64,
    #[serde(default)]
    pub win_rate: f64,
}

/// Body of `POST /api/trade`. A non-numeric amount is NaN and goes out as
/// JSON `null`, leaving the rejection to the server.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TradeOrder {
    #[serde(rename = "type")]
    pub side: TradeSide,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct TradeReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// `GET /api/metrics` body. Missing sections fall back to empty values.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MetricsReport {
    #[serde(default)]
    pub metrics: Option<TradingMetrics>,
    /// Kept raw: the backend sends several balance shapes, see `Balances`.
    #[serde(default)]
    pub balance: Option<serde_json::Value>,
    #[serde(default)]
    pub trade_history: Vec<TradeRecord>,
    #[serde(default)]
    pub pnl_history: Vec<PnlPoint>,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub last_update: Option<Timestamp>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToggleRequest {
    pub action: ToggleAction,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToggleResponse {
    pub is_running: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_action_follows_run_state() {
        assert_eq!(ToggleAction::for_run_state(false), ToggleAction::Start);
        assert_eq!(ToggleAction::for_run_state(true), ToggleAction::Stop);
        let body = serde_json::to_value(ToggleRequest { action: ToggleAction::Start }).unwrap();
        assert_eq!(body, serde_json::json!({"action": "start"}));
    }

    #[test]
    fn test_nan_amount_is_sent_as_null() {
        let order = TradeOrder { side: TradeSide::Buy, amount: f64::NAN };
        let body = serde_json::to_string(&order).unwrap();
        assert_eq!(body, r#"{"type":"buy","amount":null}"#);
    }

    #[test]
    fn test_trade_record_accepts_backend_aliases() {
        let trade: TradeRecord = serde_json::from_value(serde_json::json!({
            "timestamp": "2024-03-01T12:00:00",
            "type": "buy",
            "entry_price": 64000.5,
            "size": 0.01,
            "pnl": 0
        }))
        .unwrap();

        assert_eq!(trade.kind.as_deref(), Some("buy"));
        assert_eq!(trade.price, Some(64000.5));
        assert_eq!(trade.amount, Some(0.01));
        assert_eq!(trade.pnl, Some(0.0));
        assert!(trade.fee.is_none());
        assert!(!trade.is_active());
    }

    #[test]
    fn test_metrics_report_tolerates_missing_sections() {
        let report: MetricsReport = serde_json::from_value(serde_json::json!({
            "is_running": true,
            "balance": null,
            "current_position": null
        }))
        .unwrap();

        assert!(report.is_running);
        assert!(report.metrics.is_none());
        assert!(report.trade_history.is_empty());
        assert!(report.pnl_history.is_empty());
    }

    #[test]
    fn test_trade_side_parsing() {
        assert_eq!(TradeSide::from_str("BUY"), Some(TradeSide::Buy));
        assert_eq!(TradeSide::from_str("sälj"), Some(TradeSide::Sell));
        assert_eq!(TradeSide::from_str("hold"), None);
    }
}
