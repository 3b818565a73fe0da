use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend timestamps are either epoch milliseconds or ISO-8601 text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Millis(i64),
    FractionalMillis(f64),
    Text(String),
}

impl Timestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Timestamp::Millis(ms) => Utc.timestamp_millis_opt(*ms).single(),
            Timestamp::FractionalMillis(ms) if ms.is_finite() => {
                Utc.timestamp_millis_opt(ms.trunc() as i64).single()
            }
            Timestamp::FractionalMillis(_) => None,
            Timestamp::Text(text) => parse_text_timestamp(text),
        }
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    // Python's isoformat() without an offset
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PnlPoint {
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub pnl: f64,
}

/// `GET /api/price` body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PriceTick {
    pub price: f64,
    #[serde(default)]
    pub bid: Option<f64>,
    #[serde(default)]
    pub ask: Option<f64>,
    #[serde(default)]
    pub volume: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub alerts: Vec<AlertNotice>,
}

impl PriceTick {
    pub fn new(price: f64) -> Self {
        Self {
            price,
            bid: None,
            ask: None,
            volume: None,
            timestamp: None,
            alerts: Vec::new(),
        }
    }
}

/// A triggered or registered alert as echoed by the price endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AlertNotice {
    Text(String),
    Threshold {
        #[serde(rename = "type")]
        side: AlertSide,
        price: f64,
    },
}

impl fmt::Display for AlertNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertNotice::Text(text) => write!(f, "{}", text),
            AlertNotice::Threshold { side, price } => {
                write!(f, "{} {:.2} USD", side.label(), price)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSide {
    #[default]
    Above,
    Below,
}

impl AlertSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSide::Above => "above",
            AlertSide::Below => "below",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AlertSide::Above => "Över",
            AlertSide::Below => "Under",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "above" | "över" => Some(AlertSide::Above),
            "below" | "under" => Some(AlertSide::Below),
            _ => None,
        }
    }
}

impl fmt::Display for AlertSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Body of `POST /api/price/alerts`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PriceAlertRequest {
    #[serde(rename = "type")]
    pub side: AlertSide,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub last_update: Option<Timestamp>,
    #[serde(default)]
    pub bot_running: bool,
    #[serde(default)]
    pub exchange_connected: bool,
    #[serde(default)]
    pub current_position: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_timestamp_shapes() {
        let millis: Timestamp = serde_json::from_str("1700000000000").unwrap();
        assert_eq!(millis, Timestamp::Millis(1_700_000_000_000));
        assert_eq!(millis.to_datetime().unwrap().year(), 2023);

        let float: Timestamp = serde_json::from_str("1700000000000.5").unwrap();
        assert!(matches!(float, Timestamp::FractionalMillis(_)));
        assert!(float.to_datetime().is_some());

        let iso = Timestamp::Text("2024-03-01T12:30:00.123456".to_string());
        let dt = iso.to_datetime().unwrap();
        assert_eq!((dt.hour(), dt.minute()), (12, 30));

        let rfc = Timestamp::Text("2024-03-01T12:30:00Z".to_string());
        assert!(rfc.to_datetime().is_some());

        assert!(Timestamp::Text("yesterday".to_string()).to_datetime().is_none());
    }

    #[test]
    fn test_price_tick_with_mixed_alerts() {
        let tick: PriceTick = serde_json::from_value(serde_json::json!({
            "price": 101.5,
            "bid": 101.4,
            "alerts": ["Price above 100", {"type": "below", "price": 90}]
        }))
        .unwrap();

        assert_eq!(tick.price, 101.5);
        assert_eq!(tick.alerts.len(), 2);
        assert_eq!(tick.alerts[0].to_string(), "Price above 100");
        assert_eq!(tick.alerts[1].to_string(), "Under 90.00 USD");
    }

    #[test]
    fn test_price_tick_requires_price() {
        let result: Result<PriceTick, _> = serde_json::from_value(serde_json::json!({"bid": 1.0}));
        assert!(result.is_err());
    }

    #[test]
    fn test_alert_request_body() {
        let body = serde_json::to_value(PriceAlertRequest { side: AlertSide::Below, price: 42.5 }).unwrap();
        assert_eq!(body, serde_json::json!({"type": "below", "price": 42.5}));
    }
}
