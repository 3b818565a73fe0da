use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Aggregate keys of the exchange balance shape that are not currencies.
const AGGREGATE_KEYS: [&str; 4] = ["info", "free", "used", "total"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum BalanceAmount {
    Numeric(Decimal),
    Verbatim(String),
}

impl BalanceAmount {
    /// Numbers and numeric strings become decimals, anything else is kept as text.
    pub fn coerce(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Number(n) => Some(
                parse_decimal(&n.to_string())
                    .map(BalanceAmount::Numeric)
                    .unwrap_or_else(|| BalanceAmount::Verbatim(n.to_string())),
            ),
            Value::String(s) => Some(
                parse_decimal(s.trim())
                    .map(BalanceAmount::Numeric)
                    .unwrap_or_else(|| BalanceAmount::Verbatim(s.clone())),
            ),
            other => Some(BalanceAmount::Verbatim(other.to_string())),
        }
    }
}

impl fmt::Display for BalanceAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceAmount::Numeric(d) => write!(f, "{:.8}", d),
            BalanceAmount::Verbatim(s) => write!(f, "{}", s),
        }
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceLine {
    pub total: BalanceAmount,
    pub free: Option<BalanceAmount>,
}

/// Per-currency balances, ordered by currency code.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Balances {
    lines: BTreeMap<String, BalanceLine>,
}

impl Balances {
    /// Parses the three shapes the backend emits: a flat `{BTC: 0.5}` map, a
    /// `{total: {...}, free: {...}}` breakdown, and the exchange shape where
    /// every currency maps to `{total, free, used}`.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };

        let mut lines = BTreeMap::new();

        if let Some(Value::Object(totals)) = map.get("total") {
            let frees = match map.get("free") {
                Some(Value::Object(frees)) => Some(frees),
                _ => None,
            };
            for (currency, amount) in totals {
                let Some(total) = BalanceAmount::coerce(amount) else {
                    continue;
                };
                let free = frees
                    .and_then(|f| f.get(currency))
                    .and_then(BalanceAmount::coerce);
                lines.insert(currency.clone(), BalanceLine { total, free });
            }
            return Self { lines };
        }

        for (currency, entry) in map {
            if AGGREGATE_KEYS.contains(&currency.as_str()) {
                continue;
            }
            let line = match entry {
                Value::Object(amounts) => {
                    let Some(total) = amounts.get("total").and_then(BalanceAmount::coerce) else {
                        continue;
                    };
                    BalanceLine {
                        total,
                        free: amounts.get("free").and_then(BalanceAmount::coerce),
                    }
                }
                scalar => {
                    let Some(total) = BalanceAmount::coerce(scalar) else {
                        continue;
                    };
                    BalanceLine { total, free: None }
                }
            };
            lines.insert(currency.clone(), line);
        }

        Self { lines }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BalanceLine)> {
        self.lines.iter()
    }

    pub fn get(&self, currency: &str) -> Option<&BalanceLine> {
        self.lines.get(currency)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
