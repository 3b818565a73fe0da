use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Strategy settings the dashboard knows how to edit, in form order.
pub const SETTINGS_FIELDS: [&str; 27] = [
    "RSI_PERIOD",
    "RSI_OVERBOUGHT",
    "RSI_OVERSOLD",
    "STOP_LOSS_PERCENT",
    "TAKE_PROFIT_PERCENT",
    "MAX_TRADES",
    "TRADE_AMOUNT_USD",
    "COOLOFF_PERIOD_SECONDS",
    "EMA_SHORT_PERIOD",
    "EMA_LONG_PERIOD",
    "TREND_EMA_PERIOD",
    "MIN_VOLUME",
    "TRADE_TIME_START",
    "TRADE_TIME_END",
    "TIMEZONE",
    "RISK_PER_TRADE_PERCENT",
    "MAX_TOTAL_RISK_PERCENT",
    "MODE",
    "DRY_RUN",
    "CURRENCY_PAIR",
    "TIME_INTERVAL",
    "EMAIL_NOTIFICATIONS",
    "EMAIL_SENDER",
    "EMAIL_RECEIVER",
    "EMAIL_PASSWORD",
    "SL_WINDOW_MULTIPLIER",
    "TP_WINDOW_MULTIPLIER",
];

/// Never rendered and never editable from the dashboard.
pub const SENSITIVE_KEYS: [&str; 3] = ["API_KEY", "API_SECRET", "EMAIL_PASSWORD"];

const FLAG_FIELDS: [&str; 2] = ["DRY_RUN", "EMAIL_NOTIFICATIONS"];

pub fn is_sensitive(key: &str) -> bool {
    SENSITIVE_KEYS.contains(&key)
}

#[derive(Debug, Error, PartialEq)]
pub enum SettingsError {
    #[error("{0} cannot be edited from the dashboard")]
    Sensitive(String),
    #[error("unknown setting: {0}")]
    Unknown(String),
    #[error("{key} is a checkbox, expected true or false but got {input:?}")]
    InvalidFlag { key: String, input: String },
    #[error("expected KEY=VALUE but got {0:?}")]
    MalformedAssignment(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Number(Number),
    Text(String),
    Empty,
    Other(Value),
}

impl SettingValue {
    pub fn is_flag(&self) -> bool {
        matches!(self, SettingValue::Flag(_))
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Flag(true) => write!(f, "[x]"),
            SettingValue::Flag(false) => write!(f, "[ ]"),
            SettingValue::Number(n) => write!(f, "{}", n),
            SettingValue::Text(s) => write!(f, "{}", s),
            SettingValue::Empty => Ok(()),
            SettingValue::Other(v) => write!(f, "{}", v),
        }
    }
}

/// One editable row of the settings form.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingField<'a> {
    pub key: &'static str,
    pub label: String,
    pub value: &'a SettingValue,
}

/// The bot's strategy settings as served by `GET /api/settings`.
///
/// Keys outside [`SETTINGS_FIELDS`] are kept so a save sends back exactly what
/// the server handed out, but they are never part of the form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotSettings {
    values: BTreeMap<String, SettingValue>,
}

impl Default for BotSettings {
    fn default() -> Self {
        let values = SETTINGS_FIELDS
            .iter()
            .map(|key| {
                let value = if FLAG_FIELDS.contains(key) {
                    SettingValue::Flag(false)
                } else {
                    SettingValue::Text(String::new())
                };
                (key.to_string(), value)
            })
            .collect();
        Self { values }
    }
}

impl BotSettings {
    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Applies one form edit. Checkboxes take a boolean, every other field
    /// takes the raw input text.
    pub fn edit(&mut self, key: &str, input: &str) -> Result<(), SettingsError> {
        if is_sensitive(key) {
            return Err(SettingsError::Sensitive(key.to_string()));
        }
        if !SETTINGS_FIELDS.contains(&key) {
            return Err(SettingsError::Unknown(key.to_string()));
        }
        let current = self.values.get(key);

        let is_flag = match current {
            Some(value) => value.is_flag(),
            None => FLAG_FIELDS.contains(&key),
        };

        let value = if is_flag {
            SettingValue::Flag(parse_flag(input).ok_or_else(|| SettingsError::InvalidFlag {
                key: key.to_string(),
                input: input.to_string(),
            })?)
        } else {
            SettingValue::Text(input.to_string())
        };

        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Form rows in canonical order, without the sensitive keys.
    pub fn form_fields(&self) -> Vec<SettingField<'_>> {
        SETTINGS_FIELDS
            .iter()
            .filter(|key| !is_sensitive(key))
            .filter_map(|key| {
                self.values.get(*key).map(|value| SettingField {
                    key: *key,
                    label: key.replace('_', " "),
                    value,
                })
            })
            .collect()
    }
}

fn parse_flag(input: &str) -> Option<bool> {
    match input.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "ja" => Some(true),
        "false" | "0" | "no" | "off" | "nej" => Some(false),
        _ => None,
    }
}

/// Splits a `KEY=VALUE` command-line assignment.
pub fn parse_assignment(raw: &str) -> Result<(String, String), SettingsError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_uppercase(), value.to_string()))
        }
        _ => Err(SettingsError::MalformedAssignment(raw.to_string())),
    }
}
