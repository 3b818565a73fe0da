use chrono::{DateTime, Local, Utc};

use crate::types::Timestamp;

pub const LOADING_LABEL: &str = "Laddar...";
pub const NOT_AVAILABLE: &str = "N/A";

/// Colour class of a displayed number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
}

impl Tone {
    /// Cards only distinguish non-negative from negative.
    pub fn card(value: f64) -> Self {
        if value >= 0.0 {
            Tone::Positive
        } else {
            Tone::Negative
        }
    }

    /// Trade table PnL: zero (or missing) is neutral.
    pub fn pnl(value: Option<f64>) -> Self {
        match value {
            Some(v) if v > 0.0 => Tone::Positive,
            Some(v) if v < 0.0 => Tone::Negative,
            _ => Tone::Neutral,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Tone::Positive => "▲",
            Tone::Negative => "▼",
            Tone::Neutral => "•",
        }
    }
}

fn count_digits(bytes: &[u8], from: usize) -> usize {
    bytes
        .get(from..)
        .map_or(0, |rest| rest.iter().take_while(|b| b.is_ascii_digit()).count())
}

/// Parses the longest numeric prefix of `input`, the way form inputs are read:
/// leading whitespace is skipped, trailing garbage ignored, and anything
/// without a numeric prefix is NaN.
pub fn parse_float_lenient(input: &str) -> f64 {
    let s = input.trim_start();
    let bytes = s.as_bytes();

    let mut end = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));
    if s[end..].starts_with("Infinity") {
        return if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_digits = count_digits(bytes, end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(bytes, end + 1);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(bytes, exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    s[..end].parse().unwrap_or(f64::NAN)
}

pub fn format_fixed(value: f64, digits: usize) -> String {
    format!("{:.*}", digits, value)
}

/// Fixed-point rendering of an optional number; missing and zero both show N/A.
pub fn format_optional(value: Option<f64>, digits: usize) -> String {
    match value {
        Some(v) if v != 0.0 => format_fixed(v, digits),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p != 0.0 => format!("{:.2} USD", p),
        _ => LOADING_LABEL.to_string(),
    }
}

pub fn format_change_pct(change: f64) -> String {
    if change > 0.0 {
        format!("+{:.2}%", change)
    } else {
        format!("{:.2}%", change)
    }
}

/// `win_rate` arrives as a fraction.
pub fn format_win_rate(win_rate: f64) -> String {
    format!("{:.1}%", win_rate * 100.0)
}

pub fn format_local_time(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%H:%M:%S").to_string()
}

pub fn format_local_datetime(at: &DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn format_timestamp(timestamp: Option<&Timestamp>) -> String {
    timestamp
        .and_then(Timestamp::to_datetime)
        .map(|at| format_local_datetime(&at))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn run_state_label(is_running: bool) -> &'static str {
    if is_running {
        "Kör"
    } else {
        "Stoppad"
    }
}

pub fn toggle_label(is_running: bool) -> &'static str {
    if is_running {
        "Stoppa Bot"
    } else {
        "Starta Bot"
    }
}

pub fn settings_toggle_label(show_settings: bool) -> &'static str {
    if show_settings {
        "Stäng Inställningar"
    } else {
        "Öppna Inställningar"
    }
}
