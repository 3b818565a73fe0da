use crate::config::DisplayModules;
use crate::state::{DashboardData, ViewStatus, QUICK_AMOUNTS};
use crate::types::{TradeRecord, TradeSide};

use super::chart::Sparkline;
use super::format::*;

pub const CHART_WIDTH: usize = 60;
pub const RECENT_TRADES: usize = 5;
pub const NO_TRADES_PLACEHOLDER: &str = "Inga senaste trades att visa.";

/// What the dashboard shows for one state snapshot. Projection is pure: the
/// same data and modules always give the same view.
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardView {
    Loading,
    Error(String),
    Ready(Box<Screen>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub header: Header,
    pub status: StatusCard,
    pub price: Option<PriceCard>,
    pub alerts: Option<AlertsPanel>,
    pub metrics: Option<MetricsPanel>,
    pub pnl_chart: Option<Option<Sparkline>>,
    pub balance: Option<Vec<BalanceRow>>,
    pub active_orders: Option<Vec<TradeLine>>,
    pub recent_trades: Option<Vec<TradeLine>>,
    pub trade_table: Option<TradeTable>,
    pub manual_trading: Option<ManualTradingPanel>,
    pub settings: Option<SettingsPanel>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub title: &'static str,
    pub toggle_label: &'static str,
    pub settings_label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusCard {
    pub run_state: &'static str,
    pub run_tone: Tone,
    pub last_update: String,
    pub server_update: Option<String>,
    pub active_trades: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceCard {
    pub current: String,
    pub change: String,
    pub change_tone: Tone,
    pub bid: Option<String>,
    pub ask: Option<String>,
    pub volume: Option<String>,
    pub chart: Option<Sparkline>,
    pub error: Option<String>,
    pub history_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlertsPanel {
    pub notices: Vec<String>,
    pub side: &'static str,
    pub price_input: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsPanel {
    pub total_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_pnl: String,
    pub pnl_tone: Tone,
    pub win_rate: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BalanceRow {
    pub currency: String,
    pub total: String,
    pub free: Option<String>,
}

/// Compact trade entry of the active-orders and recent-trades cards.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeLine {
    pub kind: String,
    pub amount: String,
    pub pnl: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TradeTable {
    Rows(Vec<TradeRow>),
    Empty(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRow {
    pub date: String,
    pub kind: String,
    pub symbol: String,
    pub price: String,
    pub amount: String,
    pub fee: String,
    pub pnl: String,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ManualTradingPanel {
    pub side: &'static str,
    pub amount_input: String,
    pub quick_amounts: Vec<String>,
    pub estimated_value: String,
    pub status: Option<String>,
    pub status_tone: Tone,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingsPanel {
    pub fields: Vec<SettingRow>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingRow {
    pub key: &'static str,
    pub label: String,
    pub value: String,
    pub is_flag: bool,
}

pub fn trade_side_label(side: TradeSide) -> &'static str {
    match side {
        TradeSide::Buy => "Köp",
        TradeSide::Sell => "Sälj",
    }
}

fn trade_kind(trade: &TradeRecord) -> String {
    trade
        .kind
        .as_deref()
        .or(trade.side.as_deref())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

impl TradeLine {
    fn from_trade(trade: &TradeRecord) -> Self {
        let pnl = trade.pnl.unwrap_or(0.0);
        Self {
            kind: trade_kind(trade),
            amount: trade.amount.map(|a| a.to_string()).unwrap_or_default(),
            pnl: format_fixed(pnl, 2),
            tone: Tone::card(pnl),
        }
    }
}

impl TradeRow {
    fn from_trade(trade: &TradeRecord) -> Self {
        let fee = match &trade.fee {
            Some(fee) => match fee.cost {
                Some(cost) => format!(
                    "{} {}",
                    format_fixed(cost, 8),
                    fee.currency.as_deref().unwrap_or_default()
                )
                .trim_end()
                .to_string(),
                None => NOT_AVAILABLE.to_string(),
            },
            None => NOT_AVAILABLE.to_string(),
        };
        Self {
            date: format_timestamp(trade.timestamp.as_ref()),
            kind: trade_kind(trade),
            symbol: trade.symbol.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            price: format_optional(trade.price, 8),
            amount: format_optional(trade.amount, 8),
            fee,
            pnl: trade
                .pnl
                .map(|p| format_fixed(p, 2))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            tone: Tone::pnl(trade.pnl),
        }
    }
}

impl DashboardView {
    pub fn project(data: &DashboardData, modules: &DisplayModules) -> Self {
        match &data.status {
            ViewStatus::Loading => DashboardView::Loading,
            ViewStatus::Error(message) => DashboardView::Error(message.clone()),
            ViewStatus::Ready => DashboardView::Ready(Box::new(Screen::project(data, modules))),
        }
    }
}

impl Screen {
    fn project(data: &DashboardData, modules: &DisplayModules) -> Self {
        Self {
            header: Header {
                title: "Trading Bot Dashboard",
                toggle_label: toggle_label(data.is_running),
                settings_label: settings_toggle_label(data.show_settings),
            },
            status: StatusCard {
                run_state: run_state_label(data.is_running),
                run_tone: if data.is_running { Tone::Positive } else { Tone::Negative },
                last_update: data
                    .last_synced
                    .as_ref()
                    .map(format_local_time)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                server_update: data.server_updated.as_ref().map(|ts| format_timestamp(Some(ts))),
                active_trades: data.trades.len(),
            },
            price: modules.price.then(|| project_price(data)),
            alerts: modules.alerts.then(|| AlertsPanel {
                notices: data.alerts.iter().map(|a| a.to_string()).collect(),
                side: data.alert_form.side.label(),
                price_input: data.alert_form.price_input.clone(),
                error: data.alert_form.error.clone(),
            }),
            metrics: modules.metrics.then(|| MetricsPanel {
                total_trades: data.metrics.total_trades,
                winning_trades: data.metrics.winning_trades,
                losing_trades: data.metrics.losing_trades,
                total_pnl: format_fixed(data.metrics.total_pnl, 2),
                pnl_tone: Tone::card(data.metrics.total_pnl),
                win_rate: format_win_rate(data.metrics.win_rate),
            }),
            pnl_chart: modules
                .pnl_chart
                .then(|| Sparkline::from_pnl(&data.pnl_history, CHART_WIDTH)),
            balance: modules.balance.then(|| {
                data.balances
                    .iter()
                    .map(|(currency, line)| BalanceRow {
                        currency: currency.clone(),
                        total: line.total.to_string(),
                        free: line.free.as_ref().map(|f| f.to_string()),
                    })
                    .collect()
            }),
            active_orders: modules.active_orders.then(|| {
                data.trades
                    .iter()
                    .filter(|t| t.is_active())
                    .map(TradeLine::from_trade)
                    .collect()
            }),
            recent_trades: modules.recent_trades.then(|| {
                data.trades
                    .iter()
                    .take(RECENT_TRADES)
                    .map(TradeLine::from_trade)
                    .collect()
            }),
            trade_table: modules.trade_table.then(|| {
                if data.trades.is_empty() {
                    TradeTable::Empty(NO_TRADES_PLACEHOLDER)
                } else {
                    TradeTable::Rows(data.trades.iter().map(TradeRow::from_trade).collect())
                }
            }),
            manual_trading: modules.manual_trading.then(|| project_manual_trading(data)),
            settings: data.show_settings.then(|| SettingsPanel {
                fields: data
                    .settings
                    .form_fields()
                    .into_iter()
                    .map(|field| SettingRow {
                        key: field.key,
                        label: field.label,
                        is_flag: field.value.is_flag(),
                        value: field.value.to_string(),
                    })
                    .collect(),
                error: data.settings_error.clone(),
            }),
        }
    }
}

fn project_price(data: &DashboardData) -> PriceCard {
    PriceCard {
        current: format_price(data.current_price),
        change: format_change_pct(data.price_change_pct),
        change_tone: Tone::card(data.price_change_pct),
        bid: data.quote.bid.map(|b| format_fixed(b, 2)),
        ask: data.quote.ask.map(|a| format_fixed(a, 2)),
        volume: data.quote.volume.map(|v| format_fixed(v, 4)),
        chart: Sparkline::from_prices(&data.price_history, CHART_WIDTH),
        error: data.price_error.clone(),
        history_error: data.history_error.clone(),
    }
}

fn project_manual_trading(data: &DashboardData) -> ManualTradingPanel {
    let form = &data.trade_form;
    let amount = if form.amount_input.is_empty() {
        0.0
    } else {
        parse_float_lenient(&form.amount_input)
    };
    let status_tone = match &form.status {
        Some(status) if status.contains("Error") => Tone::Negative,
        Some(_) => Tone::Positive,
        None => Tone::Neutral,
    };
    ManualTradingPanel {
        side: trade_side_label(form.side),
        amount_input: form.amount_input.clone(),
        quick_amounts: QUICK_AMOUNTS.iter().map(|a| a.to_string()).collect(),
        estimated_value: format_fixed(amount * data.current_price.unwrap_or(0.0), 2),
        status: form.status.clone(),
        status_tone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StateUpdate;
    use crate::types::{PriceTick, TradeRecord};
    use chrono::Utc;
    use serde_json::json;

    fn ready(report: serde_json::Value) -> DashboardData {
        let mut data = DashboardData::default();
        data.apply(StateUpdate::MetricsReceived {
            report: serde_json::from_value(report).unwrap(),
            at: Utc::now(),
        });
        data
    }

    fn screen(data: &DashboardData) -> Screen {
        match DashboardView::project(data, &DisplayModules::default()) {
            DashboardView::Ready(screen) => *screen,
            other => panic!("expected ready view, got {:?}", other),
        }
    }

    #[test]
    fn test_loading_and_error_replace_the_dashboard() {
        let mut data = DashboardData::default();
        assert_eq!(DashboardView::project(&data, &DisplayModules::default()), DashboardView::Loading);

        data.apply(StateUpdate::MetricsFailed("Kunde inte hämta data: boom".to_string()));
        assert_eq!(
            DashboardView::project(&data, &DisplayModules::default()),
            DashboardView::Error("Kunde inte hämta data: boom".to_string())
        );
    }

    #[test]
    fn test_active_trades_counts_every_trade() {
        let data = ready(json!({
            "trade_history": [
                {"type": "buy", "amount": 0.1, "pnl": 1.0, "status": "active"},
                {"type": "sell", "amount": 0.2, "pnl": -1.0, "status": "closed"},
                {"type": "buy", "amount": 0.3}
            ],
            "is_running": true
        }));
        let screen = screen(&data);

        assert_eq!(screen.status.active_trades, 3);
        assert_eq!(screen.status.run_state, "Kör");
        assert_eq!(screen.header.toggle_label, "Stoppa Bot");
        assert_eq!(screen.active_orders.unwrap().len(), 1);
        assert_eq!(screen.recent_trades.unwrap()[2].pnl, "0.00");
    }

    #[test]
    fn test_empty_history_shows_placeholder() {
        let screen = screen(&ready(json!({"is_running": false})));
        assert_eq!(screen.trade_table, Some(TradeTable::Empty(NO_TRADES_PLACEHOLDER)));
        assert_eq!(screen.status.run_state, "Stoppad");
        assert_eq!(screen.header.toggle_label, "Starta Bot");
    }

    #[test]
    fn test_recent_trades_keep_first_five() {
        let trades: Vec<_> = (0..7).map(|i| json!({"type": "buy", "amount": i})).collect();
        let screen = screen(&ready(json!({"trade_history": trades})));
        let recent = screen.recent_trades.unwrap();
        assert_eq!(recent.len(), RECENT_TRADES);
        assert_eq!(recent[0].amount, "0");
    }

    #[test]
    fn test_trade_table_row() {
        let trade: TradeRecord = serde_json::from_value(json!({
            "side": "sell",
            "symbol": "BTC/USDT",
            "price": 64000.5,
            "amount": 0.01,
            "fee": {"cost": 0.064, "currency": "USDT"},
            "pnl": -2.5
        }))
        .unwrap();
        let row = TradeRow::from_trade(&trade);

        assert_eq!(row.kind, "sell");
        assert_eq!(row.price, "64000.50000000");
        assert_eq!(row.amount, "0.01000000");
        assert_eq!(row.fee, "0.06400000 USDT");
        assert_eq!(row.pnl, "-2.50");
        assert_eq!(row.tone, Tone::Negative);
        assert_eq!(row.date, "N/A");
    }

    #[test]
    fn test_price_card_after_two_ticks() {
        let mut data = ready(json!({}));
        data.apply(StateUpdate::PriceReceived(PriceTick::new(100.0)));
        data.apply(StateUpdate::PriceReceived(PriceTick::new(110.0)));

        let price = screen(&data).price.unwrap();
        assert_eq!(price.current, "110.00 USD");
        assert_eq!(price.change, "+10.00%");
        assert_eq!(price.change_tone, Tone::Positive);
        assert_eq!(price.chart, None);
    }

    #[test]
    fn test_settings_panel_hides_sensitive_keys() {
        let mut data = ready(json!({}));
        data.apply(StateUpdate::SettingsReceived(
            serde_json::from_value(json!({
                "API_KEY": "k",
                "API_SECRET": "s",
                "EMAIL_PASSWORD": "p",
                "STOP_LOSS_PERCENT": 2.5,
                "DRY_RUN": true
            }))
            .unwrap(),
        ));
        assert_eq!(screen(&data).settings, None);

        data.apply(StateUpdate::SettingsPanelToggled);
        let panel = screen(&data).settings.unwrap();
        let keys: Vec<_> = panel.fields.iter().map(|f| f.key).collect();
        assert_eq!(keys, vec!["STOP_LOSS_PERCENT", "DRY_RUN"]);
        assert_eq!(panel.fields[0].label, "STOP LOSS PERCENT");
        assert!(panel.fields[1].is_flag);
    }

    #[test]
    fn test_manual_trading_estimate() {
        let mut data = ready(json!({}));
        let panel = screen(&data).manual_trading.unwrap();
        assert_eq!(panel.estimated_value, "0.00");
        assert_eq!(panel.quick_amounts, vec!["0.001", "0.01", "0.1", "1"]);

        data.apply(StateUpdate::PriceReceived(PriceTick::new(50000.0)));
        data.apply(StateUpdate::QuickAmountPicked(1));
        data.apply(StateUpdate::TradeStatus("Error: Invalid trade type".to_string()));
        let panel = screen(&data).manual_trading.unwrap();
        assert_eq!(panel.estimated_value, "500.00");
        assert_eq!(panel.status_tone, Tone::Negative);
        assert_eq!(panel.side, "Köp");
    }

    #[test]
    fn test_disabled_modules_are_omitted() {
        let data = ready(json!({}));
        let modules = DisplayModules {
            price: false,
            trade_table: false,
            ..DisplayModules::default()
        };
        let DashboardView::Ready(screen) = DashboardView::project(&data, &modules) else {
            panic!("expected ready view");
        };
        assert!(screen.price.is_none());
        assert!(screen.trade_table.is_none());
        assert!(screen.metrics.is_some());
    }
}
