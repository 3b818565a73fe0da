use chrono::{DateTime, Utc};

use crate::config::BotSettings;
use crate::types::{
    AlertNotice, AlertSide, Balances, MetricsReport, PnlPoint, PricePoint, PriceTick, Timestamp,
    TradeRecord, TradeSide, TradingMetrics,
};

/// Preset amounts offered by the manual trading card.
pub const QUICK_AMOUNTS: [f64; 4] = [0.001, 0.01, 0.1, 1.0];

/// Loading/error/ready triad of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStatus {
    Loading,
    Ready,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Quote {
    pub bid: Option<f64>,
    pub ask: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TradeForm {
    pub side: TradeSide,
    pub amount_input: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AlertForm {
    pub side: AlertSide,
    pub price_input: String,
    pub error: Option<String>,
}

/// Which slice of the dashboard a transition touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardEvent {
    Price,
    PriceHistory,
    Metrics,
    Settings,
    Status,
    TradeForm,
    AlertForm,
}

#[derive(Debug, Clone)]
pub enum StateUpdate {
    PriceReceived(PriceTick),
    PriceFailed(String),
    PriceHistoryReceived(Vec<PricePoint>),
    PriceHistoryFailed(String),
    MetricsReceived { report: MetricsReport, at: DateTime<Utc> },
    MetricsFailed(String),
    SettingsReceived(BotSettings),
    SettingsFailed(String),
    SettingsPanelToggled,
    CommandStarted,
    CommandSucceeded,
    CommandFailed(String),
    RunStateConfirmed(bool),
    TradeSideSelected(TradeSide),
    TradeAmountEntered(String),
    QuickAmountPicked(usize),
    TradeStatus(String),
    AlertSideSelected(AlertSide),
    AlertPriceEntered(String),
    AlertSubmitted,
    AlertFailed(String),
}

impl StateUpdate {
    pub fn event(&self) -> DashboardEvent {
        match self {
            StateUpdate::PriceReceived(_) | StateUpdate::PriceFailed(_) => DashboardEvent::Price,
            StateUpdate::PriceHistoryReceived(_) | StateUpdate::PriceHistoryFailed(_) => {
                DashboardEvent::PriceHistory
            }
            StateUpdate::MetricsReceived { .. } | StateUpdate::MetricsFailed(_) => {
                DashboardEvent::Metrics
            }
            StateUpdate::SettingsReceived(_)
            | StateUpdate::SettingsFailed(_)
            | StateUpdate::SettingsPanelToggled => DashboardEvent::Settings,
            StateUpdate::CommandStarted
            | StateUpdate::CommandSucceeded
            | StateUpdate::CommandFailed(_)
            | StateUpdate::RunStateConfirmed(_) => DashboardEvent::Status,
            StateUpdate::TradeSideSelected(_)
            | StateUpdate::TradeAmountEntered(_)
            | StateUpdate::QuickAmountPicked(_)
            | StateUpdate::TradeStatus(_) => DashboardEvent::TradeForm,
            StateUpdate::AlertSideSelected(_)
            | StateUpdate::AlertPriceEntered(_)
            | StateUpdate::AlertSubmitted
            | StateUpdate::AlertFailed(_) => DashboardEvent::AlertForm,
        }
    }
}

/// Everything the dashboard knows about the backend, plus local form state.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardData {
    pub status: ViewStatus,
    pub is_running: bool,
    pub metrics: TradingMetrics,
    pub balances: Balances,
    pub trades: Vec<TradeRecord>,
    pub pnl_history: Vec<PnlPoint>,
    pub last_synced: Option<DateTime<Utc>>,
    pub server_updated: Option<Timestamp>,
    pub current_price: Option<f64>,
    pub price_change_pct: f64,
    pub quote: Quote,
    pub price_history: Vec<PricePoint>,
    pub alerts: Vec<AlertNotice>,
    pub settings: BotSettings,
    pub show_settings: bool,
    pub trade_form: TradeForm,
    pub alert_form: AlertForm,
    pub price_error: Option<String>,
    pub history_error: Option<String>,
    pub settings_error: Option<String>,
}

impl Default for DashboardData {
    fn default() -> Self {
        Self {
            status: ViewStatus::Loading,
            is_running: false,
            metrics: TradingMetrics::default(),
            balances: Balances::default(),
            trades: Vec::new(),
            pnl_history: Vec::new(),
            last_synced: None,
            server_updated: None,
            current_price: None,
            price_change_pct: 0.0,
            quote: Quote::default(),
            price_history: Vec::new(),
            alerts: Vec::new(),
            settings: BotSettings::default(),
            show_settings: false,
            trade_form: TradeForm::default(),
            alert_form: AlertForm::default(),
            price_error: None,
            history_error: None,
            settings_error: None,
        }
    }
}

impl DashboardData {
    /// The single state-transition function. Fetched slices are replaced
    /// wholesale; alerts are the only slice that accumulates.
    pub fn apply(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::PriceReceived(tick) => {
                if let Some(previous) = self.current_price.filter(|p| *p != 0.0) {
                    self.price_change_pct = (tick.price - previous) / previous * 100.0;
                }
                self.current_price = Some(tick.price);
                self.quote = Quote {
                    bid: tick.bid,
                    ask: tick.ask,
                    volume: tick.volume,
                };
                self.alerts.extend(tick.alerts);
                self.price_error = None;
            }
            StateUpdate::PriceFailed(message) => {
                self.price_error = Some(message);
            }
            StateUpdate::PriceHistoryReceived(points) => {
                self.price_history = points;
                self.history_error = None;
            }
            StateUpdate::PriceHistoryFailed(message) => {
                self.history_error = Some(message);
            }
            StateUpdate::MetricsReceived { report, at } => {
                self.metrics = report.metrics.unwrap_or_default();
                self.balances = Balances::from_value(report.balance.as_ref());
                self.trades = report.trade_history;
                self.pnl_history = report.pnl_history;
                self.is_running = report.is_running;
                self.server_updated = report.last_update;
                self.last_synced = Some(at);
                self.status = ViewStatus::Ready;
            }
            StateUpdate::MetricsFailed(message) => {
                self.status = ViewStatus::Error(message);
            }
            StateUpdate::SettingsReceived(settings) => {
                self.settings = settings;
                self.settings_error = None;
            }
            StateUpdate::SettingsFailed(message) => {
                self.settings_error = Some(message);
            }
            StateUpdate::SettingsPanelToggled => {
                self.show_settings = !self.show_settings;
            }
            StateUpdate::CommandStarted => {
                self.status = ViewStatus::Loading;
            }
            StateUpdate::CommandSucceeded => {
                self.status = ViewStatus::Ready;
            }
            StateUpdate::CommandFailed(message) => {
                self.status = ViewStatus::Error(message);
            }
            StateUpdate::RunStateConfirmed(is_running) => {
                self.is_running = is_running;
            }
            StateUpdate::TradeSideSelected(side) => {
                self.trade_form.side = side;
            }
            StateUpdate::TradeAmountEntered(input) => {
                self.trade_form.amount_input = input;
            }
            StateUpdate::QuickAmountPicked(index) => {
                if let Some(amount) = QUICK_AMOUNTS.get(index) {
                    self.trade_form.amount_input = amount.to_string();
                }
            }
            StateUpdate::TradeStatus(status) => {
                self.trade_form.status = Some(status);
            }
            StateUpdate::AlertSideSelected(side) => {
                self.alert_form.side = side;
            }
            StateUpdate::AlertPriceEntered(input) => {
                self.alert_form.price_input = input;
            }
            StateUpdate::AlertSubmitted => {
                self.alert_form = AlertForm::default();
            }
            StateUpdate::AlertFailed(message) => {
                self.alert_form.error = Some(message);
            }
        }
    }
}
