use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn};

use super::lifecycle::CancelToken;
use super::poller::Poller;
use crate::backend::DashboardBackend;
use crate::config::BotSettings;
use crate::error::BackendError;
use crate::state::{DashboardData, DashboardStore, StateUpdate};
use crate::types::{AlertSide, PriceAlertRequest, ToggleAction, TradeOrder, TradeReceipt, TradeSide};
use crate::view::parse_float_lenient;

/// Issues the mutating requests and reconciles the store with what the
/// server answers.
pub struct CommandDispatcher {
    backend: Arc<dyn DashboardBackend>,
    store: DashboardStore,
    poller: Arc<Poller>,
    cancel: CancelToken,
}

impl CommandDispatcher {
    pub fn new(
        backend: Arc<dyn DashboardBackend>,
        store: DashboardStore,
        poller: Arc<Poller>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            backend,
            store,
            poller,
            cancel,
        }
    }

    async fn guarded<T>(&self, fut: impl Future<Output = Result<T, BackendError>>) -> Result<T, BackendError> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.cancel.run(fut).await.unwrap_or(Err(BackendError::Cancelled))
    }

    async fn record(&self, update: StateUpdate) {
        if !self.cancel.is_cancelled() {
            self.store.apply(update).await;
        }
    }

    /// Starts a command from the current state; refused while the dashboard
    /// is still loading or another command is running.
    async fn begin<R>(&self, f: impl FnOnce(&DashboardData) -> R) -> Result<R, BackendError> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.store.begin_command(f).await.ok_or_else(|| {
            warn!("Command ignored, dashboard is busy");
            BackendError::Busy
        })
    }

    pub async fn toggle_bot(&self, action: ToggleAction) -> Result<bool, BackendError> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.record(StateUpdate::CommandStarted).await;
        self.send_toggle(action).await
    }

    async fn send_toggle(&self, action: ToggleAction) -> Result<bool, BackendError> {
        info!("Requesting bot {}", action);
        match self.guarded(self.backend.toggle(action)).await {
            Ok(response) => {
                info!(
                    "Bot is now {}{}",
                    if response.is_running { "running" } else { "stopped" },
                    response.message.map(|m| format!(" ({})", m)).unwrap_or_default()
                );
                self.record(StateUpdate::RunStateConfirmed(response.is_running)).await;
                self.record(StateUpdate::CommandSucceeded).await;
                self.poller.fetch_metrics().await;
                Ok(response.is_running)
            }
            Err(e) => {
                if !e.is_cancelled() {
                    error!("Error toggling bot: {}", e);
                    self.record(StateUpdate::CommandFailed(format!(
                        "Kunde inte ändra botens status: {}",
                        e
                    )))
                    .await;
                }
                Err(e)
            }
        }
    }

    /// Flips the run state the dashboard currently shows.
    pub async fn toggle_current(&self) -> Result<bool, BackendError> {
        let is_running = self.begin(|d| d.is_running).await?;
        self.send_toggle(ToggleAction::for_run_state(is_running)).await
    }

    /// Posts the full settings object, then adopts the server's canonical copy.
    pub async fn save_settings(&self, settings: BotSettings) -> Result<BotSettings, BackendError> {
        if self.cancel.is_cancelled() {
            return Err(BackendError::Cancelled);
        }
        self.record(StateUpdate::CommandStarted).await;
        self.send_settings(settings).await
    }

    async fn send_settings(&self, settings: BotSettings) -> Result<BotSettings, BackendError> {
        info!("Saving {} settings", settings.len());
        let saved = async {
            self.guarded(self.backend.save_settings(&settings)).await?;
            self.guarded(self.backend.fetch_settings()).await
        }
        .await;

        match saved {
            Ok(canonical) => {
                info!("Settings saved");
                self.record(StateUpdate::SettingsReceived(canonical.clone())).await;
                self.record(StateUpdate::CommandSucceeded).await;
                Ok(canonical)
            }
            Err(e) => {
                if !e.is_cancelled() {
                    error!("Error saving settings: {}", e);
                    self.record(StateUpdate::CommandFailed(format!(
                        "Kunde inte spara inställningar: {}",
                        e
                    )))
                    .await;
                }
                Err(e)
            }
        }
    }

    pub async fn save_current_settings(&self) -> Result<BotSettings, BackendError> {
        let settings = self.begin(|d| d.settings.clone()).await?;
        self.send_settings(settings).await
    }

    /// Places a manual trade. The amount is parsed leniently; anything
    /// non-numeric goes out as `null` and the server decides.
    pub async fn place_trade(&self, side: TradeSide, amount_input: &str) -> Result<TradeReceipt, BackendError> {
        let order = TradeOrder {
            side,
            amount: parse_float_lenient(amount_input),
        };
        if order.amount.is_nan() {
            warn!("Trade amount {:?} is not a number, sending anyway", amount_input);
        }
        info!("Placing {} order for {}", order.side, order.amount);
        self.record(StateUpdate::TradeStatus("Processing trade...".to_string())).await;

        match self.guarded(self.backend.place_trade(&order)).await {
            Ok(receipt) => {
                let message = receipt.message.clone().unwrap_or_default();
                info!("Trade executed: {}", message);
                self.record(StateUpdate::TradeStatus(format!(
                    "Trade executed successfully: {}",
                    message
                )))
                .await;
                self.poller.fetch_metrics().await;
                Ok(receipt)
            }
            Err(e) => {
                if !e.is_cancelled() {
                    error!("Error placing trade: {}", e);
                    self.record(StateUpdate::TradeStatus(format!("Error: {}", e.user_message())))
                        .await;
                }
                Err(e)
            }
        }
    }

    pub async fn submit_trade_form(&self) -> Result<TradeReceipt, BackendError> {
        let (side, amount) = self
            .store
            .read(|d| (d.trade_form.side, d.trade_form.amount_input.clone()))
            .await;
        self.place_trade(side, &amount).await
    }

    /// Registers a price alert. Nothing is added to the alert list here; the
    /// server echoes triggered alerts with later price ticks.
    pub async fn add_price_alert(&self, side: AlertSide, price_input: &str) -> Result<(), BackendError> {
        let request = PriceAlertRequest {
            side,
            price: parse_float_lenient(price_input),
        };
        info!("Adding price alert: {} {}", request.side, request.price);

        match self.guarded(self.backend.add_price_alert(&request)).await {
            Ok(()) => {
                self.record(StateUpdate::AlertSubmitted).await;
                Ok(())
            }
            Err(e) => {
                if !e.is_cancelled() {
                    error!("Error adding price alert: {}", e);
                    self.record(StateUpdate::AlertFailed(format!(
                        "Kunde inte lägga till prisvarning: {}",
                        e.user_message()
                    )))
                    .await;
                }
                Err(e)
            }
        }
    }

    pub async fn submit_alert_form(&self) -> Result<(), BackendError> {
        let (side, price) = self
            .store
            .read(|d| (d.alert_form.side, d.alert_form.price_input.clone()))
            .await;
        self.add_price_alert(side, &price).await
    }
}
