pub mod http;

pub use http::*;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::config::BotSettings;
use crate::error::BackendError;
use crate::types::{
    HealthReport, MetricsReport, PriceAlertRequest, PricePoint, PriceTick, ToggleAction,
    ToggleResponse, TradeOrder, TradeReceipt,
};

/// The bot backend's REST surface.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn fetch_price(&self) -> Result<PriceTick, BackendError>;
    async fn fetch_price_history(&self) -> Result<Vec<PricePoint>, BackendError>;
    async fn fetch_metrics(&self) -> Result<MetricsReport, BackendError>;
    async fn fetch_settings(&self) -> Result<BotSettings, BackendError>;
    async fn save_settings(&self, settings: &BotSettings) -> Result<(), BackendError>;
    async fn toggle(&self, action: ToggleAction) -> Result<ToggleResponse, BackendError>;
    async fn place_trade(&self, order: &TradeOrder) -> Result<TradeReceipt, BackendError>;
    async fn add_price_alert(&self, alert: &PriceAlertRequest) -> Result<(), BackendError>;
    async fn fetch_health(&self) -> Result<HealthReport, BackendError>;
}
