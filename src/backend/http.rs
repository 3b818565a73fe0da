use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use super::DashboardBackend;
use crate::config::{BackendSettings, BotSettings};
use crate::error::BackendError;
use crate::types::{
    HealthReport, MetricsReport, PriceAlertRequest, PricePoint, PriceTick, ToggleAction,
    ToggleRequest, ToggleResponse, TradeOrder, TradeReceipt,
};

const PRICE_PATH: &str = "/api/price";
const PRICE_HISTORY_PATH: &str = "/api/price/history";
const PRICE_ALERTS_PATH: &str = "/api/price/alerts";
const METRICS_PATH: &str = "/api/metrics";
const SETTINGS_PATH: &str = "/api/settings";
const TOGGLE_PATH: &str = "/api/toggle";
const TRADE_PATH: &str = "/api/trade";
const HEALTH_PATH: &str = "/api/health";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    trade_url: String,
}

impl HttpBackend {
    pub fn new(settings: &BackendSettings) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            trade_url: settings.trade_base_url().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &'static str,
    ) -> Result<T, BackendError> {
        let body = self.read_body(request, endpoint).await?;
        serde_json::from_slice(&body).map_err(|source| BackendError::Decode { endpoint, source })
    }

    async fn read_body(
        &self,
        request: RequestBuilder,
        endpoint: &'static str,
    ) -> Result<Vec<u8>, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!("{} -> {} ({} bytes)", endpoint, status, body.len());

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }
        Ok(body.to_vec())
    }
}

/// Pulls the `error` (or `message`) text out of an error body, if it is JSON.
fn error_detail(body: &[u8]) -> Option<String> {
    let value: Value = serde_json::from_slice(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(key).and_then(Value::as_str))
        .map(str::to_string)
}

#[async_trait]
impl DashboardBackend for HttpBackend {
    async fn fetch_price(&self) -> Result<PriceTick, BackendError> {
        self.read_json(self.client.get(self.url(PRICE_PATH)), PRICE_PATH)
            .await
    }

    async fn fetch_price_history(&self) -> Result<Vec<PricePoint>, BackendError> {
        self.read_json(self.client.get(self.url(PRICE_HISTORY_PATH)), PRICE_HISTORY_PATH)
            .await
    }

    async fn fetch_metrics(&self) -> Result<MetricsReport, BackendError> {
        self.read_json(self.client.get(self.url(METRICS_PATH)), METRICS_PATH)
            .await
    }

    async fn fetch_settings(&self) -> Result<BotSettings, BackendError> {
        self.read_json(self.client.get(self.url(SETTINGS_PATH)), SETTINGS_PATH)
            .await
    }

    async fn save_settings(&self, settings: &BotSettings) -> Result<(), BackendError> {
        let request = self.client.post(self.url(SETTINGS_PATH)).json(settings);
        self.read_body(request, SETTINGS_PATH).await?;
        Ok(())
    }

    async fn toggle(&self, action: ToggleAction) -> Result<ToggleResponse, BackendError> {
        let request = self
            .client
            .post(self.url(TOGGLE_PATH))
            .json(&ToggleRequest { action });
        self.read_json(request, TOGGLE_PATH).await
    }

    async fn place_trade(&self, order: &TradeOrder) -> Result<TradeReceipt, BackendError> {
        let request = self
            .client
            .post(format!("{}{}", self.trade_url, TRADE_PATH))
            .json(order);
        let receipt: TradeReceipt = self.read_json(request, TRADE_PATH).await?;

        match receipt.error {
            Some(error) => Err(BackendError::Rejected(error)),
            None => Ok(receipt),
        }
    }

    async fn add_price_alert(&self, alert: &PriceAlertRequest) -> Result<(), BackendError> {
        let request = self.client.post(self.url(PRICE_ALERTS_PATH)).json(alert);
        self.read_body(request, PRICE_ALERTS_PATH).await?;
        Ok(())
    }

    async fn fetch_health(&self) -> Result<HealthReport, BackendError> {
        self.read_json(self.client.get(self.url(HEALTH_PATH)), HEALTH_PATH)
            .await
    }
}
