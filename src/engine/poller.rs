use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::lifecycle::CancelToken;
use crate::backend::DashboardBackend;
use crate::config::PollingSettings;
use crate::state::{DashboardStore, StateUpdate};

/// Keeps the store eventually consistent with the backend through
/// independently scheduled read requests.
pub struct Poller {
    backend: Arc<dyn DashboardBackend>,
    store: DashboardStore,
    cancel: CancelToken,
}

impl Poller {
    pub fn new(backend: Arc<dyn DashboardBackend>, store: DashboardStore, cancel: CancelToken) -> Self {
        Self {
            backend,
            store,
            cancel,
        }
    }

    /// Applies a fetch result unless the dashboard was torn down meanwhile.
    async fn deliver(&self, update: StateUpdate) {
        if self.cancel.is_cancelled() {
            debug!("Discarding {:?} update after shutdown", update.event());
            return;
        }
        self.store.apply(update).await;
    }

    pub async fn fetch_price(&self) {
        let Some(result) = self.cancel.run(self.backend.fetch_price()).await else {
            return;
        };
        match result {
            Ok(tick) => {
                debug!("Price tick: {}", tick.price);
                self.deliver(StateUpdate::PriceReceived(tick)).await;
            }
            Err(e) => {
                warn!("Error fetching price: {}", e);
                self.deliver(StateUpdate::PriceFailed(e.to_string())).await;
            }
        }
    }

    pub async fn fetch_price_history(&self) {
        let Some(result) = self.cancel.run(self.backend.fetch_price_history()).await else {
            return;
        };
        match result {
            Ok(points) => {
                debug!("Price history: {} points", points.len());
                self.deliver(StateUpdate::PriceHistoryReceived(points)).await;
            }
            Err(e) => {
                warn!("Error fetching price history: {}", e);
                self.deliver(StateUpdate::PriceHistoryFailed(e.to_string())).await;
            }
        }
    }

    pub async fn fetch_metrics(&self) {
        let Some(result) = self.cancel.run(self.backend.fetch_metrics()).await else {
            return;
        };
        match result {
            Ok(report) => {
                debug!(
                    "Metrics fetched: {} trades, running={}",
                    report.trade_history.len(),
                    report.is_running
                );
                self.deliver(StateUpdate::MetricsReceived { report, at: Utc::now() })
                    .await;
            }
            Err(e) => {
                warn!("Error fetching metrics: {}", e);
                self.deliver(StateUpdate::MetricsFailed(format!("Kunde inte hämta data: {}", e)))
                    .await;
            }
        }
    }

    pub async fn fetch_settings(&self) {
        let Some(result) = self.cancel.run(self.backend.fetch_settings()).await else {
            return;
        };
        match result {
            Ok(settings) => {
                debug!("Settings fetched: {} fields", settings.len());
                self.deliver(StateUpdate::SettingsReceived(settings)).await;
            }
            Err(e) => {
                warn!("Error fetching settings: {}", e);
                self.deliver(StateUpdate::SettingsFailed(format!(
                    "Kunde inte hämta inställningar: {}",
                    e
                )))
                .await;
            }
        }
    }

    /// Starts the three poll loops and the one-shot settings fetch. Each tick
    /// spawns its own request, so a slow response never delays the next tick.
    pub fn spawn(self: &Arc<Self>, polling: &PollingSettings) -> PollHandle {
        info!(
            "Polling price every {:?}, history every {:?}, metrics every {:?}",
            polling.price_interval(),
            polling.history_interval(),
            polling.metrics_interval()
        );

        let settings = {
            let poller = Arc::clone(self);
            tokio::spawn(async move { poller.fetch_settings().await })
        };

        let loops = vec![
            self.spawn_loop("price", polling.price_interval(), |p| async move {
                p.fetch_price().await
            }),
            self.spawn_loop("price history", polling.history_interval(), |p| async move {
                p.fetch_price_history().await
            }),
            self.spawn_loop("metrics", polling.metrics_interval(), |p| async move {
                p.fetch_metrics().await
            }),
            settings,
        ];

        PollHandle { tasks: loops }
    }

    fn spawn_loop<F, Fut>(self: &Arc<Self>, name: &'static str, period: Duration, fetch: F) -> JoinHandle<()>
    where
        F: Fn(Arc<Poller>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let poller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    biased;
                    _ = poller.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        tokio::spawn(fetch(Arc::clone(&poller)));
                    }
                }
            }
            debug!("{} poll loop stopped", name);
        })
    }
}

/// Join handles of the running poll loops.
pub struct PollHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl PollHandle {
    /// Waits for the loops to exit; they do so once the token is cancelled.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("Poll task ended abnormally: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockDashboardBackend;
    use crate::config::BotSettings;
    use crate::engine::Lifecycle;
    use crate::error::BackendError;
    use crate::state::ViewStatus;
    use crate::types::{
        HealthReport, MetricsReport, PriceAlertRequest, PricePoint, PriceTick, ToggleAction,
        ToggleResponse, TradeOrder, TradeReceipt,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn poller_with(mock: MockDashboardBackend, lifecycle: &Lifecycle) -> (Arc<Poller>, DashboardStore) {
        let store = DashboardStore::new();
        let poller = Arc::new(Poller::new(Arc::new(mock), store.clone(), lifecycle.token()));
        (poller, store)
    }

    #[tokio::test]
    async fn test_price_failure_is_inline_only() {
        let mut mock = MockDashboardBackend::new();
        mock.expect_fetch_price()
            .times(1)
            .returning(|| Err(BackendError::Status { status: 503, detail: None }));
        let lifecycle = Lifecycle::new();
        let (poller, store) = poller_with(mock, &lifecycle);

        poller.fetch_price().await;

        let data = store.snapshot().await;
        assert_eq!(data.price_error.as_deref(), Some("HTTP error! status: 503"));
        assert_eq!(data.status, ViewStatus::Loading);
        assert_eq!(data.current_price, None);
    }

    #[tokio::test]
    async fn test_metrics_failure_leaves_loading() {
        let mut mock = MockDashboardBackend::new();
        mock.expect_fetch_metrics()
            .times(1)
            .returning(|| Err(BackendError::Status { status: 500, detail: None }));
        let lifecycle = Lifecycle::new();
        let (poller, store) = poller_with(mock, &lifecycle);

        poller.fetch_metrics().await;

        assert_eq!(
            store.read(|d| d.status.clone()).await,
            ViewStatus::Error("Kunde inte hämta data: HTTP error! status: 500".to_string())
        );
    }

    #[tokio::test]
    async fn test_settings_fetched_twice_are_identical() {
        let mut mock = MockDashboardBackend::new();
        mock.expect_fetch_settings().times(2).returning(|| {
            Ok(serde_json::from_value(serde_json::json!({"RSI_PERIOD": 14, "DRY_RUN": false})).unwrap())
        });
        let lifecycle = Lifecycle::new();
        let (poller, store) = poller_with(mock, &lifecycle);

        poller.fetch_settings().await;
        let first = store.read(|d| d.settings.clone()).await;
        poller.fetch_settings().await;
        let second = store.read(|d| d.settings.clone()).await;

        assert_eq!(first, second);
        assert_eq!(first.form_fields(), second.form_fields());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loops_run_on_independent_schedules() {
        let price_calls = Arc::new(AtomicUsize::new(0));
        let history_calls = Arc::new(AtomicUsize::new(0));
        let metrics_calls = Arc::new(AtomicUsize::new(0));

        let mut mock = MockDashboardBackend::new();
        let counter = price_calls.clone();
        mock.expect_fetch_price().returning(move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(PriceTick::new(100.0 + n as f64))
        });
        let counter = history_calls.clone();
        mock.expect_fetch_price_history().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Vec::new())
        });
        let counter = metrics_calls.clone();
        mock.expect_fetch_metrics().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(MetricsReport::default())
        });
        mock.expect_fetch_settings().times(1).returning(|| Ok(BotSettings::default()));

        let lifecycle = Lifecycle::new();
        let (poller, store) = poller_with(mock, &lifecycle);
        let handle = poller.spawn(&PollingSettings::default());

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(price_calls.load(Ordering::SeqCst), 6);
        assert_eq!(history_calls.load(Ordering::SeqCst), 2);
        assert_eq!(metrics_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.read(|d| d.status.clone()).await, ViewStatus::Ready);

        lifecycle.shutdown();
        handle.join().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(price_calls.load(Ordering::SeqCst), 6);
        assert_eq!(metrics_calls.load(Ordering::SeqCst), 2);
    }

    /// Price endpoint that answers after a fixed delay; everything else fails.
    struct SlowPriceBackend {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl DashboardBackend for SlowPriceBackend {
        async fn fetch_price(&self) -> Result<PriceTick, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(PriceTick::new(100.0 + n as f64))
        }
        async fn fetch_price_history(&self) -> Result<Vec<PricePoint>, BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn fetch_metrics(&self) -> Result<MetricsReport, BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn fetch_settings(&self) -> Result<BotSettings, BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn save_settings(&self, _: &BotSettings) -> Result<(), BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn toggle(&self, _: ToggleAction) -> Result<ToggleResponse, BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn place_trade(&self, _: &TradeOrder) -> Result<TradeReceipt, BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn add_price_alert(&self, _: &PriceAlertRequest) -> Result<(), BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
        async fn fetch_health(&self) -> Result<HealthReport, BackendError> {
            Err(BackendError::Rejected("unavailable".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_polls_overlap_and_late_responses_are_dropped() {
        let backend = Arc::new(SlowPriceBackend {
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(2_200),
        });
        let lifecycle = Lifecycle::new();
        let store = DashboardStore::new();
        let poller = Arc::new(Poller::new(backend.clone(), store.clone(), lifecycle.token()));
        let handle = poller.spawn(&PollingSettings::default());

        // Requests go out at 0s..5s; responses land 2.2s later each
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);

        lifecycle.shutdown();
        handle.join().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        // Only the responses that landed before 5.5s were applied
        assert_eq!(store.read(|d| d.current_price).await, Some(103.0));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 6);
    }
}
