use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use super::data::{DashboardData, DashboardEvent, StateUpdate, ViewStatus};
use crate::config::SettingsError;

/// Shared handle to the dashboard state. Every write goes through
/// [`DashboardData::apply`] and is announced on the broadcast channel.
#[derive(Clone)]
pub struct DashboardStore {
    inner: Arc<RwLock<DashboardData>>,
    tx: broadcast::Sender<DashboardEvent>,
}

impl DashboardStore {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            inner: Arc::new(RwLock::new(DashboardData::default())),
            tx,
        }
    }

    pub async fn apply(&self, update: StateUpdate) {
        let event = update.event();
        self.inner.write().await.apply(update);
        let _ = self.tx.send(event);
    }

    pub async fn edit_setting(&self, key: &str, input: &str) -> Result<(), SettingsError> {
        self.inner.write().await.settings.edit(key, input)?;
        let _ = self.tx.send(DashboardEvent::Settings);
        Ok(())
    }

    /// Starts a command unless one is already running, returning what `f`
    /// read from the state at that moment.
    pub async fn begin_command<R>(&self, f: impl FnOnce(&DashboardData) -> R) -> Option<R> {
        let mut data = self.inner.write().await;
        if data.status == ViewStatus::Loading {
            return None;
        }
        let value = f(&data);
        data.apply(StateUpdate::CommandStarted);
        drop(data);
        let _ = self.tx.send(DashboardEvent::Status);
        Some(value)
    }

    pub async fn snapshot(&self) -> DashboardData {
        self.inner.read().await.clone()
    }

    /// Reads one value without cloning the whole state.
    pub async fn read<R>(&self, f: impl FnOnce(&DashboardData) -> R) -> R {
        f(&*self.inner.read().await)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.tx.subscribe()
    }
}

impl Default for DashboardStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SettingValue;
    use crate::types::{MetricsReport, PriceTick};
    use chrono::Utc;

    #[tokio::test]
    async fn test_apply_broadcasts_slice() {
        let store = DashboardStore::new();
        let mut rx = store.subscribe();

        store.apply(StateUpdate::PriceReceived(PriceTick::new(42.0))).await;

        assert_eq!(rx.recv().await.unwrap(), DashboardEvent::Price);
        assert_eq!(store.read(|d| d.current_price).await, Some(42.0));
    }

    #[tokio::test]
    async fn test_edit_setting_reports_errors_without_broadcasting() {
        let store = DashboardStore::new();
        let mut rx = store.subscribe();

        assert!(store.edit_setting("API_KEY", "leak").await.is_err());
        assert!(rx.try_recv().is_err());

        store.edit_setting("RSI_PERIOD", "9").await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), DashboardEvent::Settings);
        let value = store.read(|d| d.settings.get("RSI_PERIOD").cloned()).await;
        assert_eq!(value, Some(SettingValue::Text("9".to_string())));
    }

    #[tokio::test]
    async fn test_only_one_command_starts_at_a_time() {
        let store = DashboardStore::new();
        assert_eq!(store.begin_command(|d| d.is_running).await, None);

        store
            .apply(StateUpdate::MetricsReceived {
                report: MetricsReport::default(),
                at: Utc::now(),
            })
            .await;
        let mut rx = store.subscribe();

        assert_eq!(store.begin_command(|d| d.is_running).await, Some(false));
        assert_eq!(rx.recv().await.unwrap(), DashboardEvent::Status);
        assert_eq!(store.read(|d| d.status.clone()).await, ViewStatus::Loading);
        assert_eq!(store.begin_command(|d| d.is_running).await, None);
    }

    #[tokio::test]
    async fn test_read_borrows_state_in_place() {
        let store = DashboardStore::new();
        let status = store.read(|d: &DashboardData| d.status.clone()).await;
        assert_eq!(status, ViewStatus::Loading);
    }
}
