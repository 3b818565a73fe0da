use std::future::Future;
use tokio::sync::watch;
use tracing::info;

/// Owner side of the dashboard's lifetime. Dropping it or calling
/// [`Lifecycle::shutdown`] cancels every [`CancelToken`] handed out.
pub struct Lifecycle {
    tx: watch::Sender<bool>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken { rx: self.tx.subscribe() }
    }

    pub fn shutdown(&self) {
        if !self.tx.send_replace(true) {
            info!("Dashboard shutting down");
        }
    }

    pub fn is_shut_down(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the owning [`Lifecycle`] shuts down or is dropped.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Runs `fut` unless cancellation comes first; a late result is dropped.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.cancelled() => None,
            out = fut => Some(out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_completes_before_shutdown() {
        let lifecycle = Lifecycle::new();
        let token = lifecycle.token();
        assert_eq!(token.run(async { 7 }).await, Some(7));
        assert!(!token.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_in_flight_work() {
        let lifecycle = Lifecycle::new();
        let token = lifecycle.token();

        let pending = tokio::spawn({
            let token = token.clone();
            async move {
                token
                    .run(async {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                        "late response"
                    })
                    .await
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        lifecycle.shutdown();

        assert_eq!(pending.await.unwrap(), None);
        assert!(token.is_cancelled());
        assert!(lifecycle.is_shut_down());
        assert_eq!(token.run(async { 1 }).await, None);
    }

    #[tokio::test]
    async fn test_dropping_lifecycle_cancels() {
        let lifecycle = Lifecycle::new();
        let token = lifecycle.token();
        drop(lifecycle);

        assert!(token.is_cancelled());
        token.cancelled().await;
    }
}
