use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "dashboard.toml";
const ENV_PREFIX: &str = "DASHBOARD";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ClientConfig {
    pub backend: BackendSettings,
    pub polling: PollingSettings,
    pub display: DisplayModules,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    pub base_url: String,
    /// Separate host for `POST /api/trade`; falls back to `base_url`.
    pub trade_url: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            trade_url: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl BackendSettings {
    pub fn trade_base_url(&self) -> &str {
        self.trade_url.as_deref().unwrap_or(&self.base_url)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    pub price_ms: u64,
    pub history_ms: u64,
    pub metrics_ms: u64,
}

impl Default for PollingSettings {
    fn default() -> Self {
        Self {
            price_ms: 1_000,
            history_ms: 5_000,
            metrics_ms: 5_000,
        }
    }
}

impl PollingSettings {
    pub fn price_interval(&self) -> Duration {
        Duration::from_millis(self.price_ms)
    }

    pub fn history_interval(&self) -> Duration {
        Duration::from_millis(self.history_ms)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_millis(self.metrics_ms)
    }
}

/// Optional panels of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayModules {
    pub price: bool,
    pub alerts: bool,
    pub metrics: bool,
    pub pnl_chart: bool,
    pub balance: bool,
    pub active_orders: bool,
    pub recent_trades: bool,
    pub trade_table: bool,
    pub manual_trading: bool,
}

impl Default for DisplayModules {
    fn default() -> Self {
        Self {
            price: true,
            alerts: true,
            metrics: true,
            pnl_chart: true,
            balance: true,
            active_orders: true,
            recent_trades: true,
            trade_table: true,
            manual_trading: true,
        }
    }
}

impl ClientConfig {
    /// Layers built-in defaults, the optional TOML file and `DASHBOARD_*`
    /// environment variables (`DASHBOARD_BACKEND__BASE_URL=...`).
    pub fn load(path: &str) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", env_file.display());
        }

        let config: ClientConfig = ::config::Config::builder()
            .add_source(::config::Config::try_from(&ClientConfig::default())?)
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .with_context(|| format!("failed to read configuration from {}", path))?
            .try_deserialize()
            .context("invalid configuration")?;

        config
            .validate()
            .map_err(|errors| anyhow!("invalid configuration: {}", errors.join(", ")))?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if let Err(e) = Url::parse(&self.backend.base_url) {
            errors.push(format!("backend.base_url is not a valid URL: {}", e));
        }
        if let Some(trade_url) = &self.backend.trade_url {
            if let Err(e) = Url::parse(trade_url) {
                errors.push(format!("backend.trade_url is not a valid URL: {}", e));
            }
        }
        if self.backend.request_timeout_ms == 0 {
            errors.push("backend.request_timeout_ms must be > 0".to_string());
        }

        if self.polling.price_ms == 0 {
            errors.push("polling.price_ms must be > 0".to_string());
        }
        if self.polling.history_ms == 0 {
            errors.push("polling.history_ms must be > 0".to_string());
        }
        if self.polling.metrics_ms == 0 {
            errors.push("polling.metrics_ms must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_match_dashboard_timings() {
        let config = ClientConfig::default();
        assert_eq!(config.polling.price_interval(), Duration::from_secs(1));
        assert_eq!(config.polling.history_interval(), Duration::from_secs(5));
        assert_eq!(config.polling.metrics_interval(), Duration::from_secs(5));
        assert_eq!(config.backend.trade_base_url(), "http://localhost:5000");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let mut config = ClientConfig::default();
        config.backend.base_url = "not a url".to_string();
        config.polling.price_ms = 0;
        config.polling.metrics_ms = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("base_url"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!("bot-dashboard-{}.toml", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[backend]
base_url = "http://10.0.0.5:8080"
trade_url = "http://10.0.0.6:5000"

[polling]
price_ms = 250

[display]
trade_table = false
"#
        )
        .unwrap();

        let config = ClientConfig::load(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(config.backend.base_url, "http://10.0.0.5:8080");
        assert_eq!(config.backend.trade_base_url(), "http://10.0.0.6:5000");
        assert_eq!(config.polling.price_ms, 250);
        assert_eq!(config.polling.metrics_ms, 5_000);
        assert!(!config.display.trade_table);
        assert!(config.display.balance);
    }

    #[test]
    fn test_effective_config_renders_as_toml() {
        let rendered = ClientConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[polling]"));
        assert!(rendered.contains("price_ms = 1000"));
    }
}
