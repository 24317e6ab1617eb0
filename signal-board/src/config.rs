use crate::error::ConfigError;
use std::time::Duration;
use url::Url;

/// Timeout of the bulk signals fetch.
pub const SIGNALS_TIMEOUT: Duration = Duration::from_secs(5);

/// Timeout of the secondary service liveness probe.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(3);

/// A signal older than this is stale.
pub const FRESHNESS_THRESHOLD_SECS: f64 = 900.0;

pub const DEFAULT_ANALYTICS_API: &str = "http://127.0.0.1:8080/api/analysis";
pub const DEFAULT_BOT_HEALTH: &str = "http://127.0.0.1:8000/health";

/// Upstream endpoints polled by a [`SignalBoard`](crate::board::SignalBoard).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    /// Analytics endpoint returning the raw signal payload
    pub analytics_url: String,
    /// Liveness endpoint of the trading bot, only the status code is consulted
    pub bot_health_url: String,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            analytics_url: DEFAULT_ANALYTICS_API.to_string(),
            bot_health_url: DEFAULT_BOT_HEALTH.to_string(),
        }
    }
}

impl BoardConfig {
    /// Create a new configuration with custom upstream URLs.
    pub fn new(analytics_url: impl Into<String>, bot_health_url: impl Into<String>) -> Self {
        Self {
            analytics_url: analytics_url.into(),
            bot_health_url: bot_health_url.into(),
        }
    }

    /// Read `ANALYTICS_API` and `BOT_HEALTH`, falling back to the local defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            analytics_url: std::env::var("ANALYTICS_API")
                .unwrap_or_else(|_| DEFAULT_ANALYTICS_API.to_string()),
            bot_health_url: std::env::var("BOT_HEALTH")
                .unwrap_or_else(|_| DEFAULT_BOT_HEALTH.to_string()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the analytics endpoint
    pub fn with_analytics_url(mut self, url: impl Into<String>) -> Self {
        self.analytics_url = url.into();
        self
    }

    /// Set the bot liveness endpoint
    pub fn with_bot_health_url(mut self, url: impl Into<String>) -> Self {
        self.bot_health_url = url.into();
        self
    }

    /// Check both URLs parse as absolute http(s) URLs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_url("ANALYTICS_API", &self.analytics_url)?;
        validate_url("BOT_HEALTH", &self.bot_health_url)
    }
}

fn validate_url(name: &'static str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        name,
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value).map_err(|error| invalid(error.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(format!("unsupported scheme {scheme}"))),
    }
}
