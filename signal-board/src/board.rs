use crate::{
    config::{BoardConfig, SIGNALS_TIMEOUT},
    error::{CombinedError, ConfigError, panic_message},
    fetch::{HttpTransport, Transport, fetch_signals},
    health::{HealthStatus, aggregate},
    normalize::{NormalizedSignal, default_signals, normalize_signals},
};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::{panic::AssertUnwindSafe, sync::Arc};
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info};

/// Combined payload of the dashboard data operation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Dashboard {
    pub health: HealthStatus,
    pub signals: Vec<NormalizedSignal>,
}

/// Entry point for the three exposed operations.
///
/// Every call recomputes from scratch: no caching, no shared mutable state.
#[derive(Debug)]
pub struct SignalBoard<T: ?Sized> {
    config: BoardConfig,
    transport: Arc<T>,
}

impl<T: ?Sized> Clone for SignalBoard<T> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl SignalBoard<HttpTransport> {
    /// Construct a [`SignalBoard`] polling real HTTP endpoints.
    pub fn from_config(config: BoardConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config, HttpTransport::new()?))
    }
}

impl<T> SignalBoard<T>
where
    T: Transport + 'static,
{
    pub fn new(config: BoardConfig, transport: T) -> Self {
        Self::from_shared(config, Arc::new(transport))
    }
}

impl<T> SignalBoard<T>
where
    T: Transport + ?Sized + 'static,
{
    /// Construct from an already shared transport, eg/ an `Arc<dyn Transport>`.
    pub fn from_shared(config: BoardConfig, transport: Arc<T>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    /// Current [`HealthStatus`]. Never fails.
    pub async fn health(&self) -> HealthStatus {
        aggregate(
            self.transport.as_ref(),
            &self.config.bot_health_url,
            &self.config.analytics_url,
        )
        .await
    }

    /// One [`NormalizedSignal`] per token, sorted by score. Never fails.
    pub async fn signals(&self) -> Vec<NormalizedSignal> {
        let pipeline = async {
            let raw_signals = fetch_signals(
                self.transport.as_ref(),
                &self.config.analytics_url,
                SIGNALS_TIMEOUT,
            )
            .await;
            info!(count = raw_signals.len(), "got raw signals");

            let signals = normalize_signals(&raw_signals);
            info!(count = signals.len(), "processed signals");
            signals
        };

        match AssertUnwindSafe(pipeline).catch_unwind().await {
            Ok(signals) => signals,
            Err(panic) => {
                error!(error = %panic_message(panic.as_ref()), "signal pipeline failed");
                default_signals()
            }
        }
    }

    /// Run the health and signal pipelines as independent tasks and join their results.
    ///
    /// Upstream failures are absorbed by the two pipelines. A [`CombinedError`] is only
    /// returned if one of the tasks itself fails to complete.
    pub async fn combined(&self) -> Result<Dashboard, CombinedError> {
        let health = tokio::spawn({
            let board = self.clone();
            async move { board.health().await }
        });
        let signals = tokio::spawn({
            let board = self.clone();
            async move { board.signals().await }
        });

        join_dashboard(health, signals).await
    }
}

/// Await both pipeline tasks. The first failure wins, the other task is detached.
pub async fn join_dashboard(
    health: JoinHandle<HealthStatus>,
    signals: JoinHandle<Vec<NormalizedSignal>>,
) -> Result<Dashboard, CombinedError> {
    let health = health
        .await
        .map_err(|error| combined_error("health", error))?;
    let signals = signals
        .await
        .map_err(|error| combined_error("signals", error))?;

    Ok(Dashboard { health, signals })
}

fn combined_error(pipeline: &'static str, error: JoinError) -> CombinedError {
    let trace = format!("dashboard-data: joining {pipeline} pipeline task: {error:?}");
    let error = if error.is_panic() {
        format!(
            "{pipeline} pipeline panicked: {}",
            panic_message(error.into_panic().as_ref())
        )
    } else {
        format!("{pipeline} pipeline cancelled")
    };

    error!(%error, %trace, "dashboard data failed");
    CombinedError { error, trace }
}
