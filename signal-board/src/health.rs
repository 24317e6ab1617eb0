//! Health Aggregator.
//!
//! Combines the trading bot liveness probe with the freshness of the most recent raw signal.

use crate::{
    config::{FRESHNESS_THRESHOLD_SECS, LIVENESS_TIMEOUT, SIGNALS_TIMEOUT},
    error::panic_message,
    fetch::{Transport, fetch_signals, probe_liveness},
    value::{display, is_truthy},
};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error};

/// Offset-aware formats tried after RFC 3339.
const OFFSET_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

/// Offset-less formats, interpreted as UTC.
const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ServiceStatus {
    Up,
    Down,
}

impl ServiceStatus {
    pub fn from_up(up: bool) -> Self {
        if up { ServiceStatus::Up } else { ServiceStatus::Down }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, ServiceStatus::Up)
    }
}

/// Composite status of the upstream services.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HealthStatus {
    /// Trading bot liveness
    pub secondary_service_status: ServiceStatus,
    /// Analytics service, UP iff at least one raw signal was obtained
    pub primary_service_status: ServiceStatus,
    /// First truthy raw signal timestamp in upstream order, else the time of assessment
    pub last_signal_timestamp: String,
    pub is_fresh: bool,
    /// Age of the adopted signal timestamp. May be negative under clock skew.
    pub staleness_seconds: Option<f64>,
}

impl HealthStatus {
    /// Assess health from an already completed probe and signal fetch.
    ///
    /// The first raw signal with a truthy `timestamp` wins, regardless of recency. If that
    /// timestamp cannot be parsed, freshness falls back to the analytics status and staleness
    /// stays at 0.
    pub fn assess(secondary_up: bool, raw_signals: &[Value], now: DateTime<Utc>) -> Self {
        let primary_up = !raw_signals.is_empty();
        let mut status = Self {
            secondary_service_status: ServiceStatus::from_up(secondary_up),
            primary_service_status: ServiceStatus::from_up(primary_up),
            last_signal_timestamp: iso_timestamp(now),
            is_fresh: primary_up,
            staleness_seconds: Some(0.0),
        };

        let Some(adopted) = raw_signals
            .iter()
            .filter_map(|raw| raw.get("timestamp"))
            .find(|timestamp| is_truthy(timestamp))
        else {
            return status;
        };

        status.last_signal_timestamp = display(adopted);
        match adopted.as_str().and_then(parse_timestamp) {
            Some(signal_time) => {
                let staleness = staleness_seconds(now, signal_time);
                status.staleness_seconds = Some(staleness);
                status.is_fresh = staleness < FRESHNESS_THRESHOLD_SECS;
            }
            None => {
                debug!(timestamp = %adopted, "unparseable signal timestamp, freshness unknown");
            }
        }

        status
    }

    /// Status reported when the aggregation itself failed.
    pub fn collapsed(now: DateTime<Utc>) -> Self {
        Self {
            secondary_service_status: ServiceStatus::Down,
            primary_service_status: ServiceStatus::Down,
            last_signal_timestamp: iso_timestamp(now),
            is_fresh: false,
            staleness_seconds: None,
        }
    }
}

/// Probe the bot and fetch raw signals concurrently, then [`HealthStatus::assess`].
///
/// Never fails: a panic anywhere in the pipeline yields [`HealthStatus::collapsed`].
pub async fn aggregate<T>(transport: &T, bot_health_url: &str, analytics_url: &str) -> HealthStatus
where
    T: Transport + ?Sized,
{
    let pipeline = async {
        let (secondary_up, raw_signals) = tokio::join!(
            probe_liveness(transport, bot_health_url, LIVENESS_TIMEOUT),
            fetch_signals(transport, analytics_url, SIGNALS_TIMEOUT),
        );
        HealthStatus::assess(secondary_up, &raw_signals, Utc::now())
    };

    match AssertUnwindSafe(pipeline).catch_unwind().await {
        Ok(status) => status,
        Err(panic) => {
            error!(error = %panic_message(panic.as_ref()), "health aggregation failed");
            HealthStatus::collapsed(Utc::now())
        }
    }
}

/// Parse an upstream timestamp.
///
/// Accepts RFC 3339 (a `Z` suffix is normalised to `+00:00`), ISO-8601 without offset, and
/// `YYYY-MM-DD HH:MM:SS`. Offset-less timestamps are UTC.
pub fn parse_timestamp(timestamp: &str) -> Option<DateTime<Utc>> {
    let timestamp = timestamp.trim();
    let normalised = timestamp.replace('Z', "+00:00");

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&normalised) {
        return Some(parsed.with_timezone(&Utc));
    }

    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&normalised, format).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(timestamp, format).ok())
                .map(|parsed| parsed.and_utc())
        })
}

/// Seconds elapsed between `then` and `now`, millisecond precision.
pub fn staleness_seconds(now: DateTime<Utc>, then: DateTime<Utc>) -> f64 {
    (now - then).num_milliseconds() as f64 / 1000.0
}

fn iso_timestamp(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, false)
}
