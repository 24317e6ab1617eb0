use serde::{Deserialize, Serialize};
use std::any::Any;
use thiserror::Error;

/// Transport-level failures produced by a [`Transport`](crate::fetch::Transport).
///
/// These never escape the Raw Fetcher helpers; they are logged and converted to a sentinel.
#[derive(Debug, Clone, Eq, PartialEq, Hash, Deserialize, Serialize, Error)]
pub enum FetchError {
    #[error("request timed out after {timeout_ms}ms: {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("unexpected http status {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("malformed JSON body from {url}: {reason}")]
    Decode { url: String, reason: String },

    #[error("http request to {url} failed: {reason}")]
    Request { url: String, reason: String },
}

impl FetchError {
    /// Determine if this failure was caused by a connect or read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Short label used as the `kind` field of failure logs.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Connect { .. } => "connect",
            FetchError::Status { .. } => "http_status",
            FetchError::Decode { .. } => "decode",
            FetchError::Request { .. } => "transport",
        }
    }
}

/// Upstream payloads that cannot be normalised at all.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Error)]
pub enum NormalizeError {
    #[error("raw signal {symbol} has non-numeric proba: {value}")]
    InvalidProba { symbol: String, value: String },
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid URL for {name}: {value} ({reason})")]
    InvalidUrl {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to build http client: {0}")]
    HttpClient(String),
}

/// Failure of the combined dashboard operation itself.
///
/// Upstream unavailability never produces this error, it is absorbed by the status and signal
/// pipelines. Only a failure to join one of those pipelines surfaces here.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
#[error("{error}")]
pub struct CombinedError {
    pub error: String,
    pub trace: String,
}

/// Best-effort description of a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
