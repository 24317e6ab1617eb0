//! Raw Fetcher: one bounded-timeout GET per call, no retries.
//!
//! [`Transport`] is the seam to the HTTP client. The free functions [`fetch_signals`] and
//! [`probe_liveness`] sit on top of it and never fail: every [`FetchError`] is logged with its
//! kind and converted to a sentinel (empty list or `false`).

use crate::{
    error::{ConfigError, FetchError},
    normalize::extract_list,
    value,
};
use async_trait::async_trait;
use reqwest::{
    Client,
    header::{ACCEPT, HeaderMap, HeaderValue},
    redirect::Policy,
};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// `User-Agent` sent with every upstream request.
pub const USER_AGENT: &str = concat!("signal-board/", env!("CARGO_PKG_VERSION"));

/// Fetch raw JSON, or a raw status code, from an upstream endpoint.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and parse the body as JSON. Non-2xx responses are a [`FetchError::Status`].
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError>;

    /// GET `url` and return the status code, ignoring the body.
    async fn get_status(&self, url: &str, timeout: Duration) -> Result<u16, FetchError>;
}

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Redirects are not followed: a 3xx is reported as-is.
    pub fn new() -> Result<Self, ConfigError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(Policy::none())
            .build()
            .map_err(|error| ConfigError::HttpClient(error.to_string()))?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &str, timeout: Duration) -> Result<reqwest::Response, FetchError> {
        self.client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|error| map_reqwest_error(url, timeout, error))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(&self, url: &str, timeout: Duration) -> Result<Value, FetchError> {
        let response = self.send(url, timeout).await?;
        let status = response.status();
        info!(%url, status = status.as_u16(), "upstream response");
        debug!(%url, headers = ?response.headers(), "upstream response headers");

        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|error| map_reqwest_error(url, timeout, error))?;

        serde_json::from_slice(&body).map_err(|error| FetchError::Decode {
            url: url.to_string(),
            reason: error.to_string(),
        })
    }

    async fn get_status(&self, url: &str, timeout: Duration) -> Result<u16, FetchError> {
        self.send(url, timeout)
            .await
            .map(|response| response.status().as_u16())
    }
}

fn map_reqwest_error(url: &str, timeout: Duration, error: reqwest::Error) -> FetchError {
    let url = url.to_string();
    if error.is_timeout() {
        FetchError::Timeout {
            url,
            timeout_ms: timeout.as_millis() as u64,
        }
    } else if error.is_connect() {
        FetchError::Connect {
            url,
            reason: error.to_string(),
        }
    } else if error.is_decode() {
        FetchError::Decode {
            url,
            reason: error.to_string(),
        }
    } else {
        FetchError::Request {
            url,
            reason: error.to_string(),
        }
    }
}

/// Fetch the raw signal list from the analytics endpoint.
///
/// Returns an empty list on any transport or payload failure.
pub async fn fetch_signals<T>(transport: &T, url: &str, timeout: Duration) -> Vec<Value>
where
    T: Transport + ?Sized,
{
    info!(%url, "fetching signals");
    match transport.get_json(url, timeout).await {
        Ok(raw) => {
            info!(keys = ?value::keys(&raw), "raw signal payload");
            let extracted = extract_list(&raw).to_vec();
            info!(count = extracted.len(), "extracted raw signals");
            extracted
        }
        Err(error) if error.is_timeout() => {
            error!(kind = error.kind(), %url, "timeout fetching signals");
            Vec::new()
        }
        Err(error) => {
            error!(kind = error.kind(), %error, "error fetching signals");
            Vec::new()
        }
    }
}

/// Liveness probe: `true` iff the endpoint answers HTTP 200 within `timeout`.
pub async fn probe_liveness<T>(transport: &T, url: &str, timeout: Duration) -> bool
where
    T: Transport + ?Sized,
{
    match transport.get_status(url, timeout).await {
        Ok(status) => {
            debug!(%url, status, "liveness probe");
            status == 200
        }
        Err(error) if error.is_timeout() => {
            warn!(kind = error.kind(), %url, "timeout probing liveness");
            false
        }
        Err(error) => {
            warn!(kind = error.kind(), %error, "error probing liveness");
            false
        }
    }
}
