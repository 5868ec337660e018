//! HTTP fetch wrapper with retry and rate-limit backoff.
//!
//! `FetchClient` issues GET requests through an `HttpTransport`, retries
//! transient failures up to the configured ceiling and returns parsed JSON
//! or a typed `FetchError`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::RetryPolicy;

use super::FetchError;

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Sent with every request; the GitHub API rejects requests without one.
const USER_AGENT: &str = concat!("wenchang/", env!("CARGO_PKG_VERSION"));

/// Status and body of one completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single GET. Abstraction for testing.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET the URL. Only transport-level failures are errors; any status
    /// code comes back as a response.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Reqwest-based transport.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}

/// Retrying JSON client.
#[derive(Clone)]
pub struct FetchClient {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryPolicy) -> Self {
        Self { transport, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Fetch `url` and parse the body as JSON.
    ///
    /// Rate-limit answers wait `rate_limit_delay * attempt`, other retryable
    /// failures wait `error_delay * attempt`. A 404 or an unparsable 2xx body
    /// is returned at once. After the last attempt the last error propagates.
    pub async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let body = self.fetch_body(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::malformed(url, e))
    }

    /// Fetch `url` and deserialize the JSON body into `T`.
    pub async fn fetch_typed<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.fetch_body(url).await?;
        serde_json::from_str(&body).map_err(|e| FetchError::malformed(url, e))
    }

    async fn fetch_body(&self, url: &str) -> Result<String, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let error = match self.transport.get(url).await {
                Ok(response) if response.is_success() => {
                    debug!(url = url, attempt, "Fetched");
                    return Ok(response.body);
                }
                Ok(response) => FetchError::from_status(response.status, &response.body),
                Err(e) => e,
            };

            if !error.is_retryable() || attempt >= max_attempts {
                debug!(url = url, attempt, error = %error, "Giving up");
                return Err(error);
            }

            let backoff = match error {
                FetchError::RateLimited => self.retry.rate_limit_delay(attempt),
                _ => self.retry.error_delay(attempt),
            };
            warn!(
                url = url,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Request failed, backing off"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }
}
