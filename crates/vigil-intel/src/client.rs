//! Shared HTTP plumbing
//!
//! One deadline-and-retry policy for every provider adapter: a hard
//! per-call timeout (cancels only that call, never siblings), up to
//! `retries` additional attempts on timeout/5xx/429 with exponential
//! backoff, and no retry on other 4xx.

use std::time::Duration;
use vigil_common::{error::ProviderResult, ProviderError};

/// HTTP client with the provider deadline/retry policy baked in.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    timeout: Duration,
    retries: u32,
}

impl HttpClient {
    pub fn new(timeout: Duration, retries: u32) -> Self {
        Self {
            inner: reqwest::Client::new(),
            timeout,
            retries,
        }
    }

    pub fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.inner.request(method, url)
    }

    pub fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.inner.get(url)
    }

    pub fn post(&self, url: &str) -> reqwest::RequestBuilder {
        self.inner.post(url)
    }

    /// Execute a request with deadline and retry, returning the raw
    /// JSON body. The builder is cloned per attempt.
    pub async fn execute_json(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> ProviderResult<serde_json::Value> {
        let mut attempt: u32 = 0;
        loop {
            let request = builder
                .try_clone()
                .ok_or_else(|| ProviderError::Transient("unclonable request".to_string()))?;

            match self.attempt_json(request).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retriable() && attempt < self.retries => {
                    let backoff = Duration::from_millis(2u64.pow(attempt) * 1000);
                    tracing::warn!(
                        attempt = attempt + 1,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %err,
                        "provider call failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn attempt_json(
        &self,
        request: reqwest::RequestBuilder,
    ) -> ProviderResult<serde_json::Value> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| ProviderError::Timeout)?
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http(status.as_u16()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

/// Parse a raw JSON body into a narrow payload struct.
pub fn parse_payload<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> ProviderResult<T> {
    serde_json::from_value(value).map_err(|e| ProviderError::Malformed(e.to_string()))
}
