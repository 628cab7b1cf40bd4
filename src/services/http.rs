//! Shared HTTP plumbing for provider clients.
//!
//! Every request goes through the provider's rate limiter. Transient
//! failures (timeouts, dropped connections, 429 and 5xx responses) are
//! retried with bounded exponential backoff; everything else is returned
//! immediately.

use crate::error::{FailureKind, ProviderFailure};
use crate::models::config::{ProviderConfig, RetryConfig};
use crate::services::rate_limit::RateLimiter;
use crate::Result;
use serde_json::Value;
use std::sync::Arc;

/// User agent sent to every provider. MusicBrainz rejects anonymous clients.
pub const USER_AGENT: &str = concat!(
    "media_librarian/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/jpixy/media_librarian)"
);

/// HTTP client bound to one provider.
#[derive(Debug)]
pub struct ApiClient {
    provider: &'static str,
    client: reqwest::Client,
    retry: RetryConfig,
    limiter: Arc<RateLimiter>,
}

impl ApiClient {
    /// Create a client with the provider's per-attempt timeout and rate limit.
    pub fn new(provider: &'static str, config: &ProviderConfig, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            provider,
            client,
            retry,
            limiter: Arc::new(RateLimiter::new(provider, config.rate_limit)),
        })
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// GET a JSON document.
    ///
    /// The first attempt assumes the caller already holds a rate-limit
    /// token; every retry takes a new one.
    pub async fn get_json(&self, url: &str, headers: &[(&str, String)]) -> Result<Value> {
        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt);
                tracing::debug!(
                    "{}: retry {}/{} in {:?}",
                    self.provider,
                    attempt,
                    self.retry.max_retries,
                    delay
                );
                tokio::time::sleep(delay).await;
                self.limiter.acquire().await?;
            }

            match self.send_once(url, headers).await {
                Ok(value) => return Ok(value),
                Err(failure) if failure.kind.is_transient() && attempt < self.retry.max_retries => {
                    tracing::warn!("{}", failure);
                    attempt += 1;
                }
                Err(failure) => return Err(crate::Error::from_failure(failure)),
            }
        }
    }

    async fn send_once(
        &self,
        url: &str,
        headers: &[(&str, String)],
    ) -> std::result::Result<Value, ProviderFailure> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        let response = request.send().await.map_err(|e| self.failure_from(&e))?;
        let status = response.status();
        if !status.is_success() {
            let kind = match status.as_u16() {
                401 | 403 => FailureKind::Auth,
                code => FailureKind::Status(code),
            };
            return Err(self.failure(kind, format!("GET {} returned {}", redact(url), status)));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                self.failure(FailureKind::Timeout, e.to_string())
            } else {
                self.failure(FailureKind::Malformed, e.to_string())
            }
        })
    }

    fn failure_from(&self, error: &reqwest::Error) -> ProviderFailure {
        let kind = if error.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Connection
        };
        self.failure(kind, error.to_string())
    }

    fn failure(&self, kind: FailureKind, message: String) -> ProviderFailure {
        ProviderFailure {
            provider: self.provider.to_string(),
            kind,
            message,
        }
    }

    /// Error for a payload that lacks an expected field.
    pub fn malformed(&self, message: impl Into<String>) -> crate::Error {
        crate::Error::Provider {
            provider: self.provider.to_string(),
            kind: FailureKind::Malformed,
            message: message.into(),
        }
    }

    /// Take the array stored under `key`.
    pub fn items(&self, mut payload: Value, key: &str) -> Result<Vec<Value>> {
        match payload.get_mut(key).map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Err(self.malformed(format!("missing '{}' array", key))),
            Some(other) => Err(self.malformed(format!("'{}' is not an array: {}", key, other))),
        }
    }
}

/// Strip query-string credentials from a URL before logging it.
fn redact(url: &str) -> &str {
    url.split('?').next().unwrap_or(url)
}
