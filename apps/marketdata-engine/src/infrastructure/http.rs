//! HTTP request client with rate-limit admission, timeout, and retry.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::ratelimit::RateLimiter;

/// How a fetch failed. `Parse` is distinct from `Http` so callers can
/// fall back differently on a malformed body than on a refused request.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Connection-level failure before a response arrived.
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response.
    #[error("http status {status}")]
    Http {
        /// The response status code.
        status: u16,
    },

    /// The request exceeded its deadline and was cancelled.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body was not the expected JSON shape.
    #[error("malformed response: {0}")]
    Parse(String),
}

impl FetchError {
    /// Whether a retry could plausibly succeed. 429 and 5xx are
    /// retryable; other 4xx are terminal.
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::Http { status } => *status == 429 || *status >= 500,
            Self::Parse(_) => false,
        }
    }
}

/// Request client tuning.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Hard per-attempt deadline; the attempt is cancelled when it fires.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub retries: u32,
    /// First retry delay; doubles per attempt.
    pub backoff_base: Duration,
    /// Retry delay ceiling.
    pub backoff_max: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            backoff_base: Duration::from_millis(250),
            backoff_max: Duration::from_secs(5),
        }
    }
}

/// A rate-limited, retrying JSON GET client shared by every REST caller.
#[derive(Debug, Clone)]
pub struct RequestClient {
    client: reqwest::Client,
    limiter: Arc<RateLimiter>,
    settings: HttpSettings,
}

impl RequestClient {
    /// Build a client. The limiter is injected, not global.
    pub fn new(limiter: Arc<RateLimiter>, settings: HttpSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            limiter,
            settings,
        })
    }

    /// GET `url` and decode the JSON body as `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        self.get_json_query(url, &[] as &[(&str, &str)]).await
    }

    /// GET `url` with query parameters and decode the JSON body as `T`.
    ///
    /// Rate-limit admission happens before EVERY attempt — a retry
    /// re-enters the limiter. Retryable failures back off exponentially;
    /// the terminal error is surfaced, never swallowed.
    pub async fn get_json_query<T, Q>(&self, url: &str, query: &Q) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let parsed = Url::parse(url).map_err(|e| FetchError::Network(e.to_string()))?;

        let mut attempt: u32 = 0;
        loop {
            self.limiter.admit(&parsed).await;

            match self.attempt_get(url, query).await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.settings.retries => {
                    let delay = self.backoff_for(attempt);
                    tracing::warn!(
                        %url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retryable fetch failure"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(%url, attempt, error = %err, "fetch failed");
                    return Err(err);
                }
            }
        }
    }

    async fn attempt_get<T, Q>(&self, url: &str, query: &Q) -> Result<T, FetchError>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let send = self.client.get(url).query(query).send();
        let response = match tokio::time::timeout(self.settings.timeout, send).await {
            Err(_) => return Err(FetchError::Timeout(self.settings.timeout)),
            Ok(Err(e)) if e.is_timeout() => return Err(FetchError::Timeout(self.settings.timeout)),
            Ok(Err(e)) => return Err(FetchError::Network(e.to_string())),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = match tokio::time::timeout(self.settings.timeout, response.text()).await {
            Err(_) => return Err(FetchError::Timeout(self.settings.timeout)),
            Ok(Err(e)) => return Err(FetchError::Network(e.to_string())),
            Ok(Ok(body)) => body,
        };

        serde_json::from_str(&body).map_err(|e| FetchError::Parse(e.to_string()))
    }

    /// `base * 2^attempt`, capped.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        let millis = (self.settings.backoff_base.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(millis).min(self.settings.backoff_max)
    }
}
