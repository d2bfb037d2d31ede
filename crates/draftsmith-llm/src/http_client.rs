//! Shared HTTP client infrastructure for HTTP-based LLM providers
//!
//! One `reqwest::Client` per backend, with a per-request timeout and a bounded
//! retry policy with exponential backoff.

use draftsmith_utils::redaction::redact_error_message;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::LlmError;

/// Default maximum HTTP timeout (5 minutes)
const DEFAULT_MAX_HTTP_TIMEOUT: Duration = Duration::from_secs(300);

/// Default connect timeout (30 seconds)
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum number of retry attempts for 5xx, 429 and network failures
pub(crate) const MAX_RETRIES: u32 = 2;

/// Initial backoff duration for retries (1 second)
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Request parameters shared by the HTTP backends
#[derive(Debug, Clone)]
pub(crate) struct HttpParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for HttpParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.4,
        }
    }
}

/// Shared HTTP client for LLM providers
#[derive(Clone)]
pub(crate) struct HttpClient {
    client: Arc<Client>,
    max_timeout: Duration,
    initial_backoff: Duration,
}

/// What to do after a failed attempt.
#[derive(Debug, PartialEq, Eq)]
enum Disposition {
    Retry,
    Fail,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    ///
    /// # Errors
    ///
    /// Returns `LlmError::Misconfiguration` if the client cannot be constructed
    pub fn new() -> Result<Self, LlmError> {
        Self::with_max_timeout(DEFAULT_MAX_HTTP_TIMEOUT)
    }

    /// Create a new HTTP client with a custom maximum timeout
    pub fn with_max_timeout(max_timeout: Duration) -> Result<Self, LlmError> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| {
                LlmError::Misconfiguration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client: Arc::new(client),
            max_timeout,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Start a POST request on the shared connection pool.
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.client.post(url)
    }

    /// Execute an HTTP request with timeout and retry policy
    ///
    /// - Per-request timeout: `min(request_timeout, max_timeout)`
    /// - Up to [`MAX_RETRIES`] retries for 5xx, 429 and network failures
    /// - Exponential backoff: 1s, 2s, ...
    /// - 401/403 fail immediately with `ProviderAuth`
    /// - A 429 that survives every retry becomes `ProviderQuota`
    /// - Other 4xx fail immediately with `Transport`
    /// - A timeout fails immediately with `Timeout`
    pub async fn execute_with_retry(
        &self,
        request_builder: RequestBuilder,
        request_timeout: Duration,
        provider_name: &str,
    ) -> Result<Response, LlmError> {
        let effective_timeout = request_timeout.min(self.max_timeout);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let request = request_builder
                .try_clone()
                .ok_or_else(|| {
                    LlmError::Transport("Failed to clone request for retry".to_string())
                })?
                .timeout(effective_timeout)
                .build()
                .map_err(|e| LlmError::Transport(format!("Failed to build request: {}", e)))?;

            debug!(
                provider = provider_name,
                attempt,
                timeout_secs = effective_timeout.as_secs(),
                "Executing HTTP request"
            );

            let (error, disposition) = match self.client.execute(request).await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let body = response.text().await.unwrap_or_default();
                    classify_status(status, provider_name, &body)
                }
                Err(e) if e.is_timeout() => {
                    return Err(LlmError::Timeout {
                        duration: effective_timeout,
                    });
                }
                Err(e) => (
                    LlmError::Transport(format!(
                        "{} request failed: {}",
                        provider_name,
                        redact_error_message(&e.to_string())
                    )),
                    Disposition::Retry,
                ),
            };

            if disposition == Disposition::Fail {
                return Err(error);
            }

            if attempt > MAX_RETRIES {
                return Err(exhausted(error));
            }

            let backoff = backoff_for_attempt(self.initial_backoff, attempt);
            warn!(
                provider = provider_name,
                attempt,
                backoff_ms = backoff.as_millis() as u64,
                error = %error,
                "Transient provider failure, will retry"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

/// Backoff before retry number `attempt` (1-based): `initial * 2^(attempt-1)`.
fn backoff_for_attempt(initial: Duration, attempt: u32) -> Duration {
    initial * 2u32.saturating_pow(attempt.saturating_sub(1))
}

/// Final error once retries ran out.
fn exhausted(error: LlmError) -> LlmError {
    match error {
        LlmError::ProviderQuota(msg) => {
            LlmError::ProviderQuota(format!("{msg} (after {MAX_RETRIES} retries)"))
        }
        other => other,
    }
}

/// Map a non-success HTTP status to an `LlmError` and whether to retry it.
fn classify_status(status: StatusCode, provider_name: &str, body: &str) -> (LlmError, Disposition) {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => (
            LlmError::ProviderAuth(format!(
                "{} authentication failed: {}",
                provider_name, status
            )),
            Disposition::Fail,
        ),
        StatusCode::TOO_MANY_REQUESTS => (
            LlmError::ProviderQuota(format!("{} rate limit exceeded: {}", provider_name, status)),
            Disposition::Retry,
        ),
        s if s.is_server_error() => (
            LlmError::ProviderOutage(format!(
                "{} returned server error: {}",
                provider_name, status
            )),
            Disposition::Retry,
        ),
        _ => {
            let detail = redact_error_message(&body.chars().take(200).collect::<String>());
            (
                LlmError::Transport(format!(
                    "{} returned client error: {} {}",
                    provider_name,
                    status,
                    detail.trim()
                )),
                Disposition::Fail,
            )
        }
    }
}
