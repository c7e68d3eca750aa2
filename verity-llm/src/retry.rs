//! Retry protocol for outbound provider calls
//!
//! Every LLM and search request goes through [`RetryPolicy::execute`]:
//!
//! - transport failures, 5xx and 429 responses are retried
//! - any other non-2xx response fails immediately with the provider's message
//! - cancellation of the [`RequestContext`] aborts the in-flight request and
//!   any pending wait, and is never retried
//! - waits grow exponentially from `initial_backoff`, except that a 429 with
//!   a `Retry-After` header waits exactly that long, up to `max_backoff`

use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use reqwest::StatusCode;
use std::time::{Duration, Instant};
use verity_core::{LlmError, RequestContext, RetryConfig, VerityError, VerityResult};

/// Backoff schedule and attempt budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.backoff_multiplier,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total attempts including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Computed delay before retry number `retry` (0-based).
    ///
    /// With the defaults this is 1s, 2s, 4s, ... capped at `max_backoff`.
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(62) as i32);
        let secs = self.initial_backoff.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_backoff.as_secs_f64() {
            self.max_backoff
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Send `request` through `transport`, retrying per the protocol.
    ///
    /// # Returns
    /// * `Ok(HttpResponse)` - the first 2xx response
    /// * `Err(VerityError::Cancelled)` - the context was cancelled
    /// * `Err(VerityError::Llm)` - a permanent failure, or the last transient
    ///   failure once the attempt budget is spent
    pub async fn execute(
        &self,
        transport: &dyn HttpTransport,
        request: &HttpRequest,
        provider: &str,
        ctx: &RequestContext,
    ) -> VerityResult<HttpResponse> {
        let max_attempts = self.max_attempts();
        let mut attempt: u32 = 0;

        loop {
            ctx.ensure_active()?;
            attempt += 1;
            let started = Instant::now();

            let outcome = tokio::select! {
                _ = ctx.cancellation().cancelled() => return Err(VerityError::Cancelled),
                outcome = transport.send(request) => outcome,
            };

            let (error, requested_wait) = match outcome {
                Ok(response) if response.is_success() => {
                    tracing::debug!(
                        correlation_id = %ctx.correlation_id(),
                        provider,
                        attempt,
                        status = response.status.as_u16(),
                        duration_ms = started.elapsed().as_millis() as u64,
                        "Provider call succeeded"
                    );
                    return Ok(response);
                }
                Ok(response) => classify(
                    provider,
                    &response,
                    self.backoff_for(attempt - 1),
                    self.max_backoff,
                )?,
                Err(e) => (
                    LlmError::Transport {
                        provider: provider.to_string(),
                        reason: e.reason,
                    },
                    None,
                ),
            };

            if attempt >= max_attempts {
                tracing::error!(
                    correlation_id = %ctx.correlation_id(),
                    provider,
                    attempts = attempt,
                    error = %error,
                    "Provider call failed after all retries"
                );
                return Err(error.into());
            }

            let delay = requested_wait.unwrap_or_else(|| self.backoff_for(attempt - 1));
            tracing::warn!(
                correlation_id = %ctx.correlation_id(),
                provider,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying provider call"
            );
            ctx.sleep(delay).await?;
        }
    }
}

/// Turn a non-2xx response into a retryable error plus an optional
/// server-requested wait, or fail immediately for permanent statuses.
fn classify(
    provider: &str,
    response: &HttpResponse,
    computed_backoff: Duration,
    max_wait: Duration,
) -> Result<(LlmError, Option<Duration>), VerityError> {
    let status = response.status;
    let message = response.error_message();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response.retry_after().map(|wait| wait.min(max_wait));
        let wait = retry_after.unwrap_or(computed_backoff);
        let error = LlmError::RateLimited {
            provider: provider.to_string(),
            retry_after_ms: wait.as_millis() as u64,
            message: format!(
                "rate limit exceeded (retry after {}s): {}",
                wait.as_secs(),
                message
            ),
        };
        return Ok((error, retry_after));
    }

    if status.is_server_error() {
        return Ok((
            LlmError::ServerError {
                provider: provider.to_string(),
                status: status.as_u16(),
                message,
            },
            None,
        ));
    }

    Err(LlmError::RequestFailed {
        provider: provider.to_string(),
        status: status.as_u16(),
        message,
    }
    .into())
}
