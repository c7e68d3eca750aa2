//! Buffered HTTP requests and the transport seam
//!
//! Requests carry their body as owned bytes so the retry executor can send
//! the exact same payload on every attempt. The [`HttpTransport`] trait is the
//! only place that touches the network; tests substitute a scripted one.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use verity_core::{LlmError, VerityResult};

/// Longest provider error body echoed back into an error message.
const MAX_ERROR_BODY_CHARS: usize = 500;

// ============================================================================
// REQUEST / RESPONSE
// ============================================================================

/// A fully buffered POST request.
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub timeout: Duration,
}

impl HttpRequest {
    /// Start a POST request with a default 30 second timeout.
    pub fn post(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Serialize `body` as JSON once and set the content type.
    pub fn json<T: Serialize>(mut self, provider: &str, body: &T) -> Result<Self, LlmError> {
        self.body = serde_json::to_vec(body).map_err(|e| LlmError::Serialization {
            provider: provider.to_string(),
            reason: e.to_string(),
        })?;
        Ok(self.header("content-type", "application/json"))
    }

    /// Look up a header value by case-insensitive name.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let header_names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &header_names)
            .field("body_len", &self.body.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// A response with its body already read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Delay requested by a `Retry-After` header, in seconds.
    pub fn retry_after(&self) -> Option<Duration> {
        parse_retry_after(&self.headers)
    }

    /// Human readable error message extracted from the body.
    ///
    /// Understands both `{"type": .., "message": ..}` and the nested
    /// `{"error": {"type": .., "message": ..}}` shapes.
    pub fn error_message(&self) -> String {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(&self.body) {
            let detail = value.get("error").filter(|e| e.is_object()).unwrap_or(&value);
            let message = detail.get("message").and_then(|m| m.as_str());
            let kind = detail.get("type").and_then(|t| t.as_str());
            match (kind, message) {
                (Some(kind), Some(message)) => return format!("{}: {}", kind, message),
                (None, Some(message)) => return message.to_string(),
                _ => {}
            }
        }

        let trimmed = self.body.trim();
        if trimmed.is_empty() {
            return self
                .status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string();
        }
        trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
    }
}

/// Parse a `Retry-After` header given in (possibly fractional) seconds.
///
/// Values too large for a [`Duration`] saturate to [`Duration::MAX`]; callers
/// clamp the wait to their own ceiling.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?;
    let secs = value.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

// ============================================================================
// TRANSPORT
// ============================================================================

/// Network-level failure: connect, timeout, or body read.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{reason}")]
pub struct TransportError {
    pub reason: String,
}

impl TransportError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Sends one buffered request and returns the buffered response.
///
/// Implementations do not retry; that is the job of [`crate::RetryPolicy`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> VerityResult<Self> {
        let client = Client::builder().build().map_err(|e| LlmError::Transport {
            provider: "http".to_string(),
            reason: format!("Failed to build HTTP client: {}", e),
        })?;
        Ok(Self { client })
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self
            .client
            .post(&request.url)
            .timeout(request.timeout)
            .body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::new(format!("request timed out after {:?}", request.timeout))
            } else {
                TransportError::new(format!("HTTP request failed: {}", e))
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::new(format!("Failed to read response body: {}", e)))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_retry_after_integer_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_retry_after_fractional_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_millis(1500)));
    }

    #[test]
    fn test_retry_after_rejects_garbage() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(RETRY_AFTER, HeaderValue::from_static("-3"));
        assert_eq!(parse_retry_after(&headers), None);
        assert_eq!(parse_retry_after(&HeaderMap::new()), None);
    }

    #[test]
    fn test_retry_after_saturates_huge_values() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("1e20"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::MAX));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("inf"));
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn test_error_message_flat_shape() {
        let response = HttpResponse::new(
            StatusCode::BAD_REQUEST,
            r#"{"type":"invalid_request_error","message":"max_tokens too large"}"#,
        );
        assert_eq!(
            response.error_message(),
            "invalid_request_error: max_tokens too large"
        );
    }

    #[test]
    fn test_error_message_nested_shape() {
        let response = HttpResponse::new(
            StatusCode::UNAUTHORIZED,
            r#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#,
        );
        assert_eq!(
            response.error_message(),
            "authentication_error: invalid x-api-key"
        );
    }

    #[test]
    fn test_error_message_plain_body_and_empty_body() {
        let response = HttpResponse::new(StatusCode::BAD_GATEWAY, "  upstream down ");
        assert_eq!(response.error_message(), "upstream down");

        let response = HttpResponse::new(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(response.error_message(), "Service Unavailable");
    }

    #[test]
    fn test_request_builder_and_redacted_debug() {
        let request = HttpRequest::post("https://example.test/search")
            .header("X-API-KEY", "secret")
            .timeout(Duration::from_secs(5))
            .json("serper", &serde_json::json!({"q": "moon", "num": 5}))
            .unwrap();
        assert_eq!(request.header_value("x-api-key"), Some("secret"));
        assert_eq!(request.header_value("Content-Type"), Some("application/json"));
        assert_eq!(request.timeout, Duration::from_secs(5));

        let debug = format!("{:?}", request);
        assert!(debug.contains("X-API-KEY"));
        assert!(!debug.contains("secret"));
    }
}
