//! Request-scoped context threaded through every external call
//!
//! A [`RequestContext`] carries the correlation id used in every log line and
//! the cancellation token observed by retries, waits, and in-flight requests.
//! It is passed explicitly by reference; nothing is looked up by string key.

use crate::{VerityError, VerityResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Header consulted first for an inbound correlation id.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Fallback header for an inbound correlation id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

// ============================================================================
// CORRELATION ID
// ============================================================================

/// Opaque trace identifier attached to a request or job run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id. Blank input generates a fresh one.
    pub fn new(value: impl Into<String>) -> Self {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            Self::generate()
        } else {
            Self(trimmed.to_string())
        }
    }

    /// Resolve an id from inbound headers.
    ///
    /// `X-Correlation-ID` wins over `X-Request-ID`; a new id is generated when
    /// neither carries a value. Header names match case-insensitively.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut request_id = None;
        for (name, value) in headers {
            if value.trim().is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case(CORRELATION_ID_HEADER) {
                return Self::new(value);
            }
            if name.eq_ignore_ascii_case(REQUEST_ID_HEADER) && request_id.is_none() {
                request_id = Some(value);
            }
        }
        request_id.map(Self::new).unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(id: Uuid) -> Self {
        Self(id.to_string())
    }
}

// ============================================================================
// REQUEST CONTEXT
// ============================================================================

/// Correlation id plus cancellation for one unit of work.
#[derive(Debug, Clone)]
pub struct RequestContext {
    correlation_id: CorrelationId,
    cancellation: CancellationToken,
}

impl RequestContext {
    /// Context with a generated correlation id and a fresh token.
    pub fn new() -> Self {
        Self::with_correlation_id(CorrelationId::generate())
    }

    pub fn with_correlation_id(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Context whose cancellation follows an existing token.
    pub fn with_cancellation(correlation_id: CorrelationId, cancellation: CancellationToken) -> Self {
        Self {
            correlation_id,
            cancellation,
        }
    }

    /// Derive a context with a new correlation id that is cancelled whenever
    /// this one is.
    pub fn child(&self, correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            cancellation: self.cancellation.child_token(),
        }
    }

    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Request cancellation of this context and its children.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fail fast with `VerityError::Cancelled` once cancelled.
    pub fn ensure_active(&self) -> VerityResult<()> {
        if self.is_cancelled() {
            Err(VerityError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning early with `Cancelled` if the context
    /// is cancelled first.
    pub async fn sleep(&self, duration: Duration) -> VerityResult<()> {
        tokio::select! {
            _ = self.cancellation.cancelled() => Err(VerityError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
