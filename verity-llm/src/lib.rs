//! Verity LLM - Provider Layer
//!
//! Provider-agnostic traits for text completion and web search, the
//! buffered HTTP transport seam, and the retry protocol every outbound call
//! goes through. Concrete Anthropic and Serper clients live in [`providers`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use verity_core::{RequestContext, VerityResult};

pub mod http;
pub mod providers;
pub mod retry;
pub mod search;

pub use http::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, TransportError};
pub use providers::{AnthropicClient, SerperClient};
pub use retry::RetryPolicy;
pub use search::{build_search_query, SearchContext, SearchSnippet, ANALYSIS_RESULT_LIMIT};

// ============================================================================
// COMPLETION PROVIDER TRAIT
// ============================================================================

/// A single prompt sent to a completion model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Agent or component issuing the call, used in logs
    pub caller: String,
    pub system: Option<String>,
    pub prompt: String,
    /// Let the model use its own web search tool
    pub web_search: bool,
}

impl CompletionRequest {
    pub fn new(caller: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            system: None,
            prompt: prompt.into(),
            web_search: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.web_search = enabled;
        self
    }
}

/// Token counts reported by the provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// Non-empty completion text plus usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub usage: TokenUsage,
}

/// Trait for completion providers.
/// Implementations must be thread-safe (Send + Sync).
///
/// A successful call never returns empty text; providers report an empty
/// completion as `LlmError::InvalidResponse`.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Run one completion.
    ///
    /// # Returns
    /// * `Ok(Completion)` - non-empty completion text
    /// * `Err(VerityError::Cancelled)` - the context was cancelled
    /// * `Err(VerityError::Llm)` - transport, provider, or response failure
    async fn complete(
        &self,
        ctx: &RequestContext,
        request: &CompletionRequest,
    ) -> VerityResult<Completion>;

    /// Provider name for logs (e.g., "anthropic").
    fn provider_name(&self) -> &str;
}

// ============================================================================
// SEARCH PROVIDER TRAIT
// ============================================================================

/// Trait for web search providers.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query` and extract the snippets and sources.
    async fn search(&self, ctx: &RequestContext, query: &str) -> VerityResult<SearchContext>;

    fn provider_name(&self) -> &str;
}

// ============================================================================
// COST TRACKER
// ============================================================================

/// Tracks token usage across all completion calls.
/// Thread-safe via atomic operations.
pub struct CostTracker {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    requests: AtomicU64,
}

impl CostTracker {
    /// Create a new cost tracker with zero counts.
    pub fn new() -> Self {
        Self {
            input_tokens: AtomicU64::new(0),
            output_tokens: AtomicU64::new(0),
            requests: AtomicU64::new(0),
        }
    }

    /// Record one completed request.
    pub fn record(&self, usage: TokenUsage) {
        self.input_tokens
            .fetch_add(usage.input_tokens, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(usage.output_tokens, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn input_tokens(&self) -> u64 {
        self.input_tokens.load(Ordering::Relaxed)
    }

    pub fn output_tokens(&self) -> u64 {
        self.output_tokens.load(Ordering::Relaxed)
    }

    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.input_tokens.store(0, Ordering::Relaxed);
        self.output_tokens.store(0, Ordering::Relaxed);
        self.requests.store(0, Ordering::Relaxed);
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CostTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CostTracker")
            .field("input_tokens", &self.input_tokens())
            .field("output_tokens", &self.output_tokens())
            .field("requests", &self.requests())
            .finish()
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================
