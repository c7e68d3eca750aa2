//! Anthropic Messages API client

use super::types::{ContentBlock, Message, MessageRequest, MessageResponse, Tool};
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::retry::RetryPolicy;
use crate::{Completion, CompletionProvider, CompletionRequest, CostTracker, TokenUsage};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use verity_core::{AnthropicSettings, LlmError, RequestContext, RetryConfig, VerityResult};

pub const PROVIDER_NAME: &str = "anthropic";

/// Beta header value that enables the server-side web search tool.
pub const WEB_SEARCH_BETA: &str = "web-search-2025-03-05";

/// Claude completion client.
pub struct AnthropicClient {
    settings: AnthropicSettings,
    retry: RetryPolicy,
    transport: Arc<dyn HttpTransport>,
    cost_tracker: Arc<CostTracker>,
}

impl AnthropicClient {
    /// Create a client backed by reqwest.
    pub fn new(settings: AnthropicSettings, retry: &RetryConfig) -> VerityResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(settings, RetryPolicy::from(retry), transport))
    }

    /// Create a client over an arbitrary transport.
    pub fn with_transport(
        settings: AnthropicSettings,
        retry: RetryPolicy,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            settings,
            retry,
            transport,
            cost_tracker: Arc::new(CostTracker::new()),
        }
    }

    /// Share a cost tracker with other clients.
    pub fn with_cost_tracker(mut self, tracker: Arc<CostTracker>) -> Self {
        self.cost_tracker = tracker;
        self
    }

    pub fn cost_tracker(&self) -> &Arc<CostTracker> {
        &self.cost_tracker
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn messages_url(&self) -> String {
        format!("{}/messages", self.settings.base_url.trim_end_matches('/'))
    }

    /// Build the wire request for one completion.
    pub fn build_request(&self, request: &CompletionRequest) -> MessageRequest {
        MessageRequest {
            model: self.settings.model.clone(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
            messages: vec![Message::user(request.prompt.clone())],
            system: request.system.clone().filter(|s| !s.trim().is_empty()),
            tools: request.web_search.then(|| vec![Tool::web_search()]),
        }
    }

    fn build_http_request(&self, request: &CompletionRequest) -> Result<HttpRequest, LlmError> {
        let mut http = HttpRequest::post(self.messages_url())
            .header("x-api-key", self.settings.api_key.clone())
            .header("anthropic-version", self.settings.api_version.clone())
            .timeout(self.settings.timeout);
        if request.web_search {
            http = http.header("anthropic-beta", WEB_SEARCH_BETA);
        }
        http.json(PROVIDER_NAME, &self.build_request(request))
    }

    /// Concatenate the text blocks of a response, rejecting empty output.
    fn extract_text(response: &MessageResponse) -> Result<String, LlmError> {
        if response.content.is_empty() {
            return Err(invalid_response("empty response content"));
        }
        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("");
        if text.trim().is_empty() {
            return Err(invalid_response("empty response text"));
        }
        Ok(text)
    }
}

fn invalid_response(reason: impl Into<String>) -> LlmError {
    LlmError::InvalidResponse {
        provider: PROVIDER_NAME.to_string(),
        reason: reason.into(),
    }
}

#[async_trait]
impl CompletionProvider for AnthropicClient {
    async fn complete(
        &self,
        ctx: &RequestContext,
        request: &CompletionRequest,
    ) -> VerityResult<Completion> {
        let started = Instant::now();
        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            agent = %request.caller,
            model = %self.settings.model,
            prompt_length = request.prompt.len(),
            has_system = request.system.is_some(),
            web_search = request.web_search,
            "Making Anthropic API call"
        );

        let http = self.build_http_request(request)?;
        let response = self
            .retry
            .execute(self.transport.as_ref(), &http, PROVIDER_NAME, ctx)
            .await?;

        let parsed: MessageResponse = serde_json::from_str(&response.body)
            .map_err(|e| invalid_response(format!("failed to decode response: {}", e)))?;
        let text = Self::extract_text(&parsed)?;
        let usage = TokenUsage {
            input_tokens: parsed.usage.input_tokens,
            output_tokens: parsed.usage.output_tokens,
        };
        self.cost_tracker.record(usage);

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            agent = %request.caller,
            duration_ms = started.elapsed().as_millis() as u64,
            response_length = text.len(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Anthropic API response received"
        );

        Ok(Completion { text, usage })
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("api_key", &"[REDACTED]")
            .field("retry", &self.retry)
            .finish()
    }
}
