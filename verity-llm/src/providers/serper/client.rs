//! Serper search client

use super::types::{SerperRequest, SerperResponse};
use crate::http::{HttpRequest, HttpTransport, ReqwestTransport};
use crate::retry::RetryPolicy;
use crate::search::SearchContext;
use crate::SearchProvider;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use verity_core::{LlmError, RequestContext, RetryConfig, SerperSettings, VerityResult};

pub const PROVIDER_NAME: &str = "serper";

/// Web search client for `google.serper.dev`.
pub struct SerperClient {
    settings: SerperSettings,
    retry: RetryPolicy,
    transport: Arc<dyn HttpTransport>,
}

impl SerperClient {
    pub fn new(settings: SerperSettings, retry: &RetryConfig) -> VerityResult<Self> {
        let transport = Arc::new(ReqwestTransport::new()?);
        Ok(Self::with_transport(settings, RetryPolicy::from(retry), transport))
    }

    pub fn with_transport(
        settings: SerperSettings,
        retry: RetryPolicy,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            settings,
            retry,
            transport,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
    }

    fn search_url(&self) -> String {
        format!("{}/search", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SearchProvider for SerperClient {
    async fn search(&self, ctx: &RequestContext, query: &str) -> VerityResult<SearchContext> {
        let api_key = self.api_key().ok_or_else(|| LlmError::NotConfigured {
            provider: PROVIDER_NAME.to_string(),
            reason: "SERPER_API_KEY is not set".to_string(),
        })?;

        let started = Instant::now();
        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            query,
            num_results = self.settings.num_results,
            "Performing Serper web search"
        );

        let body = SerperRequest {
            q: query.to_string(),
            num: self.settings.num_results,
        };
        let http = HttpRequest::post(self.search_url())
            .header("X-API-KEY", api_key)
            .timeout(self.settings.timeout)
            .json(PROVIDER_NAME, &body)?;

        let response = self
            .retry
            .execute(self.transport.as_ref(), &http, PROVIDER_NAME, ctx)
            .await?;

        let parsed: SerperResponse =
            serde_json::from_str(&response.body).map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER_NAME.to_string(),
                reason: format!("failed to decode response: {}", e),
            })?;

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            duration_ms = started.elapsed().as_millis() as u64,
            results_count = parsed.organic.len(),
            has_answer_box = parsed.answer_box.is_some(),
            has_knowledge_graph = parsed.knowledge_graph.is_some(),
            "Serper search completed"
        );

        Ok(parsed.extract_search_context(query))
    }

    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }
}

impl std::fmt::Debug for SerperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerperClient")
            .field("base_url", &self.settings.base_url)
            .field("configured", &self.is_configured())
            .finish()
    }
}
