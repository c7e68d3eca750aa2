//! Verity Test Utilities
//!
//! Centralized test infrastructure for the Verity workspace:
//! - Scripted HTTP transport that records every request and when it arrived
//! - Scripted completion and search providers
//! - Test fixtures for common scenarios
//! - Proptest generators
//! - Custom assertions for Verity-specific validation

pub use verity_core::{
    AnalysisJob, AnalysisResults, EntityType, FactCheck, JobStatus, LlmError, RequestContext,
    StorageError, Verdict, VerityError, VerityResult,
};
pub use verity_llm::{
    Completion, CompletionProvider, CompletionRequest, HttpRequest, HttpResponse, HttpTransport,
    SearchContext, SearchProvider, SearchSnippet, TokenUsage, TransportError,
};

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

// ============================================================================
// SCRIPTED HTTP TRANSPORT
// ============================================================================

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum TransportReply {
    Respond(HttpResponse),
    Fail(TransportError),
    /// Never completes; only cancellation gets the caller out
    Hang,
}

/// A request as seen by [`ScriptedTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: HttpRequest,
    pub at: tokio::time::Instant,
}

/// Transport that replays a fixed script of replies in order.
///
/// Once the script runs out every further send fails with a transport error.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<TransportReply>>,
    recorded: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, reply: TransportReply) -> &Self {
        lock(&self.script).push_back(reply);
        self
    }

    /// Queue a response with the given status and body.
    pub fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.push(TransportReply::Respond(http_response(status, body, None)))
    }

    /// Queue a response carrying a `Retry-After` header.
    pub fn respond_retry_after(&self, status: u16, body: impl Into<String>, retry_after: &str) -> &Self {
        self.push(TransportReply::Respond(http_response(status, body, Some(retry_after))))
    }

    pub fn fail(&self, reason: impl Into<String>) -> &Self {
        self.push(TransportReply::Fail(TransportError::new(reason)))
    }

    pub fn hang(&self) -> &Self {
        self.push(TransportReply::Hang)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.recorded).clone()
    }

    pub fn request_count(&self) -> usize {
        lock(&self.recorded).len()
    }

    /// Gaps between consecutive requests.
    pub fn gaps(&self) -> Vec<std::time::Duration> {
        let recorded = lock(&self.recorded);
        recorded
            .windows(2)
            .map(|pair| pair[1].at.duration_since(pair[0].at))
            .collect()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        lock(&self.recorded).push(RecordedRequest {
            request: request.clone(),
            at: tokio::time::Instant::now(),
        });
        let reply = lock(&self.script).pop_front();
        match reply {
            Some(TransportReply::Respond(response)) => Ok(response),
            Some(TransportReply::Fail(error)) => Err(error),
            Some(TransportReply::Hang) => std::future::pending().await,
            None => Err(TransportError::new("transport script exhausted")),
        }
    }
}

fn http_response(status: u16, body: impl Into<String>, retry_after: Option<&str>) -> HttpResponse {
    let status = reqwest::StatusCode::from_u16(status).unwrap_or(reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = HttpResponse::new(status, body);
    if let Some(value) = retry_after.and_then(|v| reqwest::header::HeaderValue::from_str(v).ok()) {
        response.headers.insert(reqwest::header::RETRY_AFTER, value);
    }
    response
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// SCRIPTED COMPLETION PROVIDER
// ============================================================================

/// What a scripted provider does for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Error(VerityError),
    /// Panic inside the call, for isolation tests
    Panic(String),
    /// Wait until the context is cancelled, then report cancellation
    Hang,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text(text.into())
    }

    pub fn error(error: impl Into<VerityError>) -> Self {
        Reply::Error(error.into())
    }

    /// A permanent provider failure.
    pub fn api_error(message: impl Into<String>) -> Self {
        Reply::Error(VerityError::Llm(LlmError::RequestFailed {
            provider: "scripted".to_string(),
            status: 400,
            message: message.into(),
        }))
    }
}

#[derive(Debug, Clone)]
struct Rule {
    caller: Option<String>,
    prompt_contains: Option<String>,
    reply: Reply,
}

impl Rule {
    fn matches(&self, request: &CompletionRequest) -> bool {
        self.caller.as_deref().map_or(true, |c| c == request.caller)
            && self
                .prompt_contains
                .as_deref()
                .map_or(true, |needle| request.prompt.contains(needle))
    }
}

/// Completion provider driven by rules and a FIFO queue.
///
/// Rules are checked first, in insertion order, and apply to every matching
/// call. Calls that match no rule take the next queued reply. With neither,
/// the call fails with a permanent error.
#[derive(Debug, Default)]
pub struct ScriptedCompletionProvider {
    rules: Vec<Rule>,
    queue: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to every call made by `caller`.
    pub fn on_caller(mut self, caller: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            caller: Some(caller.to_string()),
            prompt_contains: None,
            reply,
        });
        self
    }

    /// Reply to every call whose prompt contains `needle`.
    pub fn on_prompt_containing(mut self, needle: &str, reply: Reply) -> Self {
        self.rules.push(Rule {
            caller: None,
            prompt_contains: Some(needle.to_string()),
            reply,
        });
        self
    }

    /// Queue a one-shot reply.
    pub fn then(self, reply: Reply) -> Self {
        lock(&self.queue).push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    pub fn calls_by(&self, caller: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.caller == caller).count()
    }
}

#[async_trait]
impl CompletionProvider for ScriptedCompletionProvider {
    async fn complete(
        &self,
        ctx: &RequestContext,
        request: &CompletionRequest,
    ) -> VerityResult<Completion> {
        ctx.ensure_active()?;
        lock(&self.calls).push(request.clone());

        let reply = self
            .rules
            .iter()
            .find(|rule| rule.matches(request))
            .map(|rule| rule.reply.clone())
            .or_else(|| lock(&self.queue).pop_front());

        match reply {
            Some(Reply::Text(text)) => Ok(Completion {
                usage: TokenUsage {
                    input_tokens: request.prompt.len() as u64 / 4,
                    output_tokens: text.len() as u64 / 4,
                },
                text,
            }),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Panic(message)) => panic!("{}", message),
            Some(Reply::Hang) => {
                ctx.cancellation().cancelled().await;
                Err(VerityError::Cancelled)
            }
            None => Err(VerityError::Llm(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                status: 400,
                message: format!("no scripted reply for {}", request.caller),
            })),
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

// ============================================================================
// STATIC SEARCH PROVIDER
// ============================================================================

/// Search provider returning canned contexts keyed by exact query.
///
/// Unknown queries return an empty context.
#[derive(Debug, Default)]
pub struct StaticSearchProvider {
    results: HashMap<String, SearchContext>,
    failure: Option<VerityError>,
    queries: Mutex<Vec<String>>,
}

impl StaticSearchProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `snippets` for `query`, with every snippet URL as a source.
    pub fn with_results(mut self, query: &str, snippets: Vec<SearchSnippet>) -> Self {
        let mut ctx = SearchContext::new(query);
        for snippet in snippets {
            ctx.add_source(&snippet.url);
            ctx.push_snippet(snippet);
        }
        self.results.insert(query.to_string(), ctx);
        self
    }

    pub fn with_context(mut self, ctx: SearchContext) -> Self {
        self.results.insert(ctx.query.clone(), ctx);
        self
    }

    /// Fail every search with `error`.
    pub fn failing(mut self, error: impl Into<VerityError>) -> Self {
        self.failure = Some(error.into());
        self
    }

    pub fn queries(&self) -> Vec<String> {
        lock(&self.queries).clone()
    }
}

#[async_trait]
impl SearchProvider for StaticSearchProvider {
    async fn search(&self, ctx: &RequestContext, query: &str) -> VerityResult<SearchContext> {
        ctx.ensure_active()?;
        lock(&self.queries).push(query.to_string());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        Ok(self
            .results
            .get(query)
            .cloned()
            .unwrap_or_else(|| SearchContext::new(query)))
    }

    fn provider_name(&self) -> &str {
        "static"
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;

    /// A transcript comfortably above the minimum content length.
    pub fn sample_transcript() -> String {
        "Welcome back to the show. Today we are talking about space exploration. \
         NASA has announced that its next Mars mission launches in 2026, and the \
         agency says the rover will search for signs of ancient microbial life. \
         Our guest also pointed out that the Apollo 11 crew landed on the Moon in \
         1969, which remains one of the most watched broadcasts in history. \
         Finally we discussed how private launch providers have cut the cost of \
         reaching orbit over the past decade."
            .to_string()
    }

    pub const NASA_CLAIM: &str = "NASA's Mars mission launches in 2026";

    pub fn nasa_snippets() -> Vec<SearchSnippet> {
        vec![
            SearchSnippet::new(
                "NASA Mars Exploration",
                "NASA confirms the next Mars mission is scheduled to launch in 2026.",
                "https://www.nasa.gov/mars-2026",
            ),
            SearchSnippet::new(
                "Space news",
                "The 2026 Mars launch window opens in late 2026.",
                "https://spacenews.example/mars-window",
            ),
        ]
    }

    /// A well-formed verdict reply citing the first NASA source.
    pub fn nasa_verdict_reply() -> String {
        "VERDICT: true\nCONFIDENCE: 0.9\nEVIDENCE: NASA states the Mars mission is scheduled to launch in 2026.\nSOURCES: https://www.nasa.gov/mars-2026".to_string()
    }

    /// Anthropic Messages API success body.
    pub fn anthropic_body(text: &str) -> String {
        serde_json::json!({
            "id": "msg_test",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-20250514",
            "content": [{"type": "text", "text": text}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 42, "output_tokens": 7}
        })
        .to_string()
    }

    /// Serper success body with organic results only.
    pub fn serper_body(results: &[(&str, &str, &str)]) -> String {
        let organic: Vec<serde_json::Value> = results
            .iter()
            .map(|(title, link, snippet)| {
                serde_json::json!({"title": title, "link": link, "snippet": snippet})
            })
            .collect();
        serde_json::json!({ "organic": organic }).to_string()
    }

    pub fn pending_job() -> AnalysisJob {
        AnalysisJob::new(uuid::Uuid::now_v7())
    }

    pub fn sample_results() -> AnalysisResults {
        AnalysisResults {
            summary: Some("NASA plans a Mars launch in 2026.".to_string()),
            takeaways: vec!["Private launches are cheaper than before.".to_string()],
            fact_checks: vec![FactCheck::new(
                NASA_CLAIM,
                Verdict::True,
                0.9,
                "NASA confirms the date.",
                vec!["https://www.nasa.gov/mars-2026".to_string()],
            )],
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for Verity types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_job_status() -> impl Strategy<Value = JobStatus> {
        prop_oneof![
            Just(JobStatus::Pending),
            Just(JobStatus::Processing),
            Just(JobStatus::Completed),
            Just(JobStatus::Failed),
        ]
    }

    pub fn arb_verdict() -> impl Strategy<Value = Verdict> {
        prop::sample::select(Verdict::ALL.to_vec())
    }

    /// A URL drawn from a small pool so collisions are likely.
    pub fn arb_url() -> impl Strategy<Value = String> {
        (0u8..8).prop_map(|n| format!("https://source{}.example/page", n))
    }

    /// Confidence text: in range, out of range, or garbage.
    pub fn arb_confidence_text() -> impl Strategy<Value = String> {
        prop_oneof![
            (0.0f64..=1.0).prop_map(|v| format!("{:.2}", v)),
            (1.0f64..1000.0).prop_map(|v| format!("{:.1}", v)),
            "[a-z]{1,8}",
            "[0-9.]{1,6}",
        ]
    }

    pub fn arb_fact_check() -> impl Strategy<Value = FactCheck> {
        (
            "[A-Za-z ]{10,60}",
            arb_verdict(),
            any::<f64>(),
            "[A-Za-z ]{0,80}",
            prop::collection::vec(arb_url(), 0..3),
        )
            .prop_map(|(claim, verdict, confidence, evidence, sources)| {
                FactCheck::new(claim, verdict, confidence, evidence, sources)
            })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Verity results.

    use super::*;

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &VerityResult<T>, entity_type: EntityType) {
        match result {
            Err(VerityError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &VerityResult<T>) {
        match result {
            Err(VerityError::Cancelled) => {}
            other => panic!("Expected Cancelled, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_llm_error<T: std::fmt::Debug>(result: &VerityResult<T>) {
        match result {
            Err(VerityError::Llm(_)) => {}
            other => panic!("Expected LLM error, got: {:?}", other),
        }
    }

    /// Every fact check is internally consistent.
    #[track_caller]
    pub fn assert_fact_check_valid(check: &FactCheck) {
        assert!(!check.claim.trim().is_empty(), "claim must not be empty");
        assert!(
            (0.0..=1.0).contains(&check.confidence),
            "confidence out of range: {}",
            check.confidence
        );
        assert!(!check.evidence.trim().is_empty(), "evidence must not be empty");
    }

    /// Every source appears in the URLs that were available for the claim.
    #[track_caller]
    pub fn assert_sources_subset(check: &FactCheck, available: &[String]) {
        for source in &check.sources {
            assert!(
                available.contains(source),
                "source {} was not among the search results {:?}",
                source,
                available
            );
        }
    }
}
