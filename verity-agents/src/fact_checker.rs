//! Fact checker agent
//!
//! Extracts a few verifiable claims from a transcript, then checks each one
//! in order: web search, then an LLM verdict over the top search snippets.
//! A failure on one claim turns that claim into an `unverifiable` result and
//! moves on to the next; only cancellation stops the loop.

use crate::content::{truncate_content, truncate_for_log, validate_content, AgentRun};
use crate::parser::{ConfidenceSource, ResponseParser};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use verity_core::{
    AgentLimits, FactCheck, RequestContext, VerdictTally, Verdict, VerityError, VerityResult,
};
use verity_llm::{build_search_query, CompletionProvider, CompletionRequest, SearchProvider};

/// Evidence recorded when a search finds nothing for a claim.
pub const NO_SEARCH_RESULTS: &str = "No search results found";

const EXTRACTION_SYSTEM_PROMPT: &str = "You are an expert at identifying specific, verifiable factual claims in text. \
Focus on concrete statements that make specific assertions about real-world facts, events, dates, numbers, \
or entities that can be checked against reliable sources.";

const VERDICT_SYSTEM_PROMPT: &str = "You are a professional fact-checker analyzing web search results. \
Evaluate claims objectively based on source quality and evidence strength. \
Be precise and concise in your assessment.";

// ============================================================================
// PACING
// ============================================================================

/// Backpressure applied between consecutive claim verifications.
#[async_trait]
pub trait ClaimPacer: Send + Sync {
    /// Wait before the next claim. Returns `Cancelled` if the context is
    /// cancelled while waiting.
    async fn pause(&self, ctx: &RequestContext) -> VerityResult<()>;
}

/// Sleeps a fixed delay between claims.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelayPacer {
    delay: Duration,
}

impl FixedDelayPacer {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

#[async_trait]
impl ClaimPacer for FixedDelayPacer {
    async fn pause(&self, ctx: &RequestContext) -> VerityResult<()> {
        if self.delay.is_zero() {
            return ctx.ensure_active();
        }
        ctx.sleep(self.delay).await
    }
}

// ============================================================================
// FACT CHECKER
// ============================================================================

/// Why a single claim could not be verified.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClaimVerificationError {
    #[error("web search failed: {0}")]
    Search(VerityError),

    #[error("analysis failed: {0}")]
    Analysis(VerityError),
}

impl ClaimVerificationError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Search(e) | Self::Analysis(e) => e.is_cancelled(),
        }
    }
}

/// Output of one fact-checking run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactCheckReport {
    pub fact_checks: Vec<FactCheck>,
    pub tally: VerdictTally,
}

impl FactCheckReport {
    fn new(fact_checks: Vec<FactCheck>) -> Self {
        let tally = VerdictTally::from_checks(&fact_checks);
        Self { fact_checks, tally }
    }
}

pub struct FactChecker {
    llm: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
    parser: Arc<dyn ResponseParser>,
    pacer: Arc<dyn ClaimPacer>,
    limits: AgentLimits,
}

impl FactChecker {
    pub const NAME: &'static str = "fact_checker";

    /// Create a fact checker paced by a [`FixedDelayPacer`] using
    /// `limits.claim_delay`.
    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
        parser: Arc<dyn ResponseParser>,
        limits: AgentLimits,
    ) -> Self {
        let pacer = Arc::new(FixedDelayPacer::new(limits.claim_delay));
        Self {
            llm,
            search,
            parser,
            pacer,
            limits,
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn ClaimPacer>) -> Self {
        self.pacer = pacer;
        self
    }

    fn extraction_prompt(&self, content: &str) -> String {
        format!(
            "Analyze the following podcast transcript and extract factual claims that can be verified.\n\n\
             Look for statements that:\n\
             - Make specific factual assertions about events, dates, numbers, or statistics\n\
             - Reference real people, companies, organizations, or places\n\
             - Mention scientific findings, research results, or studies\n\
             - Claim specific achievements, milestones, or historical events\n\
             - Make predictions with specific timelines or targets\n\n\
             Ignore:\n\
             - Opinions, beliefs, or personal views\n\
             - General statements without specific details\n\
             - Hypothetical scenarios\n\
             - Common knowledge facts\n\
             - Vague or ambiguous statements\n\n\
             TRANSCRIPT:\n{}\n\n\
             Extract 2-3 specific factual claims that can be verified. Format as a simple numbered list:\n\n\
             1. [First specific factual claim]\n\
             2. [Second specific factual claim]\n\
             etc.\n\n\
             FACTUAL CLAIMS:",
            truncate_content(content, self.limits.claim_input_chars)
        )
    }

    fn verdict_prompt(claim: &str, formatted_results: &str) -> String {
        format!(
            "Analyze the following search results to verify this claim:\n\n\
             CLAIM: {}\n\n\
             SEARCH RESULTS:\n{}\n\n\
             Based on these search results, provide your assessment:\n\n\
             VERDICT: [true/false/partially_true/unverifiable]\n\
             CONFIDENCE: [0.0-1.0]\n\
             EVIDENCE: [Brief explanation in 1-2 sentences max]\n\
             SOURCES: [List the most relevant source URLs from the search results]\n\n\
             Guidelines:\n\
             - true: Claim is fully supported by reliable sources\n\
             - false: Claim is contradicted by reliable sources\n\
             - partially_true: Claim has some truth but lacks important context/nuance\n\
             - unverifiable: Insufficient or unreliable sources to make determination\n\n\
             Be concise and focus on the most relevant evidence.",
            claim, formatted_results
        )
    }

    /// Ask the model for up to `max_claims` verifiable claims.
    ///
    /// An empty list is a valid result.
    pub async fn extract_claims(
        &self,
        ctx: &RequestContext,
        content: &str,
    ) -> VerityResult<Vec<String>> {
        let request = CompletionRequest::new(Self::NAME, self.extraction_prompt(content))
            .with_system(EXTRACTION_SYSTEM_PROMPT);
        let completion = self.llm.complete(ctx, &request).await?;
        Ok(self
            .parser
            .parse_claims(&completion.text, self.limits.max_claims))
    }

    /// Verify one claim against fresh search results.
    ///
    /// Search and analysis errors are returned to the caller; zero search
    /// results short-circuits to an `unverifiable` check without calling the
    /// model.
    pub async fn verify_claim(
        &self,
        ctx: &RequestContext,
        claim: &str,
    ) -> Result<FactCheck, ClaimVerificationError> {
        let query = build_search_query(claim);
        let search = self
            .search
            .search(ctx, &query)
            .await
            .map_err(ClaimVerificationError::Search)?;

        if search.is_empty() {
            tracing::warn!(
                agent = Self::NAME,
                correlation_id = %ctx.correlation_id(),
                claim = %truncate_for_log(claim, 100),
                "No search results found for claim"
            );
            return Ok(FactCheck::new(
                claim,
                Verdict::Unverifiable,
                0.0,
                NO_SEARCH_RESULTS,
                Vec::new(),
            ));
        }

        let request = CompletionRequest::new(
            Self::NAME,
            Self::verdict_prompt(claim, &search.format_for_analysis()),
        )
        .with_system(VERDICT_SYSTEM_PROMPT);
        let completion = self
            .llm
            .complete(ctx, &request)
            .await
            .map_err(ClaimVerificationError::Analysis)?;

        let parsed = self
            .parser
            .parse_verification(&completion.text, &search.sources);
        if parsed.confidence_source != ConfidenceSource::Parsed {
            tracing::warn!(
                agent = Self::NAME,
                correlation_id = %ctx.correlation_id(),
                confidence_source = ?parsed.confidence_source,
                confidence = parsed.confidence,
                "Verdict reply had no usable confidence, using default"
            );
        }
        if parsed.sources_fallback && !parsed.sources.is_empty() {
            tracing::debug!(
                agent = Self::NAME,
                correlation_id = %ctx.correlation_id(),
                fallback_sources = parsed.sources.len(),
                "No cited source matched search results, using top results"
            );
        }
        Ok(parsed.into_fact_check(claim))
    }

    /// Extract claims from `content` and verify each in order.
    pub async fn run(&self, ctx: &RequestContext, content: &str) -> VerityResult<FactCheckReport> {
        let run = AgentRun::start(Self::NAME, ctx, content);
        validate_content(content, &self.limits).map_err(|e| run.failed(e))?;

        let claims = self
            .extract_claims(ctx, content)
            .await
            .map_err(|e| run.failed(e))?;
        tracing::info!(
            agent = Self::NAME,
            correlation_id = %ctx.correlation_id(),
            claims_count = claims.len(),
            "Extracted claims for verification"
        );

        let mut fact_checks = Vec::with_capacity(claims.len());
        for (i, claim) in claims.iter().enumerate() {
            if i > 0 {
                self.pacer.pause(ctx).await.map_err(|e| run.failed(e))?;
            }

            let started = Instant::now();
            let check = match self.verify_claim(ctx, claim).await {
                Ok(check) => check,
                Err(e) if e.is_cancelled() => return Err(run.failed(VerityError::Cancelled)),
                Err(e) => {
                    tracing::error!(
                        agent = Self::NAME,
                        correlation_id = %ctx.correlation_id(),
                        claim_num = i + 1,
                        claim = %truncate_for_log(claim, 100),
                        error = %e,
                        "Claim verification failed"
                    );
                    FactCheck::unverifiable(claim.as_str(), format!("Verification failed: {}", e))
                }
            };
            tracing::info!(
                agent = Self::NAME,
                correlation_id = %ctx.correlation_id(),
                claim_num = i + 1,
                verdict = check.verdict.as_db_str(),
                confidence = check.confidence,
                duration_ms = started.elapsed().as_millis() as u64,
                "Claim verified"
            );
            fact_checks.push(check);
        }

        let report = FactCheckReport::new(fact_checks);
        tracing::info!(
            agent = Self::NAME,
            correlation_id = %ctx.correlation_id(),
            total = report.tally.total(),
            true_count = report.tally.true_count,
            false_count = report.tally.false_count,
            partially_true_count = report.tally.partially_true_count,
            unverifiable_count = report.tally.unverifiable_count,
            "Fact-checking verdict tally"
        );
        run.completed(report.fact_checks.len());
        Ok(report)
    }
}
