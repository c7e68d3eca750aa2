//! Sequential analysis pipeline
//!
//! Runs the summarizer, the takeaway extractor and the fact checker one after
//! another against a single transcript. The summarizer is fatal; the other two
//! stages degrade to empty output when they fail. Cancellation always aborts.

use crate::fact_checker::{ClaimPacer, FactChecker};
use crate::parser::{LabeledTextParser, ResponseParser};
use crate::summarizer::Summarizer;
use crate::takeaways::TakeawayExtractor;
use std::sync::Arc;
use std::time::Instant;
use verity_core::{AgentLimits, AnalysisResults, RequestContext, VerityError, VerityResult};
use verity_llm::{CompletionProvider, SearchProvider};

/// The three analysis stages, in execution order.
pub struct AnalysisPipeline {
    summarizer: Summarizer,
    takeaways: TakeawayExtractor,
    fact_checker: FactChecker,
}

impl AnalysisPipeline {
    pub fn new(summarizer: Summarizer, takeaways: TakeawayExtractor, fact_checker: FactChecker) -> Self {
        Self {
            summarizer,
            takeaways,
            fact_checker,
        }
    }

    pub fn builder(
        llm: Arc<dyn CompletionProvider>,
        search: Arc<dyn SearchProvider>,
    ) -> PipelineBuilder {
        PipelineBuilder::new(llm, search)
    }

    /// Run every stage against `content`.
    ///
    /// Returns an error only when the summarizer fails or the context is
    /// cancelled.
    pub async fn run(&self, ctx: &RequestContext, content: &str) -> VerityResult<AnalysisResults> {
        let started = Instant::now();
        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            content_length = content.len(),
            "Starting analysis pipeline"
        );

        let summary = self.summarizer.run(ctx, content).await?;

        let takeaways = degrade(
            ctx,
            TakeawayExtractor::NAME,
            self.takeaways.run(ctx, content, Some(&summary)).await,
        )?
        .unwrap_or_default();

        let fact_checks = degrade(
            ctx,
            FactChecker::NAME,
            self.fact_checker.run(ctx, content).await,
        )?
        .map(|report| report.fact_checks)
        .unwrap_or_default();

        tracing::info!(
            correlation_id = %ctx.correlation_id(),
            duration_ms = started.elapsed().as_millis() as u64,
            takeaways_count = takeaways.len(),
            fact_checks_count = fact_checks.len(),
            "Analysis pipeline completed"
        );

        Ok(AnalysisResults {
            summary: Some(summary),
            takeaways,
            fact_checks,
        })
    }
}

/// Turn a non-fatal stage failure into `Ok(None)`. Cancellation still
/// propagates.
fn degrade<T>(
    ctx: &RequestContext,
    stage: &'static str,
    result: VerityResult<T>,
) -> VerityResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(VerityError::Cancelled) => Err(VerityError::Cancelled),
        Err(error) => {
            tracing::warn!(
                correlation_id = %ctx.correlation_id(),
                stage,
                error = %error,
                "Stage failed, continuing with empty output"
            );
            Ok(None)
        }
    }
}

/// Assembles an [`AnalysisPipeline`] that shares one parser and one set of
/// limits across all stages.
pub struct PipelineBuilder {
    llm: Arc<dyn CompletionProvider>,
    search: Arc<dyn SearchProvider>,
    parser: Arc<dyn ResponseParser>,
    limits: AgentLimits,
    pacer: Option<Arc<dyn ClaimPacer>>,
}

impl PipelineBuilder {
    pub fn new(llm: Arc<dyn CompletionProvider>, search: Arc<dyn SearchProvider>) -> Self {
        Self {
            llm,
            search,
            parser: Arc::new(LabeledTextParser::new()),
            limits: AgentLimits::default(),
            pacer: None,
        }
    }

    pub fn limits(mut self, limits: AgentLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn parser(mut self, parser: Arc<dyn ResponseParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replace the default fixed-delay pacing between claims.
    pub fn pacer(mut self, pacer: Arc<dyn ClaimPacer>) -> Self {
        self.pacer = Some(pacer);
        self
    }

    pub fn build(self) -> AnalysisPipeline {
        let summarizer = Summarizer::new(self.llm.clone(), self.parser.clone(), self.limits.clone());
        let takeaways =
            TakeawayExtractor::new(self.llm.clone(), self.parser.clone(), self.limits.clone());
        let mut fact_checker = FactChecker::new(self.llm, self.search, self.parser, self.limits);
        if let Some(pacer) = self.pacer {
            fact_checker = fact_checker.with_pacer(pacer);
        }
        AnalysisPipeline::new(summarizer, takeaways, fact_checker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fact_checker::FixedDelayPacer;
    use std::time::Duration;
    use verity_core::AgentError;
    use verity_test_utils::fixtures::sample_transcript;
    use verity_test_utils::{Reply, ScriptedCompletionProvider, StaticSearchProvider};

    const SUMMARY: &str = "Hosts discuss the 2026 Mars mission and falling launch costs.";

    fn pipeline(llm: ScriptedCompletionProvider) -> (AnalysisPipeline, Arc<ScriptedCompletionProvider>) {
        let llm = Arc::new(llm);
        let pipeline = AnalysisPipeline::builder(llm.clone(), Arc::new(StaticSearchProvider::new()))
            .pacer(Arc::new(FixedDelayPacer::new(Duration::ZERO)))
            .build();
        (pipeline, llm)
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let (pipeline, llm) = pipeline(
            ScriptedCompletionProvider::new()
                .on_caller(Summarizer::NAME, Reply::text(SUMMARY))
                .on_caller(TakeawayExtractor::NAME, Reply::text("1. Launch costs have dropped a lot"))
                .on_caller(FactChecker::NAME, Reply::text("No claims.")),
        );
        let results = pipeline.run(&RequestContext::new(), &sample_transcript()).await.unwrap();

        assert_eq!(results.summary.as_deref(), Some(SUMMARY));
        assert_eq!(results.takeaways, vec!["Launch costs have dropped a lot."]);
        assert!(results.fact_checks.is_empty());

        let callers: Vec<String> = llm.calls().into_iter().map(|c| c.caller).collect();
        assert_eq!(callers, vec!["summarizer", "takeaway_extractor", "fact_checker"]);
    }

    #[tokio::test]
    async fn test_summarizer_failure_is_fatal() {
        let (pipeline, llm) = pipeline(
            ScriptedCompletionProvider::new().on_caller(Summarizer::NAME, Reply::api_error("overloaded")),
        );
        let result = pipeline.run(&RequestContext::new(), &sample_transcript()).await;
        assert!(matches!(result, Err(VerityError::Llm(_))));
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_takeaway_failure_degrades() {
        let (pipeline, _) = pipeline(
            ScriptedCompletionProvider::new()
                .on_caller(Summarizer::NAME, Reply::text(SUMMARY))
                .on_caller(
                    TakeawayExtractor::NAME,
                    Reply::error(AgentError::InvalidOutput {
                        agent: "takeaway_extractor".to_string(),
                        reason: "no takeaways extracted".to_string(),
                    }),
                )
                .on_caller(FactChecker::NAME, Reply::text("No claims.")),
        );
        let results = pipeline.run(&RequestContext::new(), &sample_transcript()).await.unwrap();
        assert_eq!(results.summary.as_deref(), Some(SUMMARY));
        assert!(results.takeaways.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_is_not_degraded() {
        let (pipeline, _) = pipeline(
            ScriptedCompletionProvider::new()
                .on_caller(Summarizer::NAME, Reply::text(SUMMARY))
                .on_caller(TakeawayExtractor::NAME, Reply::error(VerityError::Cancelled)),
        );
        let result = pipeline.run(&RequestContext::new(), &sample_transcript()).await;
        assert_eq!(result, Err(VerityError::Cancelled));
    }
}
