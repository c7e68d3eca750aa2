//! Summarizer agent

use crate::content::{truncate_content, validate_content, AgentRun};
use crate::parser::ResponseParser;
use std::sync::Arc;
use verity_core::{AgentError, AgentLimits, RequestContext, VerityResult};
use verity_llm::{CompletionProvider, CompletionRequest};

/// Produces a short status-update style summary of a transcript.
pub struct Summarizer {
    llm: Arc<dyn CompletionProvider>,
    parser: Arc<dyn ResponseParser>,
    limits: AgentLimits,
}

impl Summarizer {
    pub const NAME: &'static str = "summarizer";

    pub fn new(
        llm: Arc<dyn CompletionProvider>,
        parser: Arc<dyn ResponseParser>,
        limits: AgentLimits,
    ) -> Self {
        Self {
            llm,
            parser,
            limits,
        }
    }

    fn system_prompt(&self) -> String {
        format!(
            "You are an expert at creating concise, professional summaries of podcast content for business audiences.\n\n\
             Your task is to create a summary that:\n\
             - Is a maximum of {} characters\n\
             - Captures the main topics and themes discussed\n\
             - Focuses on factual content rather than opinions\n\
             - Does not include filler words or transcription artifacts\n\n\
             The summary should be useful for someone who wants to post a short status update about the episode.",
            self.limits.summary_max_chars
        )
    }

    fn user_prompt(&self, content: &str) -> String {
        format!(
            "Please create a professional summary of the following podcast transcript.\n\
             The summary should be a maximum of {} characters and should include:\n\
             - Main topics and themes discussed\n\
             - Overall context and purpose of the discussion\n\n\
             TRANSCRIPT:\n{}\n\n\
             SUMMARY:",
            self.limits.summary_max_chars,
            truncate_content(content, self.limits.summarizer_input_chars)
        )
    }

    /// Enforce the length budget on a cleaned summary.
    ///
    /// Over-long summaries are cut at a word boundary within 20 characters of
    /// the limit and suffixed with `...`; empty or too-short ones are rejected.
    pub fn finalize(&self, summary: String) -> Result<String, AgentError> {
        if summary.is_empty() {
            return Err(invalid("generated summary is empty"));
        }

        let max = self.limits.summary_max_chars;
        let length = summary.chars().count();
        let summary = if length > max {
            tracing::warn!(
                agent = Self::NAME,
                summary_length = length,
                max_chars = max,
                "Summary exceeds maximum character limit, truncating"
            );
            let cut = summary
                .char_indices()
                .nth(max)
                .map_or(summary.len(), |(idx, _)| idx);
            let mut truncated = &summary[..cut];
            if let Some(space) = truncated.rfind(' ') {
                if truncated[..space].chars().count() > max.saturating_sub(20) {
                    truncated = &truncated[..space];
                }
            }
            format!("{}...", truncated)
        } else {
            summary
        };

        if summary.chars().count() < self.limits.summary_min_chars {
            return Err(invalid("summary too short to be meaningful"));
        }
        Ok(summary)
    }

    /// Summarize `content`.
    pub async fn run(&self, ctx: &RequestContext, content: &str) -> VerityResult<String> {
        let run = AgentRun::start(Self::NAME, ctx, content);
        validate_content(content, &self.limits).map_err(|e| run.failed(e))?;

        let request = CompletionRequest::new(Self::NAME, self.user_prompt(content))
            .with_system(self.system_prompt());
        let completion = self
            .llm
            .complete(ctx, &request)
            .await
            .map_err(|e| run.failed(e))?;

        let summary = self
            .finalize(self.parser.clean_summary(&completion.text))
            .map_err(|e| run.failed(e))?;

        tracing::info!(
            agent = Self::NAME,
            correlation_id = %ctx.correlation_id(),
            summary_length = summary.chars().count(),
            "Summary generated"
        );
        run.completed(1);
        Ok(summary)
    }
}

fn invalid(reason: &str) -> AgentError {
    AgentError::InvalidOutput {
        agent: Summarizer::NAME.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::test_support::{assert_transcript_cut_at, oversized_transcript, TAIL};
    use crate::content::TRUNCATION_MARKER;
    use crate::parser::LabeledTextParser;
    use verity_test_utils::fixtures::sample_transcript;
    use verity_test_utils::{Reply, ScriptedCompletionProvider};

    fn summarizer(provider: ScriptedCompletionProvider) -> (Summarizer, Arc<ScriptedCompletionProvider>) {
        let provider = Arc::new(provider);
        let agent = Summarizer::new(
            provider.clone(),
            Arc::new(LabeledTextParser::new()),
            AgentLimits::default(),
        );
        (agent, provider)
    }

    #[tokio::test]
    async fn test_run_cleans_model_output() {
        let (agent, provider) = summarizer(
            ScriptedCompletionProvider::new()
                .then(Reply::text("Summary: nasa plans a Mars launch in 2026 and   reviews Apollo history")),
        );
        let summary = agent.run(&RequestContext::new(), &sample_transcript()).await.unwrap();
        assert_eq!(summary, "Nasa plans a Mars launch in 2026 and reviews Apollo history.");

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].prompt.ends_with("SUMMARY:"));
        assert!(calls[0].system.as_deref().unwrap_or_default().contains("150 characters"));
    }

    #[tokio::test]
    async fn test_oversized_transcript_is_cut_at_summarizer_limit() {
        let (agent, provider) = summarizer(
            ScriptedCompletionProvider::new()
                .then(Reply::text("Hosts walk through a long list of Greek letters.")),
        );
        let limit = AgentLimits::default().summarizer_input_chars;
        agent
            .run(&RequestContext::new(), &oversized_transcript(limit + 500))
            .await
            .unwrap();

        assert_transcript_cut_at(&provider.calls()[0].prompt, limit);
    }

    #[tokio::test]
    async fn test_transcript_under_summarizer_limit_is_sent_whole() {
        let (agent, provider) = summarizer(
            ScriptedCompletionProvider::new()
                .then(Reply::text("Hosts walk through a long list of Greek letters.")),
        );
        // Over the takeaway and claim limits, under the summarizer's.
        let content = oversized_transcript(AgentLimits::default().takeaway_input_chars + 1_000);
        agent.run(&RequestContext::new(), &content).await.unwrap();

        let prompt = &provider.calls()[0].prompt;
        assert!(prompt.contains(TAIL));
        assert!(!prompt.contains(TRUNCATION_MARKER));
    }

    #[tokio::test]
    async fn test_run_rejects_short_content_without_calling_model() {
        let (agent, provider) = summarizer(ScriptedCompletionProvider::new());
        let result = agent.run(&RequestContext::new(), "too short").await;
        assert!(matches!(
            result,
            Err(verity_core::VerityError::Agent(AgentError::ContentTooShort { .. }))
        ));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_propagates_provider_error() {
        let (agent, _) = summarizer(ScriptedCompletionProvider::new().then(Reply::api_error("bad request")));
        let result = agent.run(&RequestContext::new(), &sample_transcript()).await;
        assert!(matches!(result, Err(verity_core::VerityError::Llm(_))));
    }

    #[test]
    fn test_finalize_truncates_at_word_boundary() {
        let (agent, _) = summarizer(ScriptedCompletionProvider::new());
        let long = format!("{}.", "word ".repeat(40).trim_end());
        let summary = agent.finalize(long).unwrap();
        assert!(summary.ends_with("..."));
        assert!(summary.chars().count() <= 153);
        assert!(!summary.contains("wor..."));
    }

    #[test]
    fn test_finalize_rejects_short_summary() {
        let (agent, _) = summarizer(ScriptedCompletionProvider::new());
        assert_eq!(
            agent.finalize("Too brief.".to_string()),
            Err(AgentError::InvalidOutput {
                agent: "summarizer".to_string(),
                reason: "summary too short to be meaningful".to_string(),
            })
        );
        assert!(agent.finalize(String::new()).is_err());
    }
}
