//! Takeaway extractor agent

use crate::content::{truncate_content, truncate_for_log, validate_content, AgentRun};
use crate::parser::ResponseParser;
use std::sync::Arc;
use verity_core::{AgentError, AgentLimits, RequestContext, VerityResult};
use verity_llm::{CompletionProvider, CompletionRequest};

const SYSTEM_PROMPT: &str = "You are an expert at identifying key insights and actionable takeaways from podcast discussions.

Your task is to extract the most important, valuable, and memorable points that:
- Represent key insights or learnings shared during the discussion
- Are actionable or applicable to the audience
- Capture important facts, statistics, or expert opinions
- Highlight notable quotes or profound statements
- Include practical advice or recommendations mentioned
- Cover significant predictions or future outlook discussed

Focus on substantive content that would be valuable for someone to remember or act upon. Avoid:
- Basic introductory statements
- Small talk or casual conversation
- Obvious or common knowledge points
- Repetitive information

Return your response as a simple numbered list, with each takeaway as a complete, clear sentence.";

/// Extracts a list of key takeaways, using the summary as context.
pub struct TakeawayExtractor {
    llm: Arc<dyn CompletionProvider>,
    parser: Arc<dyn ResponseParser>,
    limits: AgentLimits,
}

impl TakeawayExtractor {
    pub const NAME: &'static str = "takeaway_extractor";

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

    fn user_prompt(&self, content: &str, summary: Option<&str>) -> String {
        let mut prompt = String::from(
            "Analyze the following podcast transcript and extract the key takeaways and insights.\n\n\
             Focus on identifying:\n\
             - Important facts, statistics, or expert insights\n\
             - Actionable advice or recommendations\n\
             - Significant predictions or future outlook\n\
             - Notable quotes or profound statements\n\
             - Key lessons learned or wisdom shared\n\
             - Practical tips mentioned\n\n",
        );
        if let Some(summary) = summary.filter(|s| !s.trim().is_empty()) {
            prompt.push_str("CONTEXT SUMMARY:\n");
            prompt.push_str(summary);
            prompt.push_str("\n\n");
        }
        prompt.push_str("TRANSCRIPT:\n");
        prompt.push_str(&truncate_content(content, self.limits.takeaway_input_chars));
        prompt.push_str(
            "\n\nPlease extract 4-8 key takeaways from this podcast. Format your response as a simple numbered list:\n\
             1. [First key takeaway]\n\
             2. [Second key takeaway]\n\
             3. [Third key takeaway]\n\
             etc.\n\n\
             KEY TAKEAWAYS:",
        );
        prompt
    }

    /// Extract takeaways from `content`, optionally guided by `summary`.
    pub async fn run(
        &self,
        ctx: &RequestContext,
        content: &str,
        summary: Option<&str>,
    ) -> VerityResult<Vec<String>> {
        let run = AgentRun::start(Self::NAME, ctx, content);
        validate_content(content, &self.limits).map_err(|e| run.failed(e))?;

        let request = CompletionRequest::new(Self::NAME, self.user_prompt(content, summary))
            .with_system(SYSTEM_PROMPT);
        let completion = self
            .llm
            .complete(ctx, &request)
            .await
            .map_err(|e| run.failed(e))?;

        let mut takeaways = self.parser.parse_takeaways(&completion.text);
        if takeaways.len() > self.limits.max_takeaways {
            tracing::warn!(
                agent = Self::NAME,
                correlation_id = %ctx.correlation_id(),
                original_count = takeaways.len(),
                truncated_count = self.limits.max_takeaways,
                "Truncated takeaways list to maximum count"
            );
            takeaways.truncate(self.limits.max_takeaways);
        }

        if takeaways.is_empty() {
            return Err(run.failed(AgentError::InvalidOutput {
                agent: Self::NAME.to_string(),
                reason: "no takeaways extracted".to_string(),
            }));
        }

        for (i, takeaway) in takeaways.iter().enumerate() {
            tracing::debug!(
                agent = Self::NAME,
                correlation_id = %ctx.correlation_id(),
                takeaway_num = i + 1,
                takeaway = %truncate_for_log(takeaway, 100),
                "Extracted takeaway"
            );
        }
        run.completed(takeaways.len());
        Ok(takeaways)
    }
}
