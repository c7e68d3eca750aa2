//! Input validation, truncation, and agent run logging shared by all agents

use std::borrow::Cow;
use std::time::Instant;
use verity_core::{AgentError, AgentLimits, RequestContext, VerityError};

/// Marker appended to truncated transcript input.
pub const TRUNCATION_MARKER: &str = "\n[...content truncated...]";

/// How far back (in characters) truncation may move to reach a word boundary.
const WORD_BOUNDARY_WINDOW: usize = 100;

/// Reject content that is blank, too short, or too long to analyse.
///
/// Lengths are counted in characters after trimming.
pub fn validate_content(content: &str, limits: &AgentLimits) -> Result<(), AgentError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AgentError::EmptyContent);
    }
    let length = trimmed.chars().count();
    if length < limits.min_content_chars {
        return Err(AgentError::ContentTooShort {
            length,
            min: limits.min_content_chars,
        });
    }
    if length > limits.max_content_chars {
        return Err(AgentError::ContentTooLong {
            length,
            max: limits.max_content_chars,
        });
    }
    Ok(())
}

/// Byte offset of the `n`th character, or `None` if `text` is shorter.
fn char_boundary(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(idx, _)| idx)
}

/// Cut `content` to at most `max_chars` characters for a prompt.
///
/// The cut backs up to the last space when that space lies within the final
/// 100 characters, then [`TRUNCATION_MARKER`] is appended. Content that fits
/// is returned unchanged.
pub fn truncate_content(content: &str, max_chars: usize) -> Cow<'_, str> {
    let Some(cut) = char_boundary(content, max_chars) else {
        return Cow::Borrowed(content);
    };
    let mut truncated = &content[..cut];
    if let Some(space) = truncated.rfind(' ') {
        let space_chars = truncated[..space].chars().count();
        if space_chars > max_chars.saturating_sub(WORD_BOUNDARY_WINDOW) {
            truncated = &truncated[..space];
        }
    }
    Cow::Owned(format!("{}{}", truncated, TRUNCATION_MARKER))
}

/// Shorten text for a log field, appending `...` when cut.
pub fn truncate_for_log(text: &str, max_chars: usize) -> Cow<'_, str> {
    match char_boundary(text, max_chars) {
        Some(cut) => Cow::Owned(format!("{}...", &text[..cut])),
        None => Cow::Borrowed(text),
    }
}

/// Uppercase the first character.
pub(crate) fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Append a period unless the text already ends a sentence.
pub(crate) fn ensure_terminal_punctuation(mut text: String) -> String {
    if !text.is_empty() && !text.ends_with(['.', '!', '?']) {
        text.push('.');
    }
    text
}

// ============================================================================
// RUN LOGGING
// ============================================================================

/// Start/finish logging for one agent invocation.
pub(crate) struct AgentRun<'a> {
    agent: &'static str,
    ctx: &'a RequestContext,
    started: Instant,
}

impl<'a> AgentRun<'a> {
    pub(crate) fn start(agent: &'static str, ctx: &'a RequestContext, content: &str) -> Self {
        tracing::info!(
            agent,
            correlation_id = %ctx.correlation_id(),
            content_length = content.len(),
            word_count = content.split_whitespace().count(),
            "Agent started"
        );
        Self {
            agent,
            ctx,
            started: Instant::now(),
        }
    }

    pub(crate) fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    pub(crate) fn completed(&self, items: usize) {
        tracing::info!(
            agent = self.agent,
            correlation_id = %self.ctx.correlation_id(),
            duration_ms = self.elapsed_ms(),
            items,
            "Agent completed"
        );
    }

    /// Log the failure and hand the error back.
    pub(crate) fn failed(&self, error: impl Into<VerityError>) -> VerityError {
        let error = error.into();
        tracing::error!(
            agent = self.agent,
            correlation_id = %self.ctx.correlation_id(),
            duration_ms = self.elapsed_ms(),
            error = %error,
            "Agent failed"
        );
        error
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Truncated output never keeps more than `max` characters of the
        /// original and always ends with the marker.
        #[test]
        fn prop_truncate_content_bounded(content in "\\PC{0,400}", max in 1usize..300) {
            let truncated = truncate_content(&content, max);
            if content.chars().count() <= max {
                prop_assert_eq!(truncated.as_ref(), content.as_str());
            } else {
                prop_assert!(truncated.ends_with(TRUNCATION_MARKER));
                let kept = truncated.chars().count() - TRUNCATION_MARKER.chars().count();
                prop_assert!(kept <= max);
                prop_assert!(content.starts_with(&truncated[..truncated.len() - TRUNCATION_MARKER.len()]));
            }
        }
    }
}
