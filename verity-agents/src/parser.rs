//! Structured-text parsing of model replies
//!
//! Every agent turns free-form model output into typed values through the
//! [`ResponseParser`] trait. [`LabeledTextParser`] understands the list and
//! `LABEL: value` formats the prompts ask for, and never fails: anything it
//! cannot read falls back to a documented default.

use crate::content::{capitalize_first, ensure_terminal_punctuation};
use once_cell::sync::Lazy;
use regex::Regex;
use verity_core::{clamp_confidence, FactCheck, Verdict};

/// Confidence used when the reply has no usable CONFIDENCE field.
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Evidence used when the reply has no EVIDENCE field.
pub const NO_EVIDENCE: &str = "No evidence provided";

/// Sources kept when the reply cites none of the search results.
pub const FALLBACK_SOURCE_COUNT: usize = 2;

/// Fewer words than this and a claim line is treated as noise.
pub const MIN_CLAIM_WORDS: usize = 4;

/// Fewer words than this and a takeaway line is treated as noise.
pub const MIN_TAKEAWAY_WORDS: usize = 3;

/// Boilerplate openers stripped from summaries; only the first match is removed.
const SUMMARY_PREFIXES: [&str; 6] = [
    "Summary:",
    "SUMMARY:",
    "Podcast Summary:",
    "This podcast discusses",
    "In this podcast",
    "The podcast covers",
];

/// Lines containing these (case-insensitive) are headers, not takeaways.
const TAKEAWAY_SKIP_PHRASES: [&str; 5] = [
    "key takeaways",
    "takeaways:",
    "summary:",
    "in conclusion",
    "to summarize",
];

static LIST_MARKERS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [r"^\d+\.\s*", r"^\d+\)\s*", r"^-\s*", r"^•\s*", r"^\*\s*"]
        .iter()
        .filter_map(|pattern| Regex::new(pattern).ok())
        .collect()
});

static WHITESPACE_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\s+").ok());

static VERDICT_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"(?i)VERDICT:[\s\[\*"']*([a-z]+(?:[ _-]true)?)"#).ok());

static CONFIDENCE_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)CONFIDENCE:[ \t\*]*(\S*)").ok());

static NUMBER_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[\d.]+").ok());

static EVIDENCE_UNTIL_SOURCES_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)EVIDENCE:\s*(.*?)\s*SOURCES:").ok());

static EVIDENCE_TO_END_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?is)EVIDENCE:\s*(.*)$").ok());

static SOURCES_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?is)SOURCES:\s*(.*)$").ok());

static URL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"https?://[^\s\],]+").ok());

fn capture<'t>(re: &Lazy<Option<Regex>>, text: &'t str) -> Option<&'t str> {
    re.as_ref()?.captures(text)?.get(1).map(|m| m.as_str())
}

// ============================================================================
// PARSED TYPES
// ============================================================================

/// Where a verification's confidence value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceSource {
    /// Read from the reply (then clamped)
    Parsed,
    /// No CONFIDENCE field; default used
    Missing,
    /// CONFIDENCE field present but not a number; default used
    Unparsable,
}

/// A verdict reply broken into its four fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedVerification {
    pub verdict: Verdict,
    pub confidence: f64,
    pub confidence_source: ConfidenceSource,
    pub evidence: String,
    pub sources: Vec<String>,
    /// True when `sources` came from the fallback rather than the reply
    pub sources_fallback: bool,
}

impl ParsedVerification {
    pub fn into_fact_check(self, claim: impl Into<String>) -> FactCheck {
        FactCheck::new(claim, self.verdict, self.confidence, self.evidence, self.sources)
    }
}

// ============================================================================
// PARSER TRAIT
// ============================================================================

/// Turns model replies into typed agent output.
pub trait ResponseParser: Send + Sync {
    /// Claims in reply order, at most `max_claims`, each at least
    /// [`MIN_CLAIM_WORDS`] words.
    fn parse_claims(&self, raw: &str, max_claims: usize) -> Vec<String>;

    /// Every takeaway line found, cleaned. Callers apply their own cap.
    fn parse_takeaways(&self, raw: &str) -> Vec<String>;

    /// Summary text with boilerplate removed and whitespace normalized.
    fn clean_summary(&self, raw: &str) -> String;

    /// Verdict fields, with cited sources restricted to `available_sources`.
    fn parse_verification(&self, raw: &str, available_sources: &[String]) -> ParsedVerification;
}

/// Parser for numbered/bulleted lists and `LABEL: value` replies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LabeledTextParser;

impl LabeledTextParser {
    pub fn new() -> Self {
        Self
    }

    /// Strip list markers (`1.`, `1)`, `-`, `•`, `*`) in sequence.
    pub fn strip_list_markers(line: &str) -> String {
        LIST_MARKERS
            .iter()
            .fold(line.to_string(), |acc, re| re.replace(&acc, "").into_owned())
    }

    fn list_items(raw: &str) -> impl Iterator<Item = String> + '_ {
        raw.trim()
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(Self::strip_list_markers)
    }

    fn parse_verdict(raw: &str) -> Verdict {
        capture(&VERDICT_RE, raw)
            .map(|v| v.to_lowercase().replace([' ', '-'], "_"))
            .and_then(|v| Verdict::from_db_str(&v).ok())
            .unwrap_or(Verdict::Unverifiable)
    }

    fn parse_confidence(raw: &str) -> (f64, ConfidenceSource) {
        let Some(token) = capture(&CONFIDENCE_RE, raw) else {
            return (DEFAULT_CONFIDENCE, ConfidenceSource::Missing);
        };
        let number = NUMBER_RE
            .as_ref()
            .and_then(|re| re.find(token))
            .and_then(|m| m.as_str().parse::<f64>().ok());
        match number {
            Some(value) => (clamp_confidence(value), ConfidenceSource::Parsed),
            None => (DEFAULT_CONFIDENCE, ConfidenceSource::Unparsable),
        }
    }

    fn parse_evidence(raw: &str) -> String {
        capture(&EVIDENCE_UNTIL_SOURCES_RE, raw)
            .or_else(|| capture(&EVIDENCE_TO_END_RE, raw))
            .map(|e| e.trim_matches(|c: char| c == '*' || c.is_whitespace()))
            .filter(|e| !e.is_empty())
            .unwrap_or(NO_EVIDENCE)
            .to_string()
    }

    /// URLs cited after SOURCES that exactly match an available source.
    fn cited_sources(raw: &str, available: &[String]) -> Vec<String> {
        let Some(section) = capture(&SOURCES_RE, raw) else {
            return Vec::new();
        };
        let Some(url_re) = URL_RE.as_ref() else {
            return Vec::new();
        };
        let mut cited: Vec<String> = Vec::new();
        for found in url_re.find_iter(section) {
            let url = found.as_str().trim_end_matches(['.', ')', '>', ';']);
            if available.iter().any(|a| a == url) && !cited.iter().any(|c| c == url) {
                cited.push(url.to_string());
            }
        }
        cited
    }
}

impl ResponseParser for LabeledTextParser {
    fn parse_claims(&self, raw: &str, max_claims: usize) -> Vec<String> {
        Self::list_items(raw)
            .filter(|line| line.split_whitespace().count() >= MIN_CLAIM_WORDS)
            .take(max_claims)
            .collect()
    }

    fn parse_takeaways(&self, raw: &str) -> Vec<String> {
        Self::list_items(raw)
            .filter(|line| {
                let lower = line.to_lowercase();
                line.split_whitespace().count() >= MIN_TAKEAWAY_WORDS
                    && !TAKEAWAY_SKIP_PHRASES.iter().any(|p| lower.contains(p))
            })
            .map(|line| capitalize_first(&ensure_terminal_punctuation(line.trim().to_string())))
            .collect()
    }

    fn clean_summary(&self, raw: &str) -> String {
        let mut summary = raw.trim();
        if let Some(rest) = SUMMARY_PREFIXES
            .iter()
            .find_map(|prefix| summary.strip_prefix(prefix))
        {
            summary = rest.trim();
        }
        let capitalized = capitalize_first(summary);
        let collapsed = match WHITESPACE_RE.as_ref() {
            Some(re) => re.replace_all(&capitalized, " ").into_owned(),
            None => capitalized.split_whitespace().collect::<Vec<_>>().join(" "),
        };
        ensure_terminal_punctuation(collapsed)
    }

    fn parse_verification(&self, raw: &str, available_sources: &[String]) -> ParsedVerification {
        let (confidence, confidence_source) = Self::parse_confidence(raw);
        let cited = Self::cited_sources(raw, available_sources);
        let sources_fallback = cited.is_empty();
        let sources = if sources_fallback {
            available_sources
                .iter()
                .take(FALLBACK_SOURCE_COUNT)
                .cloned()
                .collect()
        } else {
            cited
        };

        ParsedVerification {
            verdict: Self::parse_verdict(raw),
            confidence,
            confidence_source,
            evidence: Self::parse_evidence(raw),
            sources,
            sources_fallback,
        }
    }
}
