//! Search results as seen by the fact checker

use serde::{Deserialize, Serialize};

/// Snippets passed to the verdict prompt.
pub const ANALYSIS_RESULT_LIMIT: usize = 3;

/// Words kept when turning a claim into a search query.
pub const MAX_QUERY_WORDS: usize = 10;

/// One (title, snippet, url) triple from a search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSnippet {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

impl SearchSnippet {
    pub fn new(title: impl Into<String>, snippet: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
        }
    }
}

/// Everything gathered for one claim: ordered snippets plus every source URL
/// seen in the response, in first-seen order without duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    pub query: String,
    pub snippets: Vec<SearchSnippet>,
    pub sources: Vec<String>,
}

impl SearchContext {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn push_snippet(&mut self, snippet: SearchSnippet) {
        self.snippets.push(snippet);
    }

    /// Record a source URL. Blank and repeated URLs are ignored.
    pub fn add_source(&mut self, url: &str) {
        let url = url.trim();
        if url.is_empty() || self.sources.iter().any(|s| s == url) {
            return;
        }
        self.sources.push(url.to_string());
    }

    pub fn has_source(&self, url: &str) -> bool {
        self.sources.iter().any(|s| s == url)
    }

    /// True when no snippet was extracted.
    pub fn is_empty(&self) -> bool {
        self.snippets.is_empty()
    }

    pub fn top(&self, n: usize) -> &[SearchSnippet] {
        &self.snippets[..self.snippets.len().min(n)]
    }

    /// Render the top snippets for the verdict prompt.
    pub fn format_for_analysis(&self) -> String {
        if self.snippets.is_empty() {
            return "No search results found.".to_string();
        }
        self.top(ANALYSIS_RESULT_LIMIT)
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let mut entry = format!("Result {}:\nTitle: {}\nSnippet: {}", i + 1, s.title, s.snippet);
                if !s.url.is_empty() {
                    entry.push_str("\nSource: ");
                    entry.push_str(&s.url);
                }
                entry
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// First `n` gathered sources, used when the model cites none of them.
    pub fn fallback_sources(&self, n: usize) -> Vec<String> {
        self.sources.iter().take(n).cloned().collect()
    }
}

/// Turn a claim into a search query: trimmed, quotes removed, at most
/// [`MAX_QUERY_WORDS`] words.
pub fn build_search_query(claim: &str) -> String {
    claim
        .trim()
        .replace('"', "")
        .split_whitespace()
        .take(MAX_QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Queries never exceed the word cap and never contain quotes.
        #[test]
        fn prop_query_bounded(claim in ".{0,300}") {
            let query = build_search_query(&claim);
            prop_assert!(query.split_whitespace().count() <= MAX_QUERY_WORDS);
            prop_assert!(!query.contains('"'));
        }
    }
}
