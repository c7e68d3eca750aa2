//! Serper API request and response types

use crate::search::{SearchContext, SearchSnippet};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SerperRequest {
    pub q: String,
    pub num: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SerperResponse {
    #[serde(default)]
    pub organic: Vec<OrganicResult>,
    #[serde(rename = "answerBox", default)]
    pub answer_box: Option<AnswerBox>,
    #[serde(rename = "knowledgeGraph", default)]
    pub knowledge_graph: Option<KnowledgeGraph>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OrganicResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnswerBox {
    pub title: String,
    pub link: String,
    pub snippet: String,
    pub answer: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KnowledgeGraph {
    pub title: String,
    pub description: String,
    pub website: String,
}

impl SerperResponse {
    /// Extract snippets in priority order: answer box, knowledge graph, then
    /// organic results.
    pub fn extract_search_context(&self, query: &str) -> SearchContext {
        let mut ctx = SearchContext::new(query);

        if let Some(answer_box) = &self.answer_box {
            let snippet = if answer_box.snippet.is_empty() {
                &answer_box.answer
            } else {
                &answer_box.snippet
            };
            if !snippet.is_empty() {
                ctx.push_snippet(SearchSnippet::new(
                    answer_box.title.clone(),
                    snippet.clone(),
                    answer_box.link.clone(),
                ));
                ctx.add_source(&answer_box.link);
            }
        }

        if let Some(graph) = self.knowledge_graph.as_ref().filter(|g| !g.description.is_empty()) {
            ctx.push_snippet(SearchSnippet::new(
                format!("Knowledge Graph: {}", graph.title),
                graph.description.clone(),
                graph.website.clone(),
            ));
            ctx.add_source(&graph.website);
        }

        for result in &self.organic {
            if !result.snippet.is_empty() {
                ctx.push_snippet(SearchSnippet::new(
                    result.title.clone(),
                    result.snippet.clone(),
                    result.link.clone(),
                ));
            }
            ctx.add_source(&result.link);
        }

        ctx
    }
}
