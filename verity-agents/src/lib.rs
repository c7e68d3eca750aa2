//! Verity Agents - Transcript Analysis Stages
//!
//! Provides the analysis agents and the pipeline that runs them:
//! - Content validation and prompt truncation
//! - Response parsing for list and labeled-field replies
//! - Summarizer (fatal stage)
//! - Takeaway extractor and fact checker (non-fatal stages)
//! - Sequential pipeline orchestration

pub mod content;
pub mod fact_checker;
pub mod parser;
pub mod pipeline;
pub mod summarizer;
pub mod takeaways;

pub use content::{truncate_content, truncate_for_log, validate_content, TRUNCATION_MARKER};
pub use fact_checker::{
    ClaimPacer, ClaimVerificationError, FactCheckReport, FactChecker, FixedDelayPacer,
    NO_SEARCH_RESULTS,
};
pub use parser::{
    ConfidenceSource, LabeledTextParser, ParsedVerification, ResponseParser, DEFAULT_CONFIDENCE,
    NO_EVIDENCE,
};
pub use pipeline::{AnalysisPipeline, PipelineBuilder};
pub use summarizer::Summarizer;
pub use takeaways::TakeawayExtractor;
