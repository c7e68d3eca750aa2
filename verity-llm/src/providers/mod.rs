//! Provider implementations
//!
//! Concrete [`crate::CompletionProvider`] and [`crate::SearchProvider`]
//! implementations. Both send through an [`crate::HttpTransport`] and the
//! shared [`crate::RetryPolicy`].

pub mod anthropic;
pub mod serper;

pub use anthropic::AnthropicClient;
pub use serper::SerperClient;
