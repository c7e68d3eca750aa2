//! Anthropic (Claude) Messages API provider

pub mod client;
pub mod types;

pub use client::{AnthropicClient, PROVIDER_NAME, WEB_SEARCH_BETA};
