//! LLM provider layer for mailsort.
//!
//! # Architecture
//!
//! - [`traits::LlmProvider`]: trait that all providers implement
//! - [`registry`]: static specs for the supported vendors + matching logic
//! - [`http_provider::HttpProvider`]: generic OpenAI-compatible HTTP client
//! - [`anthropic::AnthropicProvider`]: Anthropic Messages API client
//! - [`http_provider::create_provider`]: builder from model name + config

pub mod anthropic;
pub mod http_provider;
pub mod registry;
pub mod traits;

// Re-export main types for convenience
pub use anthropic::AnthropicProvider;
pub use http_provider::{create_provider, HttpProvider};
pub use registry::{ApiStyle, ProviderConfig, ProviderSpec, PROVIDERS};
pub use traits::{LlmProvider, LlmRequestConfig};
