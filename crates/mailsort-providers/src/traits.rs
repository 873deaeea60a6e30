//! LLM Provider trait: the abstraction every chat backend implements.
//!
//! `HttpProvider` covers OpenAI-compatible APIs, `AnthropicProvider` covers
//! the Anthropic Messages API.

use async_trait::async_trait;
use mailsort_core::config::schema::LlmConfig;
use mailsort_core::types::{LlmResponse, Message};

/// Configuration passed to each LLM call.
#[derive(Clone, Debug)]
pub struct LlmRequestConfig {
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature (0.0 – 2.0).
    pub temperature: f64,
}

impl Default for LlmRequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: 300,
            temperature: 0.0,
        }
    }
}

impl From<&LlmConfig> for LlmRequestConfig {
    fn from(config: &LlmConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// Trait that all LLM providers must implement.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat request.
    ///
    /// # Arguments
    /// * `messages`: Conversation; a leading system message is honored.
    /// * `model`   : Model identifier (e.g. `"claude-3-haiku-20240307"`, `"gpt-4o-mini"`).
    /// * `config`  : Temperature, max_tokens.
    ///
    /// # Returns
    /// On API or transport errors, returns `LlmResponse::error(...)` instead of propagating.
    async fn chat(&self, messages: &[Message], model: &str, config: &LlmRequestConfig)
        -> LlmResponse;

    /// The default model for this provider instance.
    fn default_model(&self) -> &str;

    /// Display name for logging.
    fn display_name(&self) -> &str;
}
