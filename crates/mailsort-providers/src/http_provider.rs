//! Generic HTTP-based LLM provider for OpenAI-compatible APIs.
//!
//! Talks directly to any `/chat/completions` endpoint: OpenAI, DeepSeek,
//! Groq, and OpenRouter (which also fronts Anthropic models).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use mailsort_core::types::{LlmResponse, Message, UsageInfo};

use crate::anthropic::AnthropicProvider;
use crate::registry::{resolve_model_name, ApiStyle, ProviderConfig, ProviderSpec};
use crate::traits::{LlmProvider, LlmRequestConfig};

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: String,
    messages: &'a [Message],
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<UsageInfo>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl From<ChatCompletionResponse> for LlmResponse {
    fn from(resp: ChatCompletionResponse) -> Self {
        let Some(choice) = resp.choices.into_iter().next() else {
            return LlmResponse::error("Error parsing LLM response: no choices returned");
        };
        LlmResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: resp.usage,
        }
    }
}

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A generic LLM provider that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    default_model: String,
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .field("provider", &self.spec.display_name)
            .finish()
    }
}

/// Build the shared request client. Falls back to reqwest defaults if the
/// builder rejects the settings.
pub(crate) fn build_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// Convert configured extra headers, skipping invalid ones.
pub(crate) fn header_map(headers: Option<&HashMap<String, String>>) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (key, value) in headers.into_iter().flatten() {
        match (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(val)) => {
                map.insert(name, val);
            }
            _ => warn!(header = %key, "invalid extra header, skipping"),
        }
    }
    map
}

impl HttpProvider {
    /// Create a new HttpProvider from a provider config and spec.
    pub fn new(config: &ProviderConfig, spec: &'static ProviderSpec, model: &str) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        HttpProvider {
            client: build_client(),
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers: header_map(config.extra_headers.as_ref()),
            spec,
        }
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

impl HttpProvider {
    /// One completions round trip. `Err` carries the text placed in the
    /// error response.
    async fn complete(
        &self,
        messages: &[Message],
        model: String,
        config: &LlmRequestConfig,
    ) -> Result<LlmResponse, String> {
        let body = ChatCompletionRequest {
            model,
            messages,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        };

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .headers(self.extra_headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("Error calling LLM: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(format!("Error calling LLM: {status}: {detail}"));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| format!("Error parsing LLM response: {e}"))?;
        Ok(parsed.into())
    }
}

#[async_trait]
impl LlmProvider for HttpProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> LlmResponse {
        let wire_model = resolve_model_name(model, self.spec);
        debug!(
            provider = self.spec.display_name,
            model = %wire_model,
            messages = messages.len(),
            "chat completion request"
        );

        match self.complete(messages, wire_model, config).await {
            Ok(resp) => {
                debug!(
                    provider = self.spec.display_name,
                    finish_reason = resp.finish_reason.as_deref().unwrap_or("-"),
                    "chat completion done"
                );
                resp
            }
            Err(message) => {
                error!(provider = self.spec.display_name, error = %message, "chat completion failed");
                LlmResponse::error(message)
            }
        }
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn display_name(&self) -> &str {
        self.spec.display_name
    }
}

// ─────────────────────────────────────────────
// Builder (convenience)
// ─────────────────────────────────────────────

/// Build a provider from a model name and a map of provider configs.
///
/// Matches the model to a configured vendor, then picks the client for
/// that vendor's wire format.
pub fn create_provider(
    model: &str,
    providers: &HashMap<String, ProviderConfig>,
) -> Result<Arc<dyn LlmProvider>, String> {
    let (config, spec) = crate::registry::match_provider(model, providers).ok_or_else(|| {
        format!(
            "No configured provider found for model '{}'. \
             Set the appropriate API key (e.g. ANTHROPIC_API_KEY, OPENROUTER_API_KEY).",
            model
        )
    })?;

    debug!(
        provider = spec.display_name,
        model = model,
        api_base = config.api_base.as_deref().unwrap_or(spec.default_api_base),
        "Creating LLM provider"
    );

    let provider: Arc<dyn LlmProvider> = match spec.api_style {
        ApiStyle::OpenAi => Arc::new(HttpProvider::new(config, spec, model)),
        ApiStyle::Anthropic => Arc::new(AnthropicProvider::new(config, spec, model)),
    };
    Ok(provider)
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
