//! Anthropic Messages API client.
//!
//! `POST {base}/v1/messages` with `x-api-key` and a pinned
//! `anthropic-version`. System messages are lifted into the top-level
//! `system` field.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use mailsort_core::types::{LlmResponse, Message, UsageInfo};

use crate::http_provider::{build_client, header_map};
use crate::registry::{ProviderConfig, ProviderSpec};
use crate::traits::{LlmProvider, LlmRequestConfig};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<&'a Message>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

impl From<MessagesResponse> for LlmResponse {
    fn from(resp: MessagesResponse) -> Self {
        let text = resp
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text);
        let Some(text) = text else {
            return LlmResponse::error("Error parsing LLM response: no text content");
        };
        LlmResponse {
            content: Some(text),
            finish_reason: resp.stop_reason,
            usage: resp.usage.map(|u| UsageInfo {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens + u.output_tokens,
            }),
        }
    }
}

/// Provider for Anthropic's native API.
pub struct AnthropicProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    default_model: String,
    extra_headers: HeaderMap,
    spec: &'static ProviderSpec,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("api_base", &self.api_base)
            .field("default_model", &self.default_model)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig, spec: &'static ProviderSpec, model: &str) -> Self {
        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| spec.default_api_base.to_string());

        Self {
            client: build_client(),
            api_base,
            api_key: config.api_key.clone(),
            default_model: model.to_string(),
            extra_headers: header_map(config.extra_headers.as_ref()),
            spec,
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }
}

/// Join system messages into one prompt; keep the rest as turns.
fn split_system(messages: &[Message]) -> (Option<String>, Vec<&Message>) {
    let system: Vec<&str> = messages
        .iter()
        .filter(|m| m.is_system())
        .map(Message::content)
        .collect();
    let turns = messages.iter().filter(|m| !m.is_system()).collect();
    let system = if system.is_empty() {
        None
    } else {
        Some(system.join("\n\n"))
    };
    (system, turns)
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        config: &LlmRequestConfig,
    ) -> LlmResponse {
        let (system, turns) = split_system(messages);
        let request_body = MessagesRequest {
            model,
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system,
            messages: turns,
        };

        debug!(provider = self.spec.display_name, model, "Calling LLM");

        let result = self
            .client
            .post(self.messages_url())
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .headers(self.extra_headers.clone())
            .json(&request_body)
            .send()
            .await;

        let response = match result {
            Ok(resp) => resp,
            Err(e) => {
                error!(provider = self.spec.display_name, error = %e, "HTTP request failed");
                return LlmResponse::error(format!("Error calling LLM: {}", e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(
                provider = self.spec.display_name,
                status = %status,
                body = %error_text,
                "API error"
            );
            return LlmResponse::error(format!("Error calling LLM: {}: {}", status, error_text));
        }

        match response.json::<MessagesResponse>().await {
            Ok(resp) => resp.into(),
            Err(e) => {
                error!(provider = self.spec.display_name, error = %e, "Failed to parse LLM response");
                LlmResponse::error(format!("Error parsing LLM response: {}", e))
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
