//! Provider registry: static specs for the supported LLM vendors.
//!
//! Each `ProviderSpec` describes how to reach a vendor: keywords for model
//! matching, env var name, API base and wire format.

use std::collections::HashMap;

// ─────────────────────────────────────────────
// ProviderSpec: static metadata for one provider
// ─────────────────────────────────────────────

/// Wire format spoken by a provider's endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStyle {
    /// `POST {base}/chat/completions` with bearer auth.
    OpenAi,
    /// `POST {base}/v1/messages` with `x-api-key`.
    Anthropic,
}

/// Static specification describing one LLM provider.
#[derive(Clone, Debug)]
pub struct ProviderSpec {
    /// Internal name (e.g. `"openrouter"`), also the config key.
    pub name: &'static str,
    /// Keywords to match in model names (lowercase). E.g. `&["claude", "anthropic"]`.
    pub keywords: &'static [&'static str],
    /// Environment variable for the API key. E.g. `"OPENROUTER_API_KEY"`.
    pub env_key: &'static str,
    /// Human-readable name for logs.
    pub display_name: &'static str,
    pub api_style: ApiStyle,
    /// Gateways are used as fallback when no direct match is configured.
    pub is_gateway: bool,
    /// If the API key starts with this prefix, auto-detect this provider.
    pub detect_by_key_prefix: Option<&'static str>,
    pub default_api_base: &'static str,
}

/// Supported providers, in matching priority order.
pub static PROVIDERS: &[ProviderSpec] = &[
    // Gateway, matched by key prefix "sk-or-"
    ProviderSpec {
        name: "openrouter",
        keywords: &["openrouter"],
        env_key: "OPENROUTER_API_KEY",
        display_name: "OpenRouter",
        api_style: ApiStyle::OpenAi,
        is_gateway: true,
        detect_by_key_prefix: Some("sk-or-"),
        default_api_base: "https://openrouter.ai/api/v1",
    },
    ProviderSpec {
        name: "anthropic",
        keywords: &["anthropic", "claude"],
        env_key: "ANTHROPIC_API_KEY",
        display_name: "Anthropic",
        api_style: ApiStyle::Anthropic,
        is_gateway: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.anthropic.com",
    },
    ProviderSpec {
        name: "openai",
        keywords: &["openai", "gpt"],
        env_key: "OPENAI_API_KEY",
        display_name: "OpenAI",
        api_style: ApiStyle::OpenAi,
        is_gateway: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.openai.com/v1",
    },
    ProviderSpec {
        name: "deepseek",
        keywords: &["deepseek"],
        env_key: "DEEPSEEK_API_KEY",
        display_name: "DeepSeek",
        api_style: ApiStyle::OpenAi,
        is_gateway: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.deepseek.com/v1",
    },
    ProviderSpec {
        name: "groq",
        keywords: &["groq", "llama", "mixtral"],
        env_key: "GROQ_API_KEY",
        display_name: "Groq",
        api_style: ApiStyle::OpenAi,
        is_gateway: false,
        detect_by_key_prefix: None,
        default_api_base: "https://api.groq.com/openai/v1",
    },
];

// ─────────────────────────────────────────────
// Matching functions
// ─────────────────────────────────────────────

/// Find a provider spec by matching keywords against a model name.
///
/// Skips gateways, which are fallback only.
pub fn find_by_model(model: &str) -> Option<&'static ProviderSpec> {
    let model_lower = model.to_lowercase();
    PROVIDERS.iter().find(|spec| {
        !spec.is_gateway && spec.keywords.iter().any(|kw| model_lower.contains(kw))
    })
}

/// Find a provider spec by exact name.
pub fn find_by_name(name: &str) -> Option<&'static ProviderSpec> {
    PROVIDERS.iter().find(|spec| spec.name == name)
}

/// Try to auto-detect a gateway from its name or key prefix.
pub fn find_gateway(
    provider_name: Option<&str>,
    api_key: Option<&str>,
) -> Option<&'static ProviderSpec> {
    if let Some(name) = provider_name {
        if let Some(spec) = PROVIDERS.iter().find(|s| s.name == name && s.is_gateway) {
            return Some(spec);
        }
    }

    let key = api_key?;
    PROVIDERS
        .iter()
        .find(|s| s.detect_by_key_prefix.is_some_and(|pfx| key.starts_with(pfx)))
}

/// Resolve the model name sent on the wire.
///
/// Gateways route by `vendor/model`, so a bare `claude-3-haiku` becomes
/// `anthropic/claude-3-haiku` there. Direct providers get the name unchanged.
pub fn resolve_model_name(model: &str, spec: &ProviderSpec) -> String {
    if !spec.is_gateway || model.contains('/') {
        return model.to_string();
    }
    match find_by_model(model) {
        Some(vendor) => format!("{}/{}", vendor.name, model),
        None => model.to_string(),
    }
}

/// Re-export the provider config from core, the single source of truth.
pub use mailsort_core::config::schema::ProviderConfig;

/// Match a model name to a configured provider.
///
/// 1. Find by keyword match, only if that provider has an API key.
/// 2. A configured key with a gateway prefix (e.g. `sk-or-` under `openai`) wins next.
/// 3. Fallback to the first configured gateway.
pub fn match_provider<'a>(
    model: &str,
    providers: &'a HashMap<String, ProviderConfig>,
) -> Option<(&'a ProviderConfig, &'static ProviderSpec)> {
    if let Some(spec) = find_by_model(model) {
        if let Some(config) = providers.get(spec.name).filter(|c| c.is_configured()) {
            if let Some(gateway) = find_gateway(None, Some(&config.api_key)) {
                return Some((config, gateway));
            }
            return Some((config, spec));
        }
    }

    PROVIDERS
        .iter()
        .filter(|s| s.is_gateway)
        .find_map(|spec| {
            providers
                .get(spec.name)
                .filter(|c| c.is_configured())
                .map(|c| (c, spec))
        })
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
