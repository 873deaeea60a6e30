//! Configuration schema.
//!
//! Hierarchy: `Config` → `LlmConfig`, `ProvidersConfig`, `MonitoringConfig`,
//! `WebhooksConfig`, `OutlookAppConfig`.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case.
//! We use `#[serde(rename_all = "camelCase")]` to handle the conversion.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::EmailProvider;

// ─────────────────────────────────────────────
// Root Config
// ─────────────────────────────────────────────

/// Root configuration, loaded from `~/.mailsort/config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub email_provider: EmailProvider,
    /// Page size for ad-hoc listing commands.
    pub max_results: u32,
    pub llm: LlmConfig,
    pub providers: ProvidersConfig,
    pub monitoring: MonitoringConfig,
    pub webhooks: WebhooksConfig,
    pub outlook: OutlookAppConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            email_provider: EmailProvider::Gmail,
            max_results: 50,
            llm: LlmConfig::default(),
            providers: ProvidersConfig::default(),
            monitoring: MonitoringConfig::default(),
            webhooks: WebhooksConfig::default(),
            outlook: OutlookAppConfig::default(),
        }
    }
}

// ─────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────

/// Settings for the categorization calls.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmConfig {
    /// Model identifier; also selects the provider via the registry.
    pub model: String,
    /// Maximum tokens per categorization reply.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f64,
    /// Pause between consecutive categorization calls.
    pub request_delay_ms: u64,
    /// How much of the body is included in the prompt.
    pub body_char_limit: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-haiku-20240307".to_string(),
            max_tokens: 300,
            temperature: 0.0,
            request_delay_ms: 100,
            body_char_limit: 1000,
        }
    }
}

// ─────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────

/// Configuration for a single LLM provider (API key, base URL, headers).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    /// API key for authentication.
    #[serde(default)]
    pub api_key: String,
    /// Custom API base URL (overrides provider default).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
    /// Extra HTTP headers to send with each request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_headers: Option<HashMap<String, String>>,
}

impl ProviderConfig {
    /// Whether this provider has a configured API key.
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}

/// All provider configurations.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub anthropic: ProviderConfig,
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub openrouter: ProviderConfig,
    #[serde(default)]
    pub deepseek: ProviderConfig,
    #[serde(default)]
    pub groq: ProviderConfig,
}

impl ProvidersConfig {
    /// Get a provider config by name (e.g. `"anthropic"`).
    pub fn get_by_name(&self, name: &str) -> Option<&ProviderConfig> {
        match name {
            "anthropic" => Some(&self.anthropic),
            "openai" => Some(&self.openai),
            "openrouter" => Some(&self.openrouter),
            "deepseek" => Some(&self.deepseek),
            "groq" => Some(&self.groq),
            _ => None,
        }
    }

    fn entries_mut(&mut self) -> [(&'static str, &mut ProviderConfig); 5] {
        [
            ("ANTHROPIC", &mut self.anthropic),
            ("OPENAI", &mut self.openai),
            ("OPENROUTER", &mut self.openrouter),
            ("DEEPSEEK", &mut self.deepseek),
            ("GROQ", &mut self.groq),
        ]
    }

    /// Mutable access keyed by upper-case env name (`"ANTHROPIC"`, ...).
    pub(crate) fn for_each_env_mut(&mut self, mut f: impl FnMut(&str, &mut ProviderConfig)) {
        for (name, config) in self.entries_mut() {
            f(name, config);
        }
    }

    /// Convert to a HashMap<String, ProviderConfig> for use with the provider registry.
    pub fn to_map(&self) -> HashMap<String, ProviderConfig> {
        let entries: &[(&str, &ProviderConfig)] = &[
            ("anthropic", &self.anthropic),
            ("openai", &self.openai),
            ("openrouter", &self.openrouter),
            ("deepseek", &self.deepseek),
            ("groq", &self.groq),
        ];
        entries
            .iter()
            .map(|(name, config)| (name.to_string(), (*config).clone()))
            .collect()
    }
}

// ─────────────────────────────────────────────
// Monitoring
// ─────────────────────────────────────────────

/// Polling monitor settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitoringConfig {
    pub enabled: bool,
    /// Minutes between checks.
    pub poll_interval: u64,
    pub max_emails_per_check: usize,
    pub log_activity: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval: 5,
            max_emails_per_check: 10,
            log_activity: true,
        }
    }
}

// ─────────────────────────────────────────────
// Webhooks
// ─────────────────────────────────────────────

/// Push-notification receiver settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhooksConfig {
    pub enabled: bool,
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Shared secret for Outlook notification verification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    /// Pub/Sub topic used for Gmail `watch`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gmail_topic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlook_validation_token: Option<String>,
    /// Only messages received within this many minutes are processed.
    pub recent_window_minutes: i64,
    /// How many recent messages to fetch per notification.
    pub fetch_limit: u32,
}

impl Default for WebhooksConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: "0.0.0.0".to_string(),
            port: 3000,
            secret: None,
            gmail_topic: None,
            outlook_validation_token: None,
            recent_window_minutes: 10,
            fetch_limit: 20,
        }
    }
}

// ─────────────────────────────────────────────
// Outlook app registration
// ─────────────────────────────────────────────

/// Azure app registration used for the Microsoft identity platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutlookAppConfig {
    pub client_id: String,
    pub authority: String,
}

impl Default for OutlookAppConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            authority: "https://login.microsoftonline.com/organizations".to_string(),
        }
    }
}

impl OutlookAppConfig {
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
