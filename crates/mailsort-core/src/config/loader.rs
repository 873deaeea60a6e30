//! Config loader: reads `~/.mailsort/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.mailsort/config.json`
//! 3. Environment variables `MAILSORT_<SECTION>__<FIELD>` (override JSON)
//! 4. Bare vendor keys (`ANTHROPIC_API_KEY`, ...) for providers still without a key

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::{Config, ProviderConfig};

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    load_config_from_path(&config_path)
}

/// Load config from a specific file path.
fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!(path = %path.display(), "no config file found, using defaults");
        return apply_env_overrides(Config::default());
    }

    debug!(path = %path.display(), "loading config");

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read config file");
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "failed to parse config JSON, using defaults");
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config).map_err(std::io::Error::other)?;

    std::fs::write(&config_path, json)?;
    debug!(path = %config_path.display(), "config saved");
    Ok(())
}

/// Write a default config file unless one already exists.
///
/// Returns `true` when a file was created.
pub fn create_default_config(path: Option<&Path>) -> std::io::Result<bool> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    if config_path.exists() {
        return Ok(false);
    }
    save_config(&Config::default(), Some(&config_path))?;
    info!(path = %config_path.display(), "created default config");
    Ok(true)
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `MAILSORT_<SECTION>__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `MAILSORT_EMAIL_PROVIDER` → `email_provider`
/// - `MAILSORT_LLM__MODEL` → `llm.model`
/// - `MAILSORT_PROVIDERS__<NAME>__API_KEY` → `providers.<name>.api_key`
/// - `MAILSORT_PROVIDERS__<NAME>__API_BASE` → `providers.<name>.api_base`
/// - `MAILSORT_MONITORING__POLL_INTERVAL` → `monitoring.poll_interval`
/// - `MAILSORT_WEBHOOKS__PORT` → `webhooks.port`
/// - `MAILSORT_WEBHOOKS__SECRET` → `webhooks.secret`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("MAILSORT_EMAIL_PROVIDER") {
        match val.parse() {
            Ok(provider) => config.email_provider = provider,
            Err(e) => warn!(error = %e, "ignoring MAILSORT_EMAIL_PROVIDER"),
        }
    }

    if let Ok(val) = std::env::var("MAILSORT_LLM__MODEL") {
        config.llm.model = val;
    }

    config.providers.for_each_env_mut(apply_provider_env);

    if let Ok(val) = std::env::var("MAILSORT_MONITORING__POLL_INTERVAL") {
        if let Ok(n) = val.parse::<u64>() {
            config.monitoring.poll_interval = n;
        }
    }

    if let Ok(val) = std::env::var("MAILSORT_WEBHOOKS__PORT") {
        if let Ok(p) = val.parse::<u16>() {
            config.webhooks.port = p;
        }
    }
    if let Ok(val) = std::env::var("MAILSORT_WEBHOOKS__SECRET") {
        if !val.is_empty() {
            config.webhooks.secret = Some(val);
        }
    }

    config
}

/// Apply env var overrides for a single provider.
fn apply_provider_env(name: &str, provider: &mut ProviderConfig) {
    if let Ok(val) = std::env::var(format!("MAILSORT_PROVIDERS__{name}__API_KEY")) {
        provider.api_key = val;
    }
    if let Ok(val) = std::env::var(format!("MAILSORT_PROVIDERS__{name}__API_BASE")) {
        provider.api_base = Some(val);
    }
    if provider.api_key.is_empty() {
        if let Ok(val) = std::env::var(format!("{name}_API_KEY")) {
            provider.api_key = val;
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
