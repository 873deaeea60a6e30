//! Shared CLI helpers: client and categorizer construction, banner, status marks.

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use mailsort_core::config::{Config, LabelsConfigManager};
use mailsort_core::utils::get_data_path;
use mailsort_core::EmailProvider;
use mailsort_mail::MailClient;
use mailsort_providers::create_provider;
use mailsort_triage::LlmCategorizer;

/// The `--provider` flag wins over the configured provider.
pub fn resolve_provider(flag: Option<EmailProvider>, config: &Config) -> EmailProvider {
    flag.unwrap_or(config.email_provider)
}

/// Mail client for `provider`, with credentials in the data directory.
pub fn build_client(provider: EmailProvider, config: &Config) -> Result<Arc<dyn MailClient>> {
    mailsort_mail::create_client(provider, config, &get_data_path())
        .with_context(|| format!("failed to create {provider} client"))
}

/// Categorizer for the configured model, loaded with the current labels.
pub fn build_categorizer(config: &Config) -> Result<LlmCategorizer> {
    let provider = create_provider(&config.llm.model, &config.providers.to_map())
        .map_err(anyhow::Error::msg)?;
    let labels = LabelsConfigManager::default_location().load();
    Ok(LlmCategorizer::new(provider, &config.llm, labels))
}

/// Print the banner shown when a long-running mode starts.
pub fn print_banner(mode: &str) {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "📬 mailsort".cyan().bold(), version.dimmed());
    println!("  Mode: {mode}");
    println!();
}

/// `✓ (key set)` / `· not configured` marker used by status output.
pub fn configured_mark(configured: bool, detail: &str) -> String {
    if configured {
        format!("{} {}", "✓".green(), detail)
    } else {
        format!("{}", "· not configured".dimmed())
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
