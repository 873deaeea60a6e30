//! `mailsort status`: configuration, credentials, and provider status.

use anyhow::Result;
use colored::Colorize;

use mailsort_core::config::{get_config_path, load_config, LabelsConfigManager};
use mailsort_core::utils::get_data_path;
use mailsort_core::EmailProvider;
use mailsort_monitor::LastCheckStore;
use mailsort_providers::registry::PROVIDERS;

use crate::helpers::configured_mark;

/// Run the status command.
pub fn run() -> Result<()> {
    let config = load_config(None);
    let data_dir = get_data_path();
    let config_path = get_config_path();

    println!();
    println!("{}", "📬 mailsort Status".cyan().bold());
    println!();

    println!(
        "  {:<18} {} {}",
        "Config:".bold(),
        config_path.display(),
        found_mark(config_path.exists())
    );

    let labels = LabelsConfigManager::default_location();
    println!(
        "  {:<18} {} {}",
        "Labels:".bold(),
        labels.path().display(),
        if labels.path().exists() {
            "✓".green().to_string()
        } else {
            "(built-in defaults)".dimmed().to_string()
        }
    );
    println!(
        "  {:<18} {}",
        "",
        labels.load().available_labels().join(", ").dimmed()
    );

    // Mailbox
    println!();
    println!("  {:<18} {}", "Email provider:".bold(), config.email_provider);
    let (credentials, token) = match config.email_provider {
        EmailProvider::Gmail => ("credentials.json", "token.json"),
        EmailProvider::Outlook => ("outlook-config.json", "outlook-token.json"),
    };
    if config.email_provider == EmailProvider::Outlook && config.outlook.is_configured() {
        println!("  {:<18} {}", "App registration:".bold(), configured_mark(true, "(clientId set)"));
    } else {
        println!(
            "  {:<18} {}",
            "Credentials:".bold(),
            found_mark(data_dir.join(credentials).exists())
        );
    }
    println!(
        "  {:<18} {}",
        "Token:".bold(),
        if data_dir.join(token).exists() {
            "✓".green().to_string()
        } else {
            "(run `mailsort auth`)".yellow().to_string()
        }
    );

    // LLM
    println!();
    println!("  {:<18} {}", "Model:".bold(), config.llm.model);
    println!(
        "  {:<18} {} | max_tokens: {}",
        "Parameters:".bold(),
        format!("temp: {}", config.llm.temperature).dimmed(),
        format!("{}", config.llm.max_tokens).dimmed(),
    );
    println!();
    println!("  {}", "Providers:".bold());
    let providers_map = config.providers.to_map();
    for spec in PROVIDERS {
        let configured = providers_map
            .get(spec.name)
            .is_some_and(|p| p.is_configured());
        println!(
            "    {:<20} {}",
            spec.display_name,
            configured_mark(configured, "(key set)")
        );
    }

    // Modes
    println!();
    let monitoring = &config.monitoring;
    println!(
        "  {:<18} {} every {} min, max {} per check",
        "Monitoring:".bold(),
        enabled_mark(monitoring.enabled),
        monitoring.poll_interval,
        monitoring.max_emails_per_check
    );
    let last_check = LastCheckStore::in_dir(&data_dir)
        .load()
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!("  {:<18} {}", "Last check:".bold(), last_check.dimmed());

    let webhooks = &config.webhooks;
    println!(
        "  {:<18} {} {}:{}",
        "Webhooks:".bold(),
        enabled_mark(webhooks.enabled),
        webhooks.host,
        webhooks.port
    );
    println!(
        "  {:<18} {}",
        "Webhook secret:".bold(),
        configured_mark(webhooks.secret.is_some(), "(set)")
    );
    if let Some(topic) = &webhooks.gmail_topic {
        println!("  {:<18} {}", "Gmail topic:".bold(), topic);
    }

    println!();
    Ok(())
}

fn found_mark(exists: bool) -> String {
    if exists {
        "✓".green().to_string()
    } else {
        "(not found)".red().to_string()
    }
}

fn enabled_mark(enabled: bool) -> String {
    if enabled {
        "enabled".green().to_string()
    } else {
        "disabled".dimmed().to_string()
    }
}
