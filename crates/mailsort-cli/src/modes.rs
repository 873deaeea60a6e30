//! Run modes: one-shot batch, polling monitor, webhook receiver, and the
//! OAuth authorization flow.
//!
//! Monitor and webhook startup:
//! 1. Load config, resolve the mail provider
//! 2. Build and initialize the mail client, build the categorizer
//! 3. Spawn the long-running service
//! 4. Wait for Ctrl+C (or the service exiting), then stop it gracefully

use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;
use tracing::{error, info};

use mailsort_core::config::{get_config_path, load_config, Config, LabelsConfigManager};
use mailsort_core::utils::get_data_path;
use mailsort_core::EmailProvider;
use mailsort_mail::{GmailAuth, MailClient, OutlookAuth};
use mailsort_monitor::EmailMonitor;
use mailsort_triage::{error_hints, run_batch, BatchReport, LlmCategorizer};
use mailsort_webhook::WebhookServer;

use crate::helpers::{build_categorizer, build_client, print_banner, resolve_provider};

// ─────────────────────────────────────────────
// One-shot
// ─────────────────────────────────────────────

/// `mailsort run`: label all unread mail once, printing a report.
pub async fn run_once(flag: Option<EmailProvider>) -> Result<()> {
    let config = load_config(None);
    let provider = resolve_provider(flag, &config);

    println!(
        "{}",
        format!("📬 Sorting unread {provider} mail with {}", config.llm.model)
            .cyan()
            .bold()
    );

    let result: Result<BatchReport> = async {
        let client = build_client(provider, &config)?;
        let categorizer = build_categorizer(&config)?;
        run_batch(
            client.as_ref(),
            &categorizer,
            &LabelsConfigManager::default_location(),
        )
        .await
    }
    .await;

    match result {
        Ok(report) => {
            info!(fetched = report.fetched, "batch run complete");
            Ok(())
        }
        Err(e) => {
            eprintln!();
            eprintln!("{} {e:#}", "Error:".red().bold());
            for hint in error_hints(&e) {
                eprintln!("  {} {hint}", "hint:".yellow());
            }
            std::process::exit(1);
        }
    }
}

// ─────────────────────────────────────────────
// Long-running modes
// ─────────────────────────────────────────────

/// Client and categorizer shared by the monitor and webhook modes.
async fn prepare(
    flag: Option<EmailProvider>,
    config: &Config,
) -> Result<(Arc<dyn MailClient>, Arc<LlmCategorizer>)> {
    let provider = resolve_provider(flag, config);
    let client = build_client(provider, config)?;
    client
        .initialize()
        .await
        .with_context(|| format!("failed to initialize {provider} client"))?;
    let labels = LabelsConfigManager::default_location();
    labels
        .create_default()
        .context("failed to write default labels config")?;
    let categorizer = Arc::new(build_categorizer(config)?.with_labels_source(labels));
    info!(
        provider = %provider,
        model = categorizer.model(),
        labels = categorizer.labels().labels.len(),
        "triage ready"
    );
    Ok((client, categorizer))
}

/// `mailsort monitor`: poll until Ctrl+C.
pub async fn run_monitor(flag: Option<EmailProvider>) -> Result<()> {
    let config = load_config(None);
    if !config.monitoring.enabled {
        println!(
            "{} monitoring is disabled. Set {} in {}",
            "✗".red(),
            "monitoring.enabled = true".bold(),
            get_config_path().display()
        );
        return Ok(());
    }

    print_banner("Monitor");
    println!(
        "  Checking every {} min, up to {} messages per check",
        config.monitoring.poll_interval, config.monitoring.max_emails_per_check
    );
    println!("  Press Ctrl+C to stop");
    println!();

    let (client, categorizer) = prepare(flag, &config).await?;
    let monitor = Arc::new(EmailMonitor::new(
        client,
        categorizer,
        config.monitoring.clone(),
        &get_data_path(),
    ));

    let runner = monitor.clone();
    let mut handle = tokio::spawn(async move { runner.start().await });

    let finished = tokio::select! {
        res = &mut handle => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };
    match finished {
        Some(res) => res.context("monitor task failed")?,
        None => {
            println!();
            println!("  Shutting down...");
            info!("received Ctrl+C, shutting down");
            monitor.stop();
            handle.await.context("monitor task failed")?;
        }
    }

    if let Some(last) = monitor.status().last_check {
        println!("  Last check: {}", last.to_rfc3339().dimmed());
    }
    Ok(())
}

/// `mailsort webhook`: serve push endpoints until Ctrl+C.
pub async fn run_webhook(flag: Option<EmailProvider>, port: Option<u16>) -> Result<()> {
    let mut config = load_config(None);
    if let Some(port) = port {
        config.webhooks.port = port;
    }

    print_banner("Webhook");
    if !config.webhooks.enabled {
        println!(
            "  {} webhooks.enabled is false in config; starting anyway",
            "!".yellow()
        );
    }
    if config.webhooks.secret.is_none() {
        println!(
            "  {} no webhooks.secret set; Outlook notifications use the default client state",
            "!".yellow()
        );
    }

    let (client, categorizer) = prepare(flag, &config).await?;
    let server = Arc::new(WebhookServer::new(
        client,
        categorizer,
        config.webhooks.clone(),
    ));

    let status = server.status();
    println!("  Listening on {}:{}", config.webhooks.host, status.port);
    for endpoint in &status.endpoints {
        println!("    {}", endpoint.dimmed());
    }
    println!("  Press Ctrl+C to stop");
    println!();

    let runner = server.clone();
    let mut handle = tokio::spawn(async move { runner.start().await });

    let finished = tokio::select! {
        res = &mut handle => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };
    match finished {
        Some(res) => res.context("webhook task failed")??,
        None => {
            println!();
            println!("  Shutting down...");
            info!("received Ctrl+C, shutting down");
            server.stop();
            if let Err(e) = handle.await.context("webhook task failed")? {
                error!(error = %e, "webhook server exited with error");
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────

/// `mailsort auth`: interactive OAuth for the selected provider.
pub async fn run_auth(flag: Option<EmailProvider>) -> Result<()> {
    let config = load_config(None);
    let provider = resolve_provider(flag, &config);
    let data_dir = get_data_path();

    println!("{}", format!("🔑 Authorizing {provider}").cyan().bold());
    println!();

    match provider {
        EmailProvider::Gmail => GmailAuth::from_data_dir(&data_dir).authorize().await?,
        EmailProvider::Outlook => {
            OutlookAuth::from_config(&config.outlook, &data_dir)?
                .authorize()
                .await?
        }
    }

    println!();
    println!("  {} {provider} authorized, token stored in {}", "✓".green(), data_dir.display());
    Ok(())
}
