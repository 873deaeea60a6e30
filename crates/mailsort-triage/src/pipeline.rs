//! Labelling pipeline: apply categorized groups to the mailbox, and the
//! one-shot batch run built on top of it.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use tracing::{debug, error, info};

use mailsort_core::config::LabelsConfigManager;
use mailsort_core::utils::{extract_name, humanize_label, truncate_text};
use mailsort_mail::{MailClient, MailResult};

use crate::llm_categorizer::{group_by_label, label_stats, LlmCategorizedEmail, LlmCategorizer};

/// Result of applying one label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelOutcome {
    pub label: String,
    pub applied: usize,
    pub error: Option<String>,
}

impl LabelOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Ensure each label exists and tag its messages. A failing label is
/// logged and recorded, the remaining labels still run.
pub async fn apply_labels(
    client: &dyn MailClient,
    grouped: &BTreeMap<String, Vec<LlmCategorizedEmail>>,
) -> Vec<LabelOutcome> {
    let mut outcomes = Vec::new();
    for (label_name, items) in grouped {
        if items.is_empty() {
            continue;
        }
        let ids: Vec<String> = items.iter().map(|i| i.email.id.clone()).collect();

        let result: MailResult<()> = async {
            let label = client.get_or_create_label(label_name, None).await?;
            client.add_label_to_messages(&ids, &label).await
        }
        .await;

        match result {
            Ok(()) => {
                info!(label = %label_name, count = ids.len(), "label applied");
                outcomes.push(LabelOutcome {
                    label: label_name.clone(),
                    applied: ids.len(),
                    error: None,
                });
            }
            Err(e) => {
                error!(label = %label_name, error = %e, "failed to apply label");
                outcomes.push(LabelOutcome {
                    label: label_name.clone(),
                    applied: 0,
                    error: Some(e.to_string()),
                });
            }
        }
    }
    outcomes
}

/// What one incremental pass did.
#[derive(Debug, Default)]
pub struct ProcessSummary {
    pub fetched: usize,
    pub processed: usize,
    pub stats: BTreeMap<String, usize>,
    pub outcomes: Vec<LabelOutcome>,
}

/// Fetch the `fetch_limit` most recent messages, keep those received after
/// `since` (at most `max`), then categorize and label them.
///
/// Used by the monitor and the webhook server. Only the fetch can fail.
pub async fn process_recent(
    client: &dyn MailClient,
    categorizer: &LlmCategorizer,
    fetch_limit: u32,
    since: DateTime<Utc>,
    max: usize,
) -> MailResult<ProcessSummary> {
    categorizer.reload_labels();
    let messages = client.get_messages(fetch_limit, None).await?;
    let fetched = messages.len();
    let recent: Vec<_> = messages
        .into_iter()
        .filter(|m| m.is_newer_than(since))
        .take(max)
        .collect();
    if recent.is_empty() {
        debug!(fetched, since = %since, "no new messages");
        return Ok(ProcessSummary {
            fetched,
            ..Default::default()
        });
    }

    let processed = recent.len();
    let categorized = categorizer.categorize_emails(recent).await;
    let stats = label_stats(&categorized);
    let outcomes = apply_labels(client, &group_by_label(categorized)).await;

    Ok(ProcessSummary {
        fetched,
        processed,
        stats,
        outcomes,
    })
}

/// Summary of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub fetched: usize,
    pub stats: BTreeMap<String, usize>,
    pub outcomes: Vec<LabelOutcome>,
}

/// Hints for errors users commonly hit on first run.
pub fn error_hints(err: &anyhow::Error) -> Vec<&'static str> {
    let message = format!("{err:#}");
    let lower = message.to_lowercase();
    let mut hints = Vec::new();
    if lower.contains("api key") {
        hints.push("Set your Anthropic API key: export ANTHROPIC_API_KEY=\"your-api-key-here\"");
    }
    if lower.contains("insufficient") {
        hints.push(
            "Re-authenticate with the label permissions: delete the token cache (token.json or outlook-token.json) and run again",
        );
    }
    hints
}

/// One-shot mode: label every unread message once.
pub async fn run_batch(
    client: &dyn MailClient,
    categorizer: &LlmCategorizer,
    labels_manager: &LabelsConfigManager,
) -> Result<BatchReport> {
    println!("{}", "Setting up default labels configuration...".dimmed());
    labels_manager
        .create_default()
        .context("failed to write default labels config")?;
    categorizer.set_labels(labels_manager.load());

    println!("{}", "Initializing email client...".dimmed());
    client
        .initialize()
        .await
        .with_context(|| format!("failed to initialize {} client", client.provider()))?;

    println!("{}", "Fetching emails...".dimmed());
    let emails = client
        .get_unread_messages()
        .await
        .context("failed to fetch unread messages")?;
    println!("Found {} unread emails", emails.len());

    if emails.is_empty() {
        println!("{}", "No unread emails found!".green());
        return Ok(BatchReport::default());
    }

    let fetched = emails.len();
    println!("Categorizing emails using {}...", categorizer.model().cyan());
    println!("{}", "(This may take a few moments as each email is analyzed)".dimmed());
    let categorized = categorizer.categorize_emails(emails).await;

    let stats = label_stats(&categorized);
    let descriptions = categorizer.labels().label_descriptions();
    let grouped = group_by_label(categorized);

    print_summary(&stats);

    println!();
    println!("{}", "=== APPLYING LABELS ===".bold());
    let outcomes = apply_labels(client, &grouped).await;
    for outcome in &outcomes {
        match &outcome.error {
            None => println!(
                "  {} Applied \"{}\" to {} emails",
                "✓".green(),
                outcome.label,
                outcome.applied
            ),
            Some(e) => println!("  {} \"{}\": {}", "✗".red(), outcome.label, e),
        }
    }

    print_breakdown(&grouped, &descriptions);
    print_configuration_info();

    Ok(BatchReport {
        fetched,
        stats,
        outcomes,
    })
}

fn print_summary(stats: &BTreeMap<String, usize>) {
    println!();
    println!("{}", "=== EMAIL CATEGORIZATION SUMMARY ===".bold());
    for (label, count) in stats.iter().filter(|(_, c)| **c > 0) {
        println!("  {}: {} emails", humanize_label(label).cyan(), count);
    }
}

fn print_breakdown(
    grouped: &BTreeMap<String, Vec<LlmCategorizedEmail>>,
    descriptions: &HashMap<String, String>,
) {
    println!();
    println!("{}", "=== DETAILED BREAKDOWN ===".bold());
    for (label, items) in grouped {
        println!();
        println!(
            "{} ({} emails):",
            humanize_label(label).cyan().bold(),
            items.len()
        );
        if let Some(desc) = descriptions.get(label) {
            println!("Description: {}", desc.dimmed());
        }
        for item in items {
            println!();
            println!("  • {}", truncate_text(&item.email.subject, 60));
            println!("    From: {}", extract_name(&item.email.from));
            println!("    Confidence: {:.1}%", item.confidence * 100.0);
            println!("    Reasoning: {}", item.reasoning.dimmed());
        }
    }
}

fn print_configuration_info() {
    println!();
    println!("{}", "=== CONFIGURATION INFO ===".bold());
    println!("  • Customize labels with `mailsort labels` or by editing labels.json");
    println!("  • Set ANTHROPIC_API_KEY (or another provider key) for categorization");
    println!("  • Switch provider with emailProvider in config.json (gmail/outlook)");
}
