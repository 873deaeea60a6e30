//! `mailsort push`: register the mailbox for push notifications.
//!
//! Gmail publishes to a Pub/Sub topic via `users.watch`; Outlook needs a Graph
//! subscription pointing at the webhook receiver. Both expire and must be
//! renewed (Gmail after 7 days, Outlook after at most 4320 minutes).

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;

use mailsort_core::config::load_config;
use mailsort_core::utils::get_data_path;
use mailsort_core::EmailProvider;
use mailsort_mail::subscriptions::MAX_EXPIRATION_MINUTES;
use mailsort_mail::{GmailClient, SubscriptionManager};

// ─────────────────────────────────────────────
// Subcommand enum
// ─────────────────────────────────────────────

#[derive(Subcommand)]
pub enum PushCommands {
    /// Start Gmail push notifications to a Pub/Sub topic
    GmailWatch {
        /// Full topic name, e.g. "projects/my-project/topics/gmail".
        /// Defaults to webhooks.gmailTopic from the config.
        topic: Option<String>,
    },

    /// Stop Gmail push notifications
    GmailStop,

    /// Create an Outlook subscription for new messages
    OutlookSubscribe {
        /// Public HTTPS URL of the /webhooks/outlook endpoint
        url: String,

        /// Lifetime in minutes
        #[arg(short, long, default_value_t = MAX_EXPIRATION_MINUTES)]
        minutes: i64,
    },

    /// Extend an Outlook subscription
    OutlookRenew {
        id: String,

        /// New lifetime in minutes, counted from now
        #[arg(short, long, default_value_t = MAX_EXPIRATION_MINUTES)]
        minutes: i64,
    },

    /// Delete an Outlook subscription
    OutlookDelete {
        id: String,
    },

    /// List Outlook subscriptions
    OutlookList,

    /// Delete expired Outlook subscriptions
    OutlookCleanup,
}

/// Dispatch a push subcommand.
pub async fn dispatch(cmd: PushCommands) -> Result<()> {
    let config = load_config(None);
    let data_dir = get_data_path();

    match cmd {
        PushCommands::GmailWatch { topic } => {
            let topic = match topic.or_else(|| config.webhooks.gmail_topic.clone()) {
                Some(t) if !t.trim().is_empty() => t,
                _ => bail!("no Pub/Sub topic given and webhooks.gmailTopic is not set"),
            };
            let auth = mailsort_mail::token_source(EmailProvider::Gmail, &config, &data_dir)?;
            let watch = GmailClient::new(auth)
                .watch(&topic)
                .await
                .context("Gmail watch failed")?;
            println!("  {} watching INBOX via {}", "✓".green(), topic);
            println!("  {:<12} {}", "History id:".bold(), watch.history_id);
            println!("  {:<12} {}", "Expires:".bold(), format_expiration_ms(&watch.expiration));
        }
        PushCommands::GmailStop => {
            let auth = mailsort_mail::token_source(EmailProvider::Gmail, &config, &data_dir)?;
            GmailClient::new(auth).stop().await.context("Gmail stop failed")?;
            println!("  {} Gmail push notifications stopped", "✓".green());
        }
        PushCommands::OutlookSubscribe { url, minutes } => {
            if !url.starts_with("https://") {
                bail!("Graph only delivers notifications to https URLs");
            }
            let sub = outlook_manager(&config, &data_dir)?
                .create(&url, minutes)
                .await
                .context("creating subscription failed")?;
            println!("  {} subscription {}", "✓".green(), sub.id.cyan());
            println!("  {:<12} {}", "Expires:".bold(), sub.expiration_date_time.to_rfc3339());
        }
        PushCommands::OutlookRenew { id, minutes } => {
            let sub = outlook_manager(&config, &data_dir)?
                .renew(&id, minutes)
                .await
                .context("renewing subscription failed")?;
            println!(
                "  {} {} now expires {}",
                "✓".green(),
                sub.id.cyan(),
                sub.expiration_date_time.to_rfc3339()
            );
        }
        PushCommands::OutlookDelete { id } => {
            outlook_manager(&config, &data_dir)?
                .delete(&id)
                .await
                .context("deleting subscription failed")?;
            println!("  {} deleted {}", "✓".green(), id);
        }
        PushCommands::OutlookList => {
            let subs = outlook_manager(&config, &data_dir)?.list().await?;
            if subs.is_empty() {
                println!("  No subscriptions.");
                return Ok(());
            }
            let now = Utc::now();
            for sub in subs {
                let state = if sub.is_expired(now) {
                    "expired".red().to_string()
                } else {
                    "active".green().to_string()
                };
                println!(
                    "  {}  {}  {}  {}",
                    sub.id.cyan(),
                    state,
                    sub.expiration_date_time.to_rfc3339().dimmed(),
                    sub.notification_url
                );
            }
        }
        PushCommands::OutlookCleanup => {
            let removed = outlook_manager(&config, &data_dir)?.cleanup_expired().await?;
            println!("  {} removed {removed} expired subscription(s)", "✓".green());
        }
    }
    Ok(())
}

fn outlook_manager(
    config: &mailsort_core::config::Config,
    data_dir: &std::path::Path,
) -> Result<SubscriptionManager> {
    let auth = mailsort_mail::token_source(EmailProvider::Outlook, config, data_dir)?;
    Ok(SubscriptionManager::new(auth, config.webhooks.secret.as_deref()))
}

/// Gmail reports expiration as epoch milliseconds in a string.
fn format_expiration_ms(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiration_formatting() {
        assert_eq!(
            format_expiration_ms("1714557600000"),
            "2024-05-01T10:00:00+00:00"
        );
        assert_eq!(format_expiration_ms("soon"), "soon");
    }
}
