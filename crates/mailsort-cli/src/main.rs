//! mailsort CLI, entry point.
//!
//! # Commands
//!
//! - `mailsort run`: label every unread message once
//! - `mailsort monitor`: poll for new mail on an interval
//! - `mailsort webhook`: receive Gmail / Outlook push notifications
//! - `mailsort status`: show configuration and provider status
//! - `mailsort init`: write the default config and labels
//! - `mailsort labels ...`: manage the action labels
//! - `mailsort auth`: run the OAuth flow for the configured mailbox
//! - `mailsort push ...`: manage Gmail watches and Outlook subscriptions

mod helpers;
mod init;
mod labels_cmd;
mod modes;
mod push_cmd;
mod status;

use anyhow::Result;
use clap::{Parser, Subcommand};

use mailsort_core::EmailProvider;

// ─────────────────────────────────────────────
// CLI definition
// ─────────────────────────────────────────────

/// 📬 mailsort: LLM-driven email triage for Gmail and Outlook
#[derive(Parser)]
#[command(name = "mailsort", version, about, long_about = None)]
struct Cli {
    /// Mail provider to use instead of the configured one (gmail | outlook)
    #[arg(short, long, global = true)]
    provider: Option<EmailProvider>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label every unread message once
    Run {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Poll the mailbox and label new messages as they arrive
    Monitor {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Start the push notification receiver
    Webhook {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,

        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Show configuration and provider status
    Status,

    /// Create the default config and labels files
    Init,

    /// Manage action labels
    Labels {
        #[command(subcommand)]
        action: labels_cmd::LabelsCommands,
    },

    /// Authorize access to the mailbox
    Auth {
        /// Enable debug logging
        #[arg(long, default_value_t = false)]
        logs: bool,
    },

    /// Manage push notification registrations
    Push {
        #[command(subcommand)]
        action: push_cmd::PushCommands,
    },
}

// ─────────────────────────────────────────────
// Entrypoint
// ─────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let provider = cli.provider;

    match cli.command {
        Commands::Run { logs } => {
            init_logging(logs, false);
            modes::run_once(provider).await
        }
        Commands::Monitor { logs } => {
            init_logging(logs, true);
            modes::run_monitor(provider).await
        }
        Commands::Webhook { port, logs } => {
            init_logging(logs, true);
            modes::run_webhook(provider, port).await
        }
        Commands::Status => status::run(),
        Commands::Init => init::run(),
        Commands::Labels { action } => labels_cmd::dispatch(action),
        Commands::Auth { logs } => {
            init_logging(logs, false);
            modes::run_auth(provider).await
        }
        Commands::Push { action } => {
            init_logging(false, false);
            push_cmd::dispatch(action).await
        }
    }
}

/// Initialize tracing/logging.
///
/// Long-running modes log at `info` so activity is visible without `--logs`.
fn init_logging(verbose: bool, long_running: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("mailsort=debug,info")
    } else if long_running {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
