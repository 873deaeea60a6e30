//! Mail provider clients for mailsort.
//!
//! - **base**: the `MailClient` trait every provider implements
//! - **gmail** / **outlook**: REST clients for Gmail and Microsoft Graph
//! - **auth**: OAuth token sources backing those clients
//! - **subscriptions**: Graph change-notification subscriptions

pub mod auth;
pub mod base;
pub mod error;
pub mod gmail;
pub mod outlook;
pub mod subscriptions;

use std::path::Path;
use std::sync::Arc;

use mailsort_core::config::Config;
use mailsort_core::types::EmailProvider;

pub use auth::{GmailAuth, OutlookAuth, StaticToken, TokenSource};
pub use base::MailClient;
pub use error::{MailError, MailResult};
pub use gmail::GmailClient;
pub use outlook::OutlookClient;
pub use subscriptions::{Subscription, SubscriptionManager};

/// Token source for `provider`, with credential and token files in `data_dir`.
pub fn token_source(
    provider: EmailProvider,
    config: &Config,
    data_dir: &Path,
) -> MailResult<Arc<dyn TokenSource>> {
    Ok(match provider {
        EmailProvider::Gmail => Arc::new(GmailAuth::from_data_dir(data_dir)),
        EmailProvider::Outlook => Arc::new(OutlookAuth::from_config(&config.outlook, data_dir)?),
    })
}

/// Build the mail client for `provider`.
pub fn create_client(
    provider: EmailProvider,
    config: &Config,
    data_dir: &Path,
) -> MailResult<Arc<dyn MailClient>> {
    let auth = token_source(provider, config, data_dir)?;
    Ok(match provider {
        EmailProvider::Gmail => Arc::new(GmailClient::new(auth)),
        EmailProvider::Outlook => Arc::new(OutlookClient::new(auth)),
    })
}
