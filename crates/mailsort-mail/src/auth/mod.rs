//! OAuth token acquisition for the mail providers.
//!
//! Clients never talk to an identity provider directly. They ask a
//! [`TokenSource`] for a bearer token before each call.

pub mod gmail;
pub mod outlook;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{MailError, MailResult};

pub use gmail::GmailAuth;
pub use outlook::OutlookAuth;

/// Something that can hand out a currently valid access token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> MailResult<String>;
}

/// A fixed token. Used by tests and for tokens minted elsewhere.
#[derive(Clone, Debug)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> MailResult<String> {
        Ok(self.0.clone())
    }
}

/// Print `question` and read one trimmed line from stdin.
pub(crate) async fn prompt_line(question: &str) -> MailResult<String> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(question.as_bytes()).await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let line = line.trim().to_string();
    if line.is_empty() {
        return Err(MailError::Auth("no input received".to_string()));
    }
    Ok(line)
}

/// Current time as epoch milliseconds.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Persist a token file as pretty JSON, creating parent directories.
pub(crate) fn write_token_file<T: serde::Serialize>(
    path: &std::path::Path,
    token: &T,
) -> MailResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json =
        serde_json::to_string_pretty(token).map_err(|e| MailError::Decode(e.to_string()))?;
    std::fs::write(path, json)?;
    Ok(())
}
