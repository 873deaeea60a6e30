//! Core types shared across mailsort crates.
//!
//! - Mail types: `EmailMessage`, `EmailLabel`, `EmailProvider`: the
//!   provider-neutral shape both Gmail and Outlook clients convert into.
//! - LLM wire types: `Message`, `LlmResponse`, `UsageInfo`: the minimal
//!   chat format used by the provider crate.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────
// Mail types
// ─────────────────────────────────────────────

/// Which mail backend to talk to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmailProvider {
    #[default]
    Gmail,
    Outlook,
}

impl EmailProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmailProvider::Gmail => "gmail",
            EmailProvider::Outlook => "outlook",
        }
    }
}

impl fmt::Display for EmailProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmailProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gmail" => Ok(EmailProvider::Gmail),
            "outlook" => Ok(EmailProvider::Outlook),
            other => Err(format!("Unsupported email provider: {other}")),
        }
    }
}

/// A fetched email, normalized across providers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: String,
    /// Gmail thread id. Outlook has no equivalent, so it repeats `id`.
    pub thread_id: String,
    pub snippet: String,
    pub subject: String,
    pub from: String,
    pub to: String,
    /// Raw date string as returned by the provider.
    pub date: String,
    pub body: String,
    pub labels: Vec<String>,
    /// Parsed receive instant, when the provider gave us something parseable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
}

impl EmailMessage {
    /// Whether this message arrived strictly after `since`.
    ///
    /// Messages without a parseable date are never considered new.
    pub fn is_newer_than(&self, since: DateTime<Utc>) -> bool {
        self.received_at.is_some_and(|at| at > since)
    }
}

/// A label (Gmail) or category (Outlook).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailLabel {
    pub id: String,
    pub name: String,
    /// `"system"` / `"user"` for Gmail, always `"user"` for Outlook.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl EmailLabel {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

// ─────────────────────────────────────────────
// LLM messages
// ─────────────────────────────────────────────

/// A chat message. Serializes with a `role` tag, which both the
/// OpenAI-compatible and Anthropic APIs accept for user/assistant turns.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System { content: String },
    User { content: String },
    Assistant { content: String },
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Message::System {
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Message::User {
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Message::Assistant {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Message::System { content }
            | Message::User { content }
            | Message::Assistant { content } => content,
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Message::System { .. })
    }
}

/// Finish reason used to mark transport/API failures.
const ERROR_FINISH_REASON: &str = "error";

/// Response from an LLM provider.
#[derive(Clone, Debug, Default)]
pub struct LlmResponse {
    /// Text content from the assistant (or the error text on failure).
    pub content: Option<String>,
    /// Why the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage statistics.
    pub usage: Option<UsageInfo>,
}

impl LlmResponse {
    /// A successful text response.
    pub fn text(content: impl Into<String>, finish_reason: Option<String>) -> Self {
        LlmResponse {
            content: Some(content.into()),
            finish_reason,
            usage: None,
        }
    }

    /// An error response. The message is carried in `content` so callers
    /// can log it; `is_error()` tells it apart from a real reply.
    pub fn error(msg: impl Into<String>) -> Self {
        LlmResponse {
            content: Some(msg.into()),
            finish_reason: Some(ERROR_FINISH_REASON.to_string()),
            usage: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.finish_reason.as_deref() == Some(ERROR_FINISH_REASON)
    }
}

/// Token usage statistics from the LLM.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UsageInfo {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
