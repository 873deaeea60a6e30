//! Typed errors for the mail layer.

use serde::de::DeserializeOwned;
use thiserror::Error;

pub type MailResult<T> = Result<T, MailError>;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Graph `ErrorAccessDenied`: the app registration lacks a permission.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The cached token was granted fewer scopes than the call needs.
    #[error("insufficient permission: {0}")]
    InsufficientScope(String),

    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MailError {
    /// Classify a non-success API response.
    pub fn from_response(status: u16, body: String) -> Self {
        let code = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error").and_then(|e| {
                    e.get("code")
                        .and_then(|c| c.as_str())
                        .or_else(|| e.get("status").and_then(|s| s.as_str()))
                        .map(str::to_string)
                })
            })
            .unwrap_or_default();

        if code == "ErrorAccessDenied" {
            return MailError::AccessDenied(body);
        }
        let lower = body.to_lowercase();
        if status == 403
            && (lower.contains("insufficient") || lower.contains("access_token_scope_insufficient"))
        {
            return MailError::InsufficientScope(body);
        }
        if status == 401 {
            return MailError::Auth(body);
        }
        MailError::Api { status, body }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, MailError::AccessDenied(_))
    }
}

/// Turn a non-2xx response into a `MailError`.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> MailResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(MailError::from_response(status.as_u16(), body))
}

/// Check status, then decode the JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> MailResult<T> {
    let resp = ensure_success(resp).await?;
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| MailError::Decode(e.to_string()))
}
