//! Google OAuth for the Gmail API (installed-app flow).
//!
//! Reads the client from `credentials.json` and caches tokens in
//! `token.json`. Without a cached token the user is sent to the consent
//! page and pastes the code back.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{now_ms, prompt_line, write_token_file, TokenSource};
use crate::error::{read_json, MailError, MailResult};

pub const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/gmail.readonly",
    "https://www.googleapis.com/auth/gmail.labels",
    "https://www.googleapis.com/auth/gmail.modify",
];

const DEFAULT_AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";
/// Refresh this long before the recorded expiry.
const EXPIRY_SKEW_MS: i64 = 60_000;

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    installed: Option<ClientSecrets>,
    web: Option<ClientSecrets>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ClientSecrets {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub auth_uri: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ClientSecrets {
    fn redirect_uri(&self) -> &str {
        self.redirect_uris
            .first()
            .map(String::as_str)
            .unwrap_or(OOB_REDIRECT)
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

/// Contents of `token.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GoogleToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<i64>,
}

impl GoogleToken {
    fn is_expired(&self) -> bool {
        self.expiry_date
            .is_some_and(|exp| now_ms() >= exp - EXPIRY_SKEW_MS)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> GoogleToken {
        GoogleToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            scope: self.scope,
            token_type: self.token_type,
            expiry_date: self.expires_in.map(|secs| now_ms() + secs * 1000),
        }
    }
}

/// Token source backed by Google's OAuth endpoints.
pub struct GmailAuth {
    credentials_path: PathBuf,
    token_path: PathBuf,
    http: reqwest::Client,
    token: Mutex<Option<GoogleToken>>,
}

impl GmailAuth {
    pub fn new(credentials_path: impl Into<PathBuf>, token_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
            token_path: token_path.into(),
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// `credentials.json` and `token.json` inside `dir`.
    pub fn from_data_dir(dir: &Path) -> Self {
        Self::new(dir.join("credentials.json"), dir.join("token.json"))
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    pub fn load_credentials(&self) -> MailResult<ClientSecrets> {
        let content = std::fs::read_to_string(&self.credentials_path).map_err(|_| {
            MailError::Auth(format!(
                "Unable to load credentials file. Please ensure {} exists.",
                self.credentials_path.display()
            ))
        })?;
        let file: CredentialsFile = serde_json::from_str(&content)
            .map_err(|e| MailError::Decode(format!("credentials.json: {e}")))?;
        file.installed
            .or(file.web)
            .ok_or_else(|| MailError::Auth("credentials.json has no 'installed' client".into()))
    }

    fn load_cached(&self) -> Option<GoogleToken> {
        let content = std::fs::read_to_string(&self.token_path).ok()?;
        match serde_json::from_str(&content) {
            Ok(token) => Some(token),
            Err(e) => {
                warn!(path = %self.token_path.display(), error = %e, "ignoring unreadable token cache");
                None
            }
        }
    }

    /// The consent page URL for `secrets`.
    pub fn auth_url(secrets: &ClientSecrets) -> MailResult<String> {
        let base = secrets.auth_uri.as_deref().unwrap_or(DEFAULT_AUTH_URI);
        let scope = SCOPES.join(" ");
        let url = url::Url::parse_with_params(
            base,
            &[
                ("access_type", "offline"),
                ("scope", scope.as_str()),
                ("response_type", "code"),
                ("client_id", secrets.client_id.as_str()),
                ("redirect_uri", secrets.redirect_uri()),
            ],
        )
        .map_err(|e| MailError::Auth(format!("invalid auth_uri: {e}")))?;
        Ok(url.to_string())
    }

    async fn exchange_code(&self, secrets: &ClientSecrets, code: &str) -> MailResult<GoogleToken> {
        let resp = self
            .http
            .post(secrets.token_uri())
            .form(&[
                ("code", code),
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("redirect_uri", secrets.redirect_uri()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?;
        let token: TokenResponse = read_json(resp).await?;
        Ok(token.into_token(None))
    }

    async fn refresh(&self, secrets: &ClientSecrets, refresh_token: &str) -> MailResult<GoogleToken> {
        debug!("refreshing Gmail access token");
        let resp = self
            .http
            .post(secrets.token_uri())
            .form(&[
                ("client_id", secrets.client_id.as_str()),
                ("client_secret", secrets.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;
        let token: TokenResponse = read_json(resp).await.map_err(|e| {
            MailError::Auth(format!(
                "token refresh failed ({e}); delete {} and authorize again",
                self.token_path.display()
            ))
        })?;
        Ok(token.into_token(Some(refresh_token.to_string())))
    }

    /// Run the consent flow now and persist the result.
    pub async fn authorize(&self) -> MailResult<()> {
        let secrets = self.load_credentials()?;
        let token = self.authorize_interactive(&secrets).await?;
        *self.token.lock().await = Some(token);
        Ok(())
    }

    async fn authorize_interactive(&self, secrets: &ClientSecrets) -> MailResult<GoogleToken> {
        println!("Authorize this app by visiting this url:\n{}", Self::auth_url(secrets)?);
        let code = prompt_line("Enter authorization code: ").await?;
        let token = self.exchange_code(secrets, &code).await?;
        write_token_file(&self.token_path, &token)?;
        info!(path = %self.token_path.display(), "Gmail token stored");
        Ok(token)
    }
}

#[async_trait]
impl TokenSource for GmailAuth {
    async fn access_token(&self) -> MailResult<String> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = self.load_cached();
        }

        if let Some(token) = guard.as_ref() {
            if !token.is_expired() {
                return Ok(token.access_token.clone());
            }
        }

        let secrets = self.load_credentials()?;
        let refresh_token = guard.as_ref().and_then(|t| t.refresh_token.clone());
        let fresh = match refresh_token {
            Some(refresh_token) => {
                let token = self.refresh(&secrets, &refresh_token).await?;
                write_token_file(&self.token_path, &token)?;
                token
            }
            None => self.authorize_interactive(&secrets).await?,
        };

        let access = fresh.access_token.clone();
        *guard = Some(fresh);
        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_credentials(dir: &Path, token_uri: &str) {
        let creds = serde_json::json!({
            "installed": {
                "client_id": "cid.apps.googleusercontent.com",
                "client_secret": "shh",
                "redirect_uris": ["http://localhost"],
                "token_uri": token_uri
            }
        });
        std::fs::write(dir.join("credentials.json"), creds.to_string()).unwrap();
    }

    #[tokio::test]
    async fn test_cached_token_used_when_valid() {
        let dir = tempfile::tempdir().unwrap();
        let token = GoogleToken {
            access_token: "cached-access".into(),
            refresh_token: Some("r".into()),
            scope: None,
            token_type: Some("Bearer".into()),
            expiry_date: Some(now_ms() + 3_600_000),
        };
        write_token_file(&dir.path().join("token.json"), &token).unwrap();

        let auth = GmailAuth::from_data_dir(dir.path());
        assert_eq!(auth.access_token().await.unwrap(), "cached-access");
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=keep-me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh-access",
                "expires_in": 3599,
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path(), &format!("{}/token", server.uri()));
        let stale = GoogleToken {
            access_token: "stale".into(),
            refresh_token: Some("keep-me".into()),
            scope: None,
            token_type: None,
            expiry_date: Some(now_ms() - 1_000),
        };
        write_token_file(&dir.path().join("token.json"), &stale).unwrap();

        let auth = GmailAuth::from_data_dir(dir.path());
        assert_eq!(auth.access_token().await.unwrap(), "fresh-access");
        // Second call is served from memory.
        assert_eq!(auth.access_token().await.unwrap(), "fresh-access");

        let saved: GoogleToken = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("token.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved.access_token, "fresh-access");
        assert_eq!(saved.refresh_token.as_deref(), Some("keep-me"));
    }

    #[tokio::test]
    async fn test_refresh_failure_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        write_credentials(dir.path(), &format!("{}/token", server.uri()));
        let stale = GoogleToken {
            access_token: "stale".into(),
            refresh_token: Some("revoked".into()),
            scope: None,
            token_type: None,
            expiry_date: Some(0),
        };
        write_token_file(&dir.path().join("token.json"), &stale).unwrap();

        let err = GmailAuth::from_data_dir(dir.path())
            .access_token()
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Auth(_)));
    }

    #[test]
    fn test_missing_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let err = GmailAuth::from_data_dir(dir.path())
            .load_credentials()
            .unwrap_err();
        assert!(err.to_string().contains("credentials.json"));
    }

    #[test]
    fn test_auth_url_has_offline_access_and_scopes() {
        let secrets = ClientSecrets {
            client_id: "cid".into(),
            client_secret: "s".into(),
            redirect_uris: vec!["http://localhost".into()],
            auth_uri: None,
            token_uri: None,
        };
        let url = url::Url::parse(&GmailAuth::auth_url(&secrets).unwrap()).unwrap();
        let params: std::collections::HashMap<_, _> = url.query_pairs().into_owned().collect();
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["client_id"], "cid");
        assert!(params["scope"].contains("gmail.modify"));
        assert!(params["scope"].contains("gmail.labels"));
    }
}
