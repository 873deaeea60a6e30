//! Microsoft identity platform auth for Outlook (Graph).
//!
//! Order of preference: cached token, refresh token, device-code flow, and
//! finally a manual authorization-code flow where the user pastes the
//! redirect URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use mailsort_core::config::schema::OutlookAppConfig;

use super::{now_ms, prompt_line, write_token_file, TokenSource};
use crate::error::{read_json, MailError, MailResult};

pub const SCOPES: &[&str] = &[
    "https://graph.microsoft.com/Mail.Read",
    "https://graph.microsoft.com/Mail.ReadWrite",
    "https://graph.microsoft.com/MailboxSettings.Read",
    "offline_access",
];

const NATIVE_REDIRECT: &str = "https://login.microsoftonline.com/common/oauth2/nativeclient";
const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Contents of `outlook-token.json`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookToken {
    pub access_token: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub expires_on: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl OutlookToken {
    fn is_valid(&self) -> bool {
        self.expires_on.is_some_and(|exp| now_ms() < exp)
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    refresh_token: Option<String>,
}

impl From<TokenResponse> for OutlookToken {
    fn from(resp: TokenResponse) -> Self {
        OutlookToken {
            access_token: resp.access_token,
            expires_on: Some(now_ms() + resp.expires_in * 1000),
            refresh_token: resp.refresh_token,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceCodeResponse {
    device_code: String,
    user_code: String,
    #[serde(default)]
    verification_uri: Option<String>,
    #[serde(default = "default_device_expiry")]
    expires_in: u64,
    #[serde(default = "default_poll_interval")]
    interval: u64,
}

fn default_device_expiry() -> u64 {
    900
}

fn default_poll_interval() -> u64 {
    5
}

#[derive(Deserialize)]
struct OAuthErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Shape of the legacy `outlook-config.json`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyOutlookConfig {
    client_id: String,
    #[serde(default)]
    authority: Option<String>,
}

pub struct OutlookAuth {
    client_id: String,
    authority: String,
    token_path: PathBuf,
    http: reqwest::Client,
    token: Mutex<Option<OutlookToken>>,
}

impl OutlookAuth {
    pub fn new(
        client_id: impl Into<String>,
        authority: impl Into<String>,
        token_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            authority: authority.into().trim_end_matches('/').to_string(),
            token_path: token_path.into(),
            http: reqwest::Client::new(),
            token: Mutex::new(None),
        }
    }

    /// Build from the app config, falling back to `outlook-config.json` in
    /// `data_dir` when no client id is configured.
    pub fn from_config(config: &OutlookAppConfig, data_dir: &Path) -> MailResult<Self> {
        let token_path = data_dir.join("outlook-token.json");
        if config.is_configured() {
            return Ok(Self::new(&config.client_id, &config.authority, token_path));
        }

        let legacy_path = data_dir.join("outlook-config.json");
        let content = std::fs::read_to_string(&legacy_path).map_err(|_| {
            MailError::Auth(format!(
                "No Outlook client id configured. Set outlook.clientId in config.json \
                 or create {} with a clientId.",
                legacy_path.display()
            ))
        })?;
        let legacy: LegacyOutlookConfig = serde_json::from_str(&content)
            .map_err(|e| MailError::Decode(format!("{}: {e}", legacy_path.display())))?;
        let authority = legacy.authority.unwrap_or_else(|| config.authority.clone());
        Ok(Self::new(legacy.client_id, authority, token_path))
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/oauth2/v2.0/{}", self.authority, name)
    }

    fn scope() -> String {
        SCOPES.join(" ")
    }

    fn load_cached(&self) -> Option<OutlookToken> {
        let content = std::fs::read_to_string(&self.token_path).ok()?;
        serde_json::from_str(&content).ok()
    }

    fn store(&self, token: &OutlookToken) -> MailResult<()> {
        write_token_file(&self.token_path, token)?;
        info!(path = %self.token_path.display(), "Outlook token saved");
        Ok(())
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> MailResult<OutlookToken> {
        let resp = self.http.post(self.endpoint("token")).form(form).send().await?;
        let token: TokenResponse = read_json(resp).await?;
        Ok(token.into())
    }

    async fn refresh(&self, refresh_token: &str) -> MailResult<OutlookToken> {
        debug!("refreshing Outlook access token");
        let scope = Self::scope();
        let mut token = self
            .post_token(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("scope", scope.as_str()),
            ])
            .await?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    async fn device_code_flow(&self) -> MailResult<OutlookToken> {
        let scope = Self::scope();
        let resp = self
            .http
            .post(self.endpoint("devicecode"))
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope.as_str())])
            .send()
            .await?;
        let device: DeviceCodeResponse = read_json(resp).await?;

        println!("\nTo authenticate with Outlook/Office 365:");
        println!(
            "1. Go to: {}",
            device
                .verification_uri
                .as_deref()
                .unwrap_or("https://microsoft.com/devicelogin")
        );
        println!("2. Enter code: {}", device.user_code);
        println!("3. Sign in with your Microsoft account");
        println!("\nWaiting for authentication...");

        let deadline = now_ms() + (device.expires_in as i64) * 1000;
        let mut interval = device.interval;
        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            if now_ms() > deadline {
                return Err(MailError::Auth("device code expired".to_string()));
            }

            let resp = self
                .http
                .post(self.endpoint("token"))
                .form(&[
                    ("client_id", self.client_id.as_str()),
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("device_code", device.device_code.as_str()),
                ])
                .send()
                .await?;

            if resp.status().is_success() {
                let token: TokenResponse = read_json(resp).await?;
                return Ok(token.into());
            }

            let body = resp.text().await.unwrap_or_default();
            let err: OAuthErrorBody = serde_json::from_str(&body)
                .map_err(|_| MailError::Auth(format!("device code polling failed: {body}")))?;
            match err.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => interval += 5,
                _ => {
                    return Err(MailError::Auth(
                        err.error_description.unwrap_or(err.error),
                    ))
                }
            }
        }
    }

    /// The authorize URL used by the manual fallback.
    pub fn manual_auth_url(&self) -> MailResult<String> {
        let scope = Self::scope();
        let url = url::Url::parse_with_params(
            &self.endpoint("authorize"),
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", NATIVE_REDIRECT),
                ("scope", scope.as_str()),
                ("response_mode", "query"),
            ],
        )
        .map_err(|e| MailError::Auth(format!("invalid authority: {e}")))?;
        Ok(url.to_string())
    }

    async fn manual_flow(&self) -> MailResult<OutlookToken> {
        println!("\nManual Authentication Required:");
        println!("1. Open this URL in your browser:");
        println!("{}", self.manual_auth_url()?);
        println!("\n2. After signing in, you'll be redirected to a page that shows an error");
        println!("3. Copy the ENTIRE URL from your browser address bar");

        let redirect = prompt_line("\nPaste the full redirect URL here: ").await?;
        let code = extract_code(&redirect)?;
        self.exchange_code(&code).await
    }

    async fn exchange_code(&self, code: &str) -> MailResult<OutlookToken> {
        let scope = Self::scope();
        self.post_token(&[
            ("client_id", self.client_id.as_str()),
            ("scope", scope.as_str()),
            ("code", code),
            ("redirect_uri", NATIVE_REDIRECT),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    /// Interactive sign-in: device code, then the manual fallback.
    async fn sign_in(&self) -> MailResult<OutlookToken> {
        match self.device_code_flow().await {
            Ok(token) => Ok(token),
            Err(e) => {
                warn!(error = %e, "device code authentication failed, trying manual flow");
                self.manual_flow().await
            }
        }
    }

    /// Force a fresh interactive sign-in and persist it.
    pub async fn authorize(&self) -> MailResult<()> {
        let token = self.sign_in().await?;
        self.store(&token)?;
        *self.token.lock().await = Some(token);
        Ok(())
    }
}

/// Pull the `code` query parameter out of a pasted redirect URL.
pub fn extract_code(redirect_url: &str) -> MailResult<String> {
    let url = url::Url::parse(redirect_url.trim())
        .map_err(|e| MailError::Auth(format!("invalid redirect URL: {e}")))?;
    url.query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.into_owned())
        .ok_or_else(|| MailError::Auth("No authorization code found in URL".to_string()))
}

#[async_trait]
impl TokenSource for OutlookAuth {
    async fn access_token(&self) -> MailResult<String> {
        let mut guard = self.token.lock().await;
        if guard.is_none() {
            *guard = self.load_cached();
        }

        if let Some(token) = guard.as_ref().filter(|t| t.is_valid()) {
            return Ok(token.access_token.clone());
        }

        let mut fresh = None;
        if let Some(refresh_token) = guard.as_ref().and_then(|t| t.refresh_token.clone()) {
            match self.refresh(&refresh_token).await {
                Ok(token) => fresh = Some(token),
                Err(e) => warn!(error = %e, "Outlook token refresh failed"),
            }
        }
        let token = match fresh {
            Some(token) => token,
            None => self.sign_in().await?,
        };

        self.store(&token)?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn auth_for(server_uri: &str, dir: &Path) -> OutlookAuth {
        OutlookAuth::new("client-123", server_uri, dir.join("outlook-token.json"))
    }

    #[tokio::test]
    async fn test_cached_token_valid() {
        let dir = tempfile::tempdir().unwrap();
        let token = OutlookToken {
            access_token: "cached".into(),
            expires_on: Some(now_ms() + 60_000),
            refresh_token: None,
        };
        write_token_file(&dir.path().join("outlook-token.json"), &token).unwrap();

        let auth = auth_for("http://127.0.0.1:1", dir.path());
        assert_eq!(auth.access_token().await.unwrap(), "cached");
    }

    #[tokio::test]
    async fn test_expired_token_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "refreshed",
                "expires_in": 3600,
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let token = OutlookToken {
            access_token: "old".into(),
            expires_on: Some(now_ms() - 1),
            refresh_token: Some("rt-1".into()),
        };
        write_token_file(&dir.path().join("outlook-token.json"), &token).unwrap();

        let auth = auth_for(&server.uri(), dir.path());
        assert_eq!(auth.access_token().await.unwrap(), "refreshed");

        let saved: OutlookToken = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("outlook-token.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(saved.access_token, "refreshed");
        assert_eq!(saved.refresh_token.as_deref(), Some("rt-1"));
        assert!(saved.expires_on.unwrap() > now_ms());
    }

    #[tokio::test]
    async fn test_device_code_flow_polls_until_granted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev-1",
                "user_code": "ABCD-EFGH",
                "verification_uri": "https://microsoft.com/devicelogin",
                "expires_in": 60,
                "interval": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .and(body_string_contains("device_code=dev-1"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_pending"
            })))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "device-token",
                "expires_in": 3600,
                "refresh_token": "rt-device"
            })))
            .with_priority(2)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let auth = auth_for(&server.uri(), dir.path());
        let token = auth.device_code_flow().await.unwrap();
        assert_eq!(token.access_token, "device-token");
        assert_eq!(token.refresh_token.as_deref(), Some("rt-device"));
    }

    #[tokio::test]
    async fn test_device_code_declined() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/devicecode"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "device_code": "dev-2",
                "user_code": "X",
                "expires_in": 60,
                "interval": 0
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "authorization_declined",
                "error_description": "user said no"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = auth_for(&server.uri(), dir.path())
            .device_code_flow()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("user said no"));
    }

    #[test]
    fn test_extract_code() {
        let url = "https://login.microsoftonline.com/common/oauth2/nativeclient?code=0.AAA-xyz&session_state=1";
        assert_eq!(extract_code(url).unwrap(), "0.AAA-xyz");
        assert!(extract_code("https://example.com/?state=1").is_err());
        assert!(extract_code("not a url").is_err());
    }

    #[test]
    fn test_manual_auth_url() {
        let dir = tempfile::tempdir().unwrap();
        let auth = OutlookAuth::new(
            "cid",
            "https://login.microsoftonline.com/organizations/",
            dir.path().join("t.json"),
        );
        let url = auth.manual_auth_url().unwrap();
        assert!(url.starts_with(
            "https://login.microsoftonline.com/organizations/oauth2/v2.0/authorize?"
        ));
        assert!(url.contains("response_mode=query"));
        assert!(url.contains("offline_access"));
    }

    #[test]
    fn test_from_config_falls_back_to_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = OutlookAppConfig::default();
        assert!(OutlookAuth::from_config(&config, dir.path()).is_err());

        std::fs::write(
            dir.path().join("outlook-config.json"),
            r#"{"clientId": "legacy-id"}"#,
        )
        .unwrap();
        let auth = OutlookAuth::from_config(&config, dir.path()).unwrap();
        assert_eq!(auth.client_id, "legacy-id");
        assert_eq!(auth.authority, "https://login.microsoftonline.com/organizations");
    }
}
