//! Microsoft Graph change-notification subscriptions for new mail.

use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::TokenSource;
use crate::error::{ensure_success, read_json, MailResult};
use crate::outlook::GRAPH_API_BASE;

/// Graph rejects mail subscriptions longer than this.
pub const MAX_EXPIRATION_MINUTES: i64 = 4320;

pub const DEFAULT_CLIENT_STATE: &str = "email-categorizer";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub change_type: String,
    #[serde(default)]
    pub notification_url: String,
    pub expiration_date_time: DateTime<Utc>,
    #[serde(default)]
    pub client_state: Option<String>,
}

impl Subscription {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_date_time <= now
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSubscriptionRequest<'a> {
    change_type: &'static str,
    notification_url: &'a str,
    resource: &'static str,
    expiration_date_time: String,
    client_state: &'a str,
    latest_supported_tls_version: &'static str,
}

#[derive(Deserialize)]
struct SubscriptionList {
    #[serde(default)]
    value: Vec<Subscription>,
}

fn expiration_after(minutes: i64) -> String {
    let minutes = minutes.clamp(1, MAX_EXPIRATION_MINUTES);
    (Utc::now() + Duration::minutes(minutes)).to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub struct SubscriptionManager {
    http: reqwest::Client,
    api_base: String,
    auth: Arc<dyn TokenSource>,
    client_state: String,
}

impl SubscriptionManager {
    /// `secret` doubles as the `clientState` echoed back in notifications.
    pub fn new(auth: Arc<dyn TokenSource>, secret: Option<&str>) -> Self {
        Self::with_api_base(auth, secret, GRAPH_API_BASE)
    }

    pub fn with_api_base(
        auth: Arc<dyn TokenSource>,
        secret: Option<&str>,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth,
            client_state: secret
                .filter(|s| !s.is_empty())
                .unwrap_or(DEFAULT_CLIENT_STATE)
                .to_string(),
        }
    }

    pub fn client_state(&self) -> &str {
        &self.client_state
    }

    fn subscriptions_url(&self) -> String {
        format!("{}/subscriptions", self.api_base)
    }

    fn subscription_url(&self, id: &str) -> String {
        format!("{}/subscriptions/{id}", self.api_base)
    }

    /// Subscribe `notification_url` to newly created messages.
    pub async fn create(
        &self,
        notification_url: &str,
        expiration_minutes: i64,
    ) -> MailResult<Subscription> {
        let token = self.auth.access_token().await?;
        let body = CreateSubscriptionRequest {
            change_type: "created",
            notification_url,
            resource: "/me/messages",
            expiration_date_time: expiration_after(expiration_minutes),
            client_state: &self.client_state,
            latest_supported_tls_version: "v1_2",
        };
        let resp = self
            .http
            .post(self.subscriptions_url())
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let sub: Subscription = read_json(resp).await?;
        info!(
            id = %sub.id,
            expires = %sub.expiration_date_time,
            "Outlook subscription created"
        );
        Ok(sub)
    }

    pub async fn renew(&self, id: &str, expiration_minutes: i64) -> MailResult<Subscription> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .patch(self.subscription_url(id))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "expirationDateTime": expiration_after(expiration_minutes),
            }))
            .send()
            .await?;
        let sub: Subscription = read_json(resp).await?;
        info!(id, expires = %sub.expiration_date_time, "Outlook subscription renewed");
        Ok(sub)
    }

    pub async fn delete(&self, id: &str) -> MailResult<()> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .delete(self.subscription_url(id))
            .bearer_auth(token)
            .send()
            .await?;
        ensure_success(resp).await?;
        info!(id, "Outlook subscription deleted");
        Ok(())
    }

    pub async fn list(&self) -> MailResult<Vec<Subscription>> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .get(self.subscriptions_url())
            .bearer_auth(token)
            .send()
            .await?;
        let list: SubscriptionList = read_json(resp).await?;
        Ok(list.value)
    }

    /// Delete every expired subscription. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> MailResult<usize> {
        let now = Utc::now();
        let mut removed = 0;
        for sub in self.list().await?.into_iter().filter(|s| s.is_expired(now)) {
            match self.delete(&sub.id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(id = %sub.id, error = %e, "failed to delete expired subscription"),
            }
        }
        Ok(removed)
    }
}
