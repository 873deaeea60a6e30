//! Microsoft Graph mail client. Labels map to Outlook categories.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, warn};

use mailsort_core::types::{EmailLabel, EmailMessage, EmailProvider};

use crate::auth::TokenSource;
use crate::base::{MailClient, DEFAULT_PAGE_SIZE};
use crate::error::{ensure_success, read_json, MailError, MailResult};

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

const LABEL_WRITE_DELAY: Duration = Duration::from_millis(100);
const DEFAULT_CATEGORY_COLOR: &str = "preset0";
const MESSAGE_FIELDS: &str =
    "id,subject,from,toRecipients,receivedDateTime,bodyPreview,body,categories,isRead";

const PERMISSION_HINT: &str = "the app registration needs the MailboxSettings.ReadWrite \
     permission to manage categories; delete outlook-token.json after granting it";

/// `$filter` expression matching messages tagged with `category`.
pub fn category_filter(category: &str) -> String {
    format!("categories/any(c:c eq '{}')", category.replace('\'', "''"))
}

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage {
    id: String,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from: Option<Recipient>,
    #[serde(default)]
    to_recipients: Vec<Recipient>,
    #[serde(default)]
    received_date_time: Option<String>,
    #[serde(default)]
    body_preview: String,
    #[serde(default)]
    body: Option<ItemBody>,
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Recipient {
    email_address: EmailAddress,
}

#[derive(Debug, Deserialize)]
struct EmailAddress {
    #[serde(default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct ItemBody {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct CategoriesOnly {
    #[serde(default)]
    categories: Vec<String>,
}

#[derive(Deserialize)]
struct MasterCategory {
    id: String,
    #[serde(rename = "displayName")]
    display_name: String,
}

impl From<MasterCategory> for EmailLabel {
    fn from(cat: MasterCategory) -> Self {
        EmailLabel::new(cat.id, cat.display_name).with_kind("category")
    }
}

impl From<GraphMessage> for EmailMessage {
    fn from(msg: GraphMessage) -> Self {
        let date = msg.received_date_time.unwrap_or_default();
        let received_at = DateTime::parse_from_rfc3339(&date)
            .ok()
            .map(|dt| dt.with_timezone(&Utc));
        let body = msg
            .body
            .map(|b| b.content)
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| msg.body_preview.clone());
        let to = msg
            .to_recipients
            .into_iter()
            .map(|r| r.email_address.address)
            .collect::<Vec<_>>()
            .join(", ");

        EmailMessage {
            thread_id: msg.id.clone(),
            id: msg.id,
            snippet: msg.body_preview,
            subject: msg.subject.unwrap_or_default(),
            from: msg.from.map(|r| r.email_address.address).unwrap_or_default(),
            to,
            date,
            body,
            labels: msg.categories,
            received_at,
        }
    }
}

// ─────────────────────────────────────────────
// OutlookClient
// ─────────────────────────────────────────────

pub struct OutlookClient {
    http: reqwest::Client,
    api_base: String,
    auth: Arc<dyn TokenSource>,
}

impl OutlookClient {
    pub fn new(auth: Arc<dyn TokenSource>) -> Self {
        Self::with_api_base(auth, GRAPH_API_BASE)
    }

    pub fn with_api_base(auth: Arc<dyn TokenSource>, api_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path)
    }

    async fn message_categories(&self, message_id: &str, token: &str) -> MailResult<Vec<String>> {
        let resp = self
            .http
            .get(self.url(&format!("me/messages/{message_id}")))
            .bearer_auth(token)
            .query(&[("$select", "categories")])
            .send()
            .await?;
        let current: CategoriesOnly = read_json(resp).await?;
        Ok(current.categories)
    }

    async fn set_categories(
        &self,
        message_id: &str,
        token: &str,
        categories: &[String],
    ) -> MailResult<()> {
        let resp = self
            .http
            .patch(self.url(&format!("me/messages/{message_id}")))
            .bearer_auth(token)
            .json(&serde_json::json!({ "categories": categories }))
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }
}

#[async_trait]
impl MailClient for OutlookClient {
    fn provider(&self) -> EmailProvider {
        EmailProvider::Outlook
    }

    fn label_write_delay(&self) -> Duration {
        LABEL_WRITE_DELAY
    }

    async fn initialize(&self) -> MailResult<()> {
        self.auth.access_token().await?;
        Ok(())
    }

    async fn get_messages(
        &self,
        max_results: u32,
        query: Option<&str>,
    ) -> MailResult<Vec<EmailMessage>> {
        let token = self.auth.access_token().await?;
        let top = max_results.to_string();
        let mut params = vec![
            ("$top", top.as_str()),
            ("$select", MESSAGE_FIELDS),
            ("$orderby", "receivedDateTime desc"),
        ];
        if let Some(filter) = query {
            params.push(("$filter", filter));
        }

        let resp = self
            .http
            .get(self.url("me/messages"))
            .bearer_auth(token)
            .query(&params)
            .send()
            .await?;
        let list: Collection<GraphMessage> = read_json(resp).await?;
        debug!(count = list.value.len(), filter = query.unwrap_or(""), "listed Outlook messages");
        Ok(list.value.into_iter().map(EmailMessage::from).collect())
    }

    async fn get_unread_messages(&self) -> MailResult<Vec<EmailMessage>> {
        self.get_messages(DEFAULT_PAGE_SIZE, Some("isRead eq false"))
            .await
    }

    async fn get_messages_by_label(&self, label_name: &str) -> MailResult<Vec<EmailMessage>> {
        let filter = category_filter(label_name);
        self.get_messages(DEFAULT_PAGE_SIZE, Some(&filter)).await
    }

    async fn get_labels(&self) -> MailResult<Vec<EmailLabel>> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .get(self.url("me/outlook/masterCategories"))
            .bearer_auth(token)
            .send()
            .await?;
        let list: Collection<MasterCategory> = read_json(resp).await?;
        Ok(list.value.into_iter().map(EmailLabel::from).collect())
    }

    async fn create_label(&self, name: &str, color: Option<&str>) -> MailResult<EmailLabel> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .post(self.url("me/outlook/masterCategories"))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "displayName": name,
                "color": color.unwrap_or(DEFAULT_CATEGORY_COLOR),
            }))
            .send()
            .await?;

        match read_json::<MasterCategory>(resp).await {
            Ok(category) => {
                info!(category = name, "created Outlook category");
                Ok(category.into())
            }
            Err(e) if e.is_access_denied() => {
                warn!(category = name, "cannot create category: {PERMISSION_HINT}");
                Ok(EmailLabel::new(name, name).with_kind("category"))
            }
            Err(e) => Err(e),
        }
    }

    async fn add_label_to_message(&self, message_id: &str, label: &EmailLabel) -> MailResult<()> {
        let token = self.auth.access_token().await?;
        let result: MailResult<()> = async {
            let mut categories = self.message_categories(message_id, &token).await?;
            if categories.iter().any(|c| c == &label.name) {
                return Ok(());
            }
            categories.push(label.name.clone());
            self.set_categories(message_id, &token, &categories).await
        }
        .await;

        match result {
            Err(MailError::AccessDenied(_)) => {
                warn!(
                    message_id,
                    category = %label.name,
                    "skipping category: {PERMISSION_HINT}"
                );
                Ok(())
            }
            other => other,
        }
    }

    async fn remove_label_from_message(
        &self,
        message_id: &str,
        label: &EmailLabel,
    ) -> MailResult<()> {
        let token = self.auth.access_token().await?;
        let categories = self.message_categories(message_id, &token).await?;
        let remaining: Vec<String> = categories
            .into_iter()
            .filter(|c| c != &label.name)
            .collect();
        self.set_categories(message_id, &token, &remaining).await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use chrono::TimeZone;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OutlookClient {
        OutlookClient::with_api_base(Arc::new(StaticToken("tok".into())), server.uri())
    }

    fn access_denied() -> ResponseTemplate {
        ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {"code": "ErrorAccessDenied", "message": "Access is denied."}
        }))
    }

    #[test]
    fn test_category_filter_escapes_quotes() {
        assert_eq!(
            category_filter("Bob's mail"),
            "categories/any(c:c eq 'Bob''s mail')"
        );
    }

    #[test]
    fn test_convert_message() {
        let raw = serde_json::json!({
            "id": "AAMk1",
            "subject": "Lunch?",
            "from": {"emailAddress": {"name": "Ann", "address": "ann@example.com"}},
            "toRecipients": [
                {"emailAddress": {"address": "me@example.com"}},
                {"emailAddress": {"address": "you@example.com"}}
            ],
            "receivedDateTime": "2024-05-01T10:00:00Z",
            "bodyPreview": "Are you free",
            "body": {"contentType": "text", "content": ""},
            "categories": ["fyi"]
        });
        let email: EmailMessage = serde_json::from_value::<GraphMessage>(raw).unwrap().into();

        assert_eq!(email.thread_id, "AAMk1");
        assert_eq!(email.from, "ann@example.com");
        assert_eq!(email.to, "me@example.com, you@example.com");
        assert_eq!(email.body, "Are you free");
        assert_eq!(email.labels, vec!["fyi"]);
        assert_eq!(
            email.received_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn test_get_unread_messages_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/messages"))
            .and(query_param("$top", "50"))
            .and(query_param("$filter", "isRead eq false"))
            .and(query_param("$orderby", "receivedDateTime desc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "value": [{
                    "id": "m1",
                    "subject": "Hello",
                    "bodyPreview": "hi",
                    "body": {"content": "full body"}
                }]
            })))
            .mount(&server)
            .await;

        let emails = client_for(&server).get_unread_messages().await.unwrap();
        assert_eq!(emails.len(), 1);
        assert_eq!(emails[0].body, "full body");
        assert_eq!(emails[0].from, "");
    }

    #[tokio::test]
    async fn test_create_category_default_color() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/outlook/masterCategories"))
            .and(body_json(serde_json::json!({"displayName": "fyi", "color": "preset0"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "cat-1", "displayName": "fyi", "color": "preset0"
            })))
            .mount(&server)
            .await;

        let label = client_for(&server).create_label("fyi", None).await.unwrap();
        assert_eq!(label.id, "cat-1");
        assert_eq!(label.name, "fyi");
    }

    #[tokio::test]
    async fn test_create_category_access_denied_is_synthetic() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/me/outlook/masterCategories"))
            .respond_with(access_denied())
            .mount(&server)
            .await;

        let label = client_for(&server).create_label("fyi", None).await.unwrap();
        assert_eq!(label.id, "fyi");
        assert_eq!(label.name, "fyi");
    }

    #[tokio::test]
    async fn test_add_category_patches_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/messages/m1"))
            .and(query_param("$select", "categories"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"categories": ["old"]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/me/messages/m1"))
            .and(body_json(serde_json::json!({"categories": ["old", "fyi"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .add_label_to_message("m1", &EmailLabel::new("cat-1", "fyi"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_category_skips_when_present() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/messages/m1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"categories": ["fyi"]})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        client_for(&server)
            .add_label_to_message("m1", &EmailLabel::new("cat-1", "fyi"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_add_category_access_denied_is_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/messages/m1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"categories": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/me/messages/m1"))
            .respond_with(access_denied())
            .mount(&server)
            .await;

        let result = client_for(&server)
            .add_label_to_message("m1", &EmailLabel::new("fyi", "fyi"))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_remove_category() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/me/messages/m1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "categories": ["fyi", "marketing"]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/me/messages/m1"))
            .and(body_json(serde_json::json!({"categories": ["marketing"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .remove_label_from_message("m1", &EmailLabel::new("cat-1", "fyi"))
            .await
            .unwrap();
    }
}
