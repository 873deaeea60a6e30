//! Gmail REST v1 client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mailsort_core::types::{EmailLabel, EmailMessage, EmailProvider};
use mailsort_core::utils::parse_email_date;

use crate::auth::TokenSource;
use crate::base::{MailClient, DEFAULT_PAGE_SIZE};
use crate::error::{ensure_success, read_json, MailResult};

pub const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

const LABEL_WRITE_DELAY: Duration = Duration::from_millis(50);

// ─────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────

#[derive(Deserialize)]
struct ListMessagesResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    #[serde(default)]
    thread_id: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    label_ids: Vec<String>,
    /// Epoch milliseconds, as a string.
    #[serde(default)]
    internal_date: Option<String>,
    #[serde(default)]
    payload: Option<MessagePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessagePart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Deserialize)]
struct ListLabelsResponse {
    #[serde(default)]
    labels: Vec<GmailLabel>,
}

#[derive(Deserialize)]
struct GmailLabel {
    id: String,
    name: String,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl From<GmailLabel> for EmailLabel {
    fn from(label: GmailLabel) -> Self {
        EmailLabel {
            id: label.id,
            name: label.name,
            kind: label.kind,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLabelRequest<'a> {
    name: &'a str,
    message_list_visibility: &'static str,
    label_list_visibility: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<LabelColor<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LabelColor<'a> {
    background_color: &'a str,
    text_color: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ModifyRequest<'a> {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    add_label_ids: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    remove_label_ids: Vec<&'a str>,
}

/// Result of `users.watch`.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchResponse {
    pub history_id: String,
    /// Epoch milliseconds, as a string.
    pub expiration: String,
}

// ─────────────────────────────────────────────
// Parsing
// ─────────────────────────────────────────────

/// Decode Gmail's base64url body data, tolerating padding and the
/// standard alphabet.
pub fn decode_body_data(data: &str) -> Option<String> {
    let normalized: String = data
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = URL_SAFE_NO_PAD.decode(normalized).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

fn header_value(part: &MessagePart, name: &str) -> String {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
        .unwrap_or_default()
}

fn find_plain_text(parts: &[MessagePart]) -> Option<String> {
    for part in parts {
        if part.mime_type == "text/plain" {
            if let Some(text) = part
                .body
                .as_ref()
                .and_then(|b| b.data.as_deref())
                .and_then(decode_body_data)
            {
                return Some(text);
            }
        }
        if let Some(text) = find_plain_text(&part.parts) {
            return Some(text);
        }
    }
    None
}

fn extract_body(payload: &MessagePart) -> String {
    payload
        .body
        .as_ref()
        .and_then(|b| b.data.as_deref())
        .filter(|d| !d.is_empty())
        .and_then(decode_body_data)
        .or_else(|| find_plain_text(&payload.parts))
        .unwrap_or_default()
}

impl From<GmailMessage> for EmailMessage {
    fn from(msg: GmailMessage) -> Self {
        let payload = msg.payload.unwrap_or_default();
        let date = header_value(&payload, "Date");
        let received_at = msg
            .internal_date
            .as_deref()
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .or_else(|| parse_email_date(&date));

        EmailMessage {
            subject: header_value(&payload, "Subject"),
            from: header_value(&payload, "From"),
            to: header_value(&payload, "To"),
            body: extract_body(&payload),
            id: msg.id,
            thread_id: msg.thread_id,
            snippet: msg.snippet,
            date,
            labels: msg.label_ids,
            received_at,
        }
    }
}

// ─────────────────────────────────────────────
// GmailClient
// ─────────────────────────────────────────────

pub struct GmailClient {
    http: reqwest::Client,
    api_base: String,
    auth: Arc<dyn TokenSource>,
}

impl GmailClient {
    pub fn new(auth: Arc<dyn TokenSource>) -> Self {
        Self::with_api_base(auth, GMAIL_API_BASE)
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

    async fn get_message(&self, id: &str, token: &str) -> MailResult<EmailMessage> {
        let resp = self
            .http
            .get(self.url(&format!("messages/{id}")))
            .bearer_auth(token)
            .query(&[("format", "full")])
            .send()
            .await?;
        let msg: GmailMessage = read_json(resp).await?;
        Ok(msg.into())
    }

    async fn modify(&self, message_id: &str, body: &ModifyRequest<'_>) -> MailResult<()> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .post(self.url(&format!("messages/{message_id}/modify")))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        ensure_success(resp).await?;
        Ok(())
    }

    /// Start push notifications for the inbox to a Pub/Sub topic.
    pub async fn watch(&self, topic_name: &str) -> MailResult<WatchResponse> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .post(self.url("watch"))
            .bearer_auth(token)
            .json(&serde_json::json!({
                "topicName": topic_name,
                "labelIds": ["INBOX"],
            }))
            .send()
            .await?;
        let watch: WatchResponse = read_json(resp).await?;
        info!(topic = topic_name, history_id = %watch.history_id, "Gmail watch started");
        Ok(watch)
    }

    /// Stop push notifications for this mailbox.
    pub async fn stop(&self) -> MailResult<()> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .post(self.url("stop"))
            .bearer_auth(token)
            .send()
            .await?;
        ensure_success(resp).await?;
        info!("Gmail watch stopped");
        Ok(())
    }
}

#[async_trait]
impl MailClient for GmailClient {
    fn provider(&self) -> EmailProvider {
        EmailProvider::Gmail
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
        let max = max_results.to_string();
        let mut params = vec![("maxResults", max.as_str())];
        if let Some(q) = query {
            params.push(("q", q));
        }

        let resp = self
            .http
            .get(self.url("messages"))
            .bearer_auth(&token)
            .query(&params)
            .send()
            .await?;
        let list: ListMessagesResponse = read_json(resp).await?;
        debug!(count = list.messages.len(), query = query.unwrap_or(""), "listed Gmail messages");

        let mut messages = Vec::with_capacity(list.messages.len());
        for item in &list.messages {
            messages.push(self.get_message(&item.id, &token).await?);
        }
        Ok(messages)
    }

    async fn get_unread_messages(&self) -> MailResult<Vec<EmailMessage>> {
        self.get_messages(DEFAULT_PAGE_SIZE, Some("is:unread")).await
    }

    async fn get_messages_by_label(&self, label_name: &str) -> MailResult<Vec<EmailMessage>> {
        let query = format!("label:{label_name}");
        self.get_messages(DEFAULT_PAGE_SIZE, Some(&query)).await
    }

    async fn get_labels(&self) -> MailResult<Vec<EmailLabel>> {
        let token = self.auth.access_token().await?;
        let resp = self
            .http
            .get(self.url("labels"))
            .bearer_auth(token)
            .send()
            .await?;
        let list: ListLabelsResponse = read_json(resp).await?;
        Ok(list.labels.into_iter().map(EmailLabel::from).collect())
    }

    async fn create_label(&self, name: &str, color: Option<&str>) -> MailResult<EmailLabel> {
        let token = self.auth.access_token().await?;
        let body = CreateLabelRequest {
            name,
            message_list_visibility: "show",
            label_list_visibility: "labelShow",
            color: color.map(|bg| LabelColor {
                background_color: bg,
                text_color: "#ffffff",
            }),
        };
        let resp = self
            .http
            .post(self.url("labels"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let label: GmailLabel = read_json(resp).await?;
        info!(label = name, id = %label.id, "created Gmail label");
        Ok(label.into())
    }

    async fn add_label_to_message(&self, message_id: &str, label: &EmailLabel) -> MailResult<()> {
        self.modify(
            message_id,
            &ModifyRequest {
                add_label_ids: vec![&label.id],
                remove_label_ids: Vec::new(),
            },
        )
        .await
    }

    async fn remove_label_from_message(
        &self,
        message_id: &str,
        label: &EmailLabel,
    ) -> MailResult<()> {
        self.modify(
            message_id,
            &ModifyRequest {
                add_label_ids: Vec::new(),
                remove_label_ids: vec![&label.id],
            },
        )
        .await
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticToken;
    use crate::error::MailError;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn b64(text: &str) -> String {
        URL_SAFE_NO_PAD.encode(text)
    }

    fn client_for(server: &MockServer) -> GmailClient {
        GmailClient::with_api_base(Arc::new(StaticToken("tok".into())), server.uri())
    }

    #[test]
    fn test_decode_body_variants() {
        assert_eq!(decode_body_data("aGVsbG8").as_deref(), Some("hello"));
        assert_eq!(decode_body_data("aGVsbG8=").as_deref(), Some("hello"));
        // "??>" encodes to "Pz8-" in url-safe and "Pz8+" in standard
        assert_eq!(decode_body_data("Pz8-").as_deref(), Some("??>"));
        assert_eq!(decode_body_data("Pz8+").as_deref(), Some("??>"));
        assert!(decode_body_data("***").is_none());
    }

    #[test]
    fn test_parse_nested_multipart() {
        let raw = serde_json::json!({
            "id": "m1",
            "threadId": "t1",
            "snippet": "Hi there",
            "labelIds": ["INBOX", "UNREAD"],
            "internalDate": "1714557600000",
            "payload": {
                "mimeType": "multipart/mixed",
                "headers": [
                    {"name": "subject", "value": "Quarterly report"},
                    {"name": "From", "value": "Ann <ann@example.com>"},
                    {"name": "To", "value": "me@example.com"},
                    {"name": "Date", "value": "Wed, 1 May 2024 10:00:00 +0000"}
                ],
                "body": {"size": 0},
                "parts": [{
                    "mimeType": "multipart/alternative",
                    "parts": [
                        {"mimeType": "text/html", "body": {"data": b64("<p>html</p>")}},
                        {"mimeType": "text/plain", "body": {"data": b64("plain body")}}
                    ]
                }]
            }
        });
        let msg: GmailMessage = serde_json::from_value(raw).unwrap();
        let email: EmailMessage = msg.into();

        assert_eq!(email.subject, "Quarterly report");
        assert_eq!(email.from, "Ann <ann@example.com>");
        assert_eq!(email.body, "plain body");
        assert_eq!(email.labels, vec!["INBOX", "UNREAD"]);
        assert_eq!(
            email.received_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_falls_back_to_date_header() {
        let raw = serde_json::json!({
            "id": "m2",
            "payload": {
                "headers": [{"name": "Date", "value": "Wed, 1 May 2024 12:00:00 +0200"}],
                "body": {"data": b64("single part")}
            }
        });
        let email: EmailMessage = serde_json::from_value::<GmailMessage>(raw).unwrap().into();
        assert_eq!(email.body, "single part");
        assert_eq!(
            email.received_at,
            Some(Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(email.subject, "");
    }

    #[tokio::test]
    async fn test_get_unread_messages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .and(query_param("q", "is:unread"))
            .and(query_param("maxResults", "50"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "messages": [{"id": "a", "threadId": "ta"}, {"id": "b", "threadId": "tb"}],
                "resultSizeEstimate": 2
            })))
            .mount(&server)
            .await;
        for id in ["a", "b"] {
            Mock::given(method("GET"))
                .and(path(format!("/messages/{id}")))
                .and(query_param("format", "full"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "id": id,
                    "threadId": format!("t{id}"),
                    "snippet": format!("snippet {id}"),
                    "payload": {"headers": [{"name": "Subject", "value": format!("S-{id}")}]}
                })))
                .mount(&server)
                .await;
        }

        let emails = client_for(&server).get_unread_messages().await.unwrap();
        let subjects: Vec<&str> = emails.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["S-a", "S-b"]);
        assert_eq!(emails[1].thread_id, "tb");
    }

    #[tokio::test]
    async fn test_empty_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"resultSizeEstimate": 0})),
            )
            .mount(&server)
            .await;

        let emails = client_for(&server).get_messages(10, None).await.unwrap();
        assert!(emails.is_empty());
    }

    #[tokio::test]
    async fn test_create_label_with_color() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/labels"))
            .and(body_json(serde_json::json!({
                "name": "to_respond",
                "messageListVisibility": "show",
                "labelListVisibility": "labelShow",
                "color": {"backgroundColor": "#fb4c2f", "textColor": "#ffffff"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "Label_9", "name": "to_respond", "type": "user"
            })))
            .mount(&server)
            .await;

        let label = client_for(&server)
            .create_label("to_respond", Some("#fb4c2f"))
            .await
            .unwrap();
        assert_eq!(label.id, "Label_9");
        assert_eq!(label.kind.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn test_get_or_create_uses_existing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "labels": [
                    {"id": "INBOX", "name": "INBOX", "type": "system"},
                    {"id": "Label_3", "name": "fyi", "type": "user"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/labels"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let label = client_for(&server).get_or_create_label("fyi", None).await.unwrap();
        assert_eq!(label.id, "Label_3");
    }

    #[tokio::test]
    async fn test_add_and_remove_label() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages/m1/modify"))
            .and(body_json(serde_json::json!({"addLabelIds": ["Label_3"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/messages/m1/modify"))
            .and(body_json(serde_json::json!({"removeLabelIds": ["Label_3"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "m1"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let label = EmailLabel::new("Label_3", "fyi");
        client.add_label_to_message("m1", &label).await.unwrap();
        client.remove_label_from_message("m1", &label).await.unwrap();
    }

    #[tokio::test]
    async fn test_insufficient_scope_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/labels"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {
                    "code": 403,
                    "message": "Request had insufficient authentication scopes.",
                    "status": "PERMISSION_DENIED"
                }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server).get_labels().await.unwrap_err();
        assert!(matches!(err, MailError::InsufficientScope(_)));
    }

    #[tokio::test]
    async fn test_watch_and_stop() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/watch"))
            .and(body_json(serde_json::json!({
                "topicName": "projects/p/topics/mail",
                "labelIds": ["INBOX"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "historyId": "1234",
                "expiration": "1714600000000"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/stop"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let watch = client.watch("projects/p/topics/mail").await.unwrap();
        assert_eq!(watch.history_id, "1234");
        client.stop().await.unwrap();
    }
}
