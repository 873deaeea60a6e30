//! Push notification payloads: Gmail via Pub/Sub, Outlook via Graph.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;

/// Pub/Sub push envelope.
#[derive(Debug, Default, Deserialize)]
pub struct PubSubEnvelope {
    #[serde(default)]
    pub message: Option<PubSubMessage>,
    #[serde(default)]
    pub subscription: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubMessage {
    /// Base64 JSON of [`GmailNotification`].
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// What Gmail publishes when the watched mailbox changes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GmailNotification {
    pub email_address: String,
    /// Sent as a number, occasionally as a string.
    pub history_id: serde_json::Value,
}

/// Decode the notification carried by a Pub/Sub push body.
pub fn decode_gmail_push(body: &[u8]) -> Result<GmailNotification, String> {
    let envelope: PubSubEnvelope =
        serde_json::from_slice(body).map_err(|e| format!("invalid envelope: {e}"))?;
    let data = envelope
        .message
        .and_then(|m| m.data)
        .ok_or_else(|| "envelope has no message data".to_string())?;
    let raw = STANDARD
        .decode(data.trim())
        .map_err(|e| format!("invalid base64: {e}"))?;
    serde_json::from_slice(&raw).map_err(|e| format!("invalid notification: {e}"))
}

/// Graph change notification batch.
#[derive(Debug, Default, Deserialize)]
pub struct OutlookNotificationBatch {
    #[serde(default)]
    pub value: Vec<OutlookNotification>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlookNotification {
    #[serde(default)]
    pub subscription_id: Option<String>,
    #[serde(default)]
    pub client_state: Option<String>,
    #[serde(default)]
    pub change_type: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope(inner: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "message": {"data": STANDARD.encode(inner), "messageId": "1"},
            "subscription": "projects/p/subscriptions/s"
        }))
        .unwrap()
    }

    #[test]
    fn test_decode_gmail_push() {
        let body = envelope(r#"{"emailAddress":"me@example.com","historyId":9876}"#);
        let n = decode_gmail_push(&body).unwrap();
        assert_eq!(n.email_address, "me@example.com");
        assert_eq!(n.history_id, serde_json::json!(9876));
    }

    #[test]
    fn test_decode_gmail_push_errors() {
        assert!(decode_gmail_push(b"not json").unwrap_err().contains("envelope"));
        assert!(decode_gmail_push(b"{}").unwrap_err().contains("no message data"));
        assert!(decode_gmail_push(&envelope("plain text"))
            .unwrap_err()
            .contains("invalid notification"));
    }

    #[test]
    fn test_outlook_batch() {
        let batch: OutlookNotificationBatch = serde_json::from_str(
            r#"{"value":[{"subscriptionId":"s1","clientState":"k","changeType":"created","resource":"Users/x/Messages/y"}]}"#,
        )
        .unwrap();
        assert_eq!(batch.value.len(), 1);
        assert_eq!(batch.value[0].client_state.as_deref(), Some("k"));
        assert_eq!(batch.value[0].change_type.as_deref(), Some("created"));
    }
}
