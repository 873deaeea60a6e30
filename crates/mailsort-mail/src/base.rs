//! MailClient trait: the provider-neutral interface over Gmail and Outlook.
//!
//! Triage, the monitor and the webhook server only ever hold an
//! `Arc<dyn MailClient>`.

use std::time::Duration;

use async_trait::async_trait;
use mailsort_core::types::{EmailLabel, EmailMessage, EmailProvider};
use tracing::debug;

use crate::error::MailResult;

/// Page size used by the convenience listings.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

#[async_trait]
pub trait MailClient: Send + Sync {
    fn provider(&self) -> EmailProvider;

    /// Pause between consecutive writes in [`MailClient::add_label_to_messages`].
    fn label_write_delay(&self) -> Duration;

    /// Authenticate eagerly so auth prompts happen before any real work.
    async fn initialize(&self) -> MailResult<()>;

    /// Most recent messages first, optionally filtered by a provider query
    /// (Gmail search syntax or a Graph `$filter`).
    async fn get_messages(&self, max_results: u32, query: Option<&str>)
        -> MailResult<Vec<EmailMessage>>;

    async fn get_unread_messages(&self) -> MailResult<Vec<EmailMessage>>;

    async fn get_messages_by_label(&self, label_name: &str) -> MailResult<Vec<EmailMessage>>;

    async fn get_labels(&self) -> MailResult<Vec<EmailLabel>>;

    async fn create_label(&self, name: &str, color: Option<&str>) -> MailResult<EmailLabel>;

    async fn get_label_by_name(&self, name: &str) -> MailResult<Option<EmailLabel>> {
        let labels = self.get_labels().await?;
        Ok(labels.into_iter().find(|l| l.name == name))
    }

    async fn add_label_to_message(&self, message_id: &str, label: &EmailLabel) -> MailResult<()>;

    /// Label each message in turn, pausing between writes.
    async fn add_label_to_messages(
        &self,
        message_ids: &[String],
        label: &EmailLabel,
    ) -> MailResult<()> {
        let delay = self.label_write_delay();
        for id in message_ids {
            self.add_label_to_message(id, label).await?;
            tokio::time::sleep(delay).await;
        }
        debug!(label = %label.name, count = message_ids.len(), "labels applied");
        Ok(())
    }

    async fn remove_label_from_message(
        &self,
        message_id: &str,
        label: &EmailLabel,
    ) -> MailResult<()>;

    async fn get_or_create_label(&self, name: &str, color: Option<&str>) -> MailResult<EmailLabel> {
        match self.get_label_by_name(name).await? {
            Some(label) => Ok(label),
            None => self.create_label(name, color).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory client recording label writes.
    #[derive(Default)]
    pub struct MockMailClient {
        pub labels: Mutex<Vec<EmailLabel>>,
        pub applied: Mutex<Vec<(String, String)>>,
        pub created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MailClient for MockMailClient {
        fn provider(&self) -> EmailProvider {
            EmailProvider::Gmail
        }

        fn label_write_delay(&self) -> Duration {
            Duration::ZERO
        }

        async fn initialize(&self) -> MailResult<()> {
            Ok(())
        }

        async fn get_messages(
            &self,
            _max_results: u32,
            _query: Option<&str>,
        ) -> MailResult<Vec<EmailMessage>> {
            Ok(Vec::new())
        }

        async fn get_unread_messages(&self) -> MailResult<Vec<EmailMessage>> {
            Ok(Vec::new())
        }

        async fn get_messages_by_label(&self, _label_name: &str) -> MailResult<Vec<EmailMessage>> {
            Ok(Vec::new())
        }

        async fn get_labels(&self) -> MailResult<Vec<EmailLabel>> {
            Ok(self.labels.lock().unwrap().clone())
        }

        async fn create_label(&self, name: &str, _color: Option<&str>) -> MailResult<EmailLabel> {
            let label = EmailLabel::new(format!("Label_{name}"), name);
            self.labels.lock().unwrap().push(label.clone());
            self.created.lock().unwrap().push(name.to_string());
            Ok(label)
        }

        async fn add_label_to_message(
            &self,
            message_id: &str,
            label: &EmailLabel,
        ) -> MailResult<()> {
            self.applied
                .lock()
                .unwrap()
                .push((message_id.to_string(), label.id.clone()));
            Ok(())
        }

        async fn remove_label_from_message(
            &self,
            message_id: &str,
            label: &EmailLabel,
        ) -> MailResult<()> {
            self.applied
                .lock()
                .unwrap()
                .retain(|(m, l)| !(m == message_id && *l == label.id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_get_or_create_creates_once() {
        let client = MockMailClient::default();
        let first = client.get_or_create_label("fyi", None).await.unwrap();
        let second = client.get_or_create_label("fyi", None).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(*client.created.lock().unwrap(), vec!["fyi".to_string()]);
    }

    #[tokio::test]
    async fn test_add_label_to_messages_in_order() {
        let client = MockMailClient::default();
        let label = EmailLabel::new("Label_1", "to_respond");
        let ids = vec!["m1".to_string(), "m2".to_string()];
        client.add_label_to_messages(&ids, &label).await.unwrap();

        let applied = client.applied.lock().unwrap();
        assert_eq!(
            *applied,
            vec![
                ("m1".to_string(), "Label_1".to_string()),
                ("m2".to_string(), "Label_1".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_get_label_by_name_missing() {
        let client = MockMailClient::default();
        assert!(client.get_label_by_name("nope").await.unwrap().is_none());
    }
}
