//! LLM-backed categorizer: asks the model which action label fits an email.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use mailsort_core::config::schema::LlmConfig;
use mailsort_core::config::{LabelsConfigManager, LabelsConfiguration};
use mailsort_core::types::{EmailMessage, Message};
use mailsort_providers::{LlmProvider, LlmRequestConfig};

use crate::keyword::best_label_for;

/// Confidence reported for every fallback decision.
pub const FALLBACK_CONFIDENCE: f64 = 0.1;

const UNKNOWN_LABEL: &str = "unknown";

/// The model's verdict for one email.
#[derive(Clone, Debug, PartialEq)]
pub struct LabelDecision {
    pub label: String,
    pub confidence: f64,
    pub reasoning: String,
}

#[derive(Clone, Debug)]
pub struct LlmCategorizedEmail {
    pub email: EmailMessage,
    pub label: String,
    pub confidence: f64,
    pub reasoning: String,
}

/// Render an email as the text block embedded in the prompt.
pub fn format_email_for_llm(email: &EmailMessage, body_limit: usize) -> String {
    let mut out = format!(
        "Subject: {}\nFrom: {}\nTo: {}\nDate: {}\n\nPreview: {}\n\n",
        email.subject, email.from, email.to, email.date, email.snippet
    );
    if !email.body.is_empty() {
        let truncated: String = email.body.chars().take(body_limit).collect();
        out.push_str("Body: ");
        out.push_str(&truncated);
        if email.body.chars().count() > body_limit {
            out.push_str("...");
        }
    }
    out
}

pub fn build_prompt(
    email_content: &str,
    labels: &[String],
    prompts: &HashMap<String, String>,
) -> String {
    let label_lines = labels
        .iter()
        .map(|label| {
            let prompt = prompts
                .get(label)
                .map(String::as_str)
                .filter(|p| !p.is_empty())
                .unwrap_or("No description provided");
            format!("- {label}: {prompt}")
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are an expert email categorization assistant that helps organize emails based on what action is needed. Your job is to categorize emails based on what the recipient should DO with them, not just their content topic.

Email Content:
{email_content}

Available Categories:
{label_lines}

IMPORTANT CATEGORIZATION GUIDELINES:
- Focus on ACTION REQUIRED rather than just topic
- "to_respond" = Someone is asking me something or needs my input
- "fyi" = Important to know but no response needed
- "comment" = Collaborative tool notifications (Google Docs, Slack, etc.)
- "notification" = System/app automated updates
- "meeting_update" = Anything calendar/meeting related
- "awaiting_reply" = I'm waiting for someone else's response
- "actioned" = Issue is resolved/completed
- "marketing" = Promotional/sales content

Please respond with a JSON object containing:
- "label": the most appropriate category from the list above
- "confidence": a number between 0 and 1 indicating your confidence
- "reasoning": a brief explanation focusing on what action is needed

Response format:
{{
  "label": "selected_label",
  "confidence": 0.95,
  "reasoning": "Brief explanation here"
}}"#
    )
}

/// Extract the JSON object spanning the first `{` to the last `}` of a reply.
///
/// `None` when there is no object or it has no string `label`. A missing
/// confidence reads as 0.5. Confidence is clamped to `[0, 1]`.
pub fn parse_llm_reply(text: &str) -> Option<LabelDecision> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    let value: Value = serde_json::from_str(&text[start..=end]).ok()?;

    let label = value.get("label")?.as_str()?.trim().to_string();
    if label.is_empty() {
        return None;
    }
    let confidence = match value.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.5),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.5),
        _ => 0.5,
    };
    let reasoning = value
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    Some(LabelDecision {
        label,
        confidence: confidence.clamp(0.0, 1.0),
        reasoning,
    })
}

pub struct LlmCategorizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    request_config: LlmRequestConfig,
    request_delay: Duration,
    body_char_limit: usize,
    labels: RwLock<Arc<LabelsConfiguration>>,
    labels_source: Option<LabelsConfigManager>,
}

impl LlmCategorizer {
    /// An empty `config.model` means the provider's default model.
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        config: &LlmConfig,
        labels: LabelsConfiguration,
    ) -> Self {
        let model = if config.model.trim().is_empty() {
            provider.default_model().to_string()
        } else {
            config.model.clone()
        };
        Self {
            provider,
            model,
            request_config: LlmRequestConfig::from(config),
            request_delay: Duration::from_millis(config.request_delay_ms),
            body_char_limit: config.body_char_limit,
            labels: RwLock::new(Arc::new(labels)),
            labels_source: None,
        }
    }

    /// Re-read labels from `manager` whenever [`reload_labels`](Self::reload_labels)
    /// runs, so edits to `labels.json` reach long-running modes.
    pub fn with_labels_source(mut self, manager: LabelsConfigManager) -> Self {
        self.labels_source = Some(manager);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Snapshot of the labels in use.
    pub fn labels(&self) -> Arc<LabelsConfiguration> {
        let guard = self.labels.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    pub fn set_labels(&self, labels: LabelsConfiguration) {
        let mut guard = self.labels.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(labels);
    }

    /// Load the labels source again, if one is attached.
    pub fn reload_labels(&self) {
        if let Some(manager) = &self.labels_source {
            let labels = manager.load();
            debug!(count = labels.labels.len(), path = %manager.path().display(), "labels reloaded");
            self.set_labels(labels);
        }
    }

    fn fallback_label(labels: &LabelsConfiguration) -> String {
        labels
            .labels
            .first()
            .map(|l| l.name.clone())
            .unwrap_or_else(|| UNKNOWN_LABEL.to_string())
    }

    /// Ask the model for one email. Never fails: errors become low-confidence
    /// fallbacks so a batch always labels every message.
    pub async fn decide(&self, email: &EmailMessage) -> LabelDecision {
        let labels = self.labels();
        let available = labels.available_labels();
        let prompt = build_prompt(
            &format_email_for_llm(email, self.body_char_limit),
            &available,
            &labels.label_prompts(),
        );

        let response = self
            .provider
            .chat(&[Message::user(prompt)], &self.model, &self.request_config)
            .await;

        if response.is_error() {
            warn!(
                email_id = %email.id,
                provider = self.provider.display_name(),
                error = response.content.as_deref().unwrap_or(""),
                "LLM call failed"
            );
            return LabelDecision {
                label: Self::fallback_label(&labels),
                confidence: FALLBACK_CONFIDENCE,
                reasoning: "LLM service error".to_string(),
            };
        }

        let text = response.content.unwrap_or_default();
        let Some(decision) = parse_llm_reply(&text) else {
            warn!(email_id = %email.id, reply = %text, "unparseable LLM reply");
            return LabelDecision {
                label: Self::fallback_label(&labels),
                confidence: FALLBACK_CONFIDENCE,
                reasoning: "Failed to parse LLM response".to_string(),
            };
        };

        if labels.get(&decision.label).is_some() {
            return decision;
        }

        let replacement =
            best_label_for(email, &labels).unwrap_or_else(|| Self::fallback_label(&labels));
        warn!(
            email_id = %email.id,
            returned = %decision.label,
            replacement = %replacement,
            "LLM returned an unknown label"
        );
        LabelDecision {
            label: replacement,
            confidence: decision.confidence.min(FALLBACK_CONFIDENCE),
            reasoning: decision.reasoning,
        }
    }

    pub async fn categorize_email(&self, email: EmailMessage) -> LlmCategorizedEmail {
        let decision = self.decide(&email).await;
        debug!(
            email_id = %email.id,
            label = %decision.label,
            confidence = decision.confidence,
            "email categorized"
        );
        LlmCategorizedEmail {
            email,
            label: decision.label,
            confidence: decision.confidence,
            reasoning: decision.reasoning,
        }
    }

    /// Categorize sequentially, pausing between calls. Output order matches input.
    pub async fn categorize_emails(&self, emails: Vec<EmailMessage>) -> Vec<LlmCategorizedEmail> {
        let total = emails.len();
        let mut results = Vec::with_capacity(total);
        for (i, email) in emails.into_iter().enumerate() {
            results.push(self.categorize_email(email).await);
            if i + 1 < total && !self.request_delay.is_zero() {
                tokio::time::sleep(self.request_delay).await;
            }
        }
        results
    }
}

pub fn group_by_label(
    items: Vec<LlmCategorizedEmail>,
) -> BTreeMap<String, Vec<LlmCategorizedEmail>> {
    let mut grouped: BTreeMap<String, Vec<LlmCategorizedEmail>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.label.clone()).or_default().push(item);
    }
    grouped
}

pub fn label_stats(items: &[LlmCategorizedEmail]) -> BTreeMap<String, usize> {
    let mut stats = BTreeMap::new();
    for item in items {
        *stats.entry(item.label.clone()).or_insert(0) += 1;
    }
    stats
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use async_trait::async_trait;
    use mailsort_core::types::LlmResponse;
    use std::sync::Mutex;

    /// Replies with canned responses in order, then a fixed `fyi` verdict.
    pub struct ScriptedProvider {
        pub responses: Mutex<Vec<LlmResponse>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedProvider {
        pub fn new(responses: Vec<LlmResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| LlmResponse::text(*t, None)).collect())
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedProvider {
        async fn chat(
            &self,
            messages: &[Message],
            _model: &str,
            _config: &LlmRequestConfig,
        ) -> LlmResponse {
            self.prompts
                .lock()
                .unwrap()
                .push(messages[0].content().to_string());
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                LlmResponse::text(
                    r#"{"label":"fyi","confidence":0.6,"reasoning":"default"}"#,
                    None,
                )
            } else {
                responses.remove(0)
            }
        }

        fn default_model(&self) -> &str {
            "scripted-model"
        }

        fn display_name(&self) -> &str {
            "Scripted"
        }
    }

    pub fn no_delay_config() -> LlmConfig {
        LlmConfig {
            request_delay_ms: 0,
            ..LlmConfig::default()
        }
    }

    pub fn email(id: &str, subject: &str) -> EmailMessage {
        EmailMessage {
            id: id.into(),
            thread_id: id.into(),
            subject: subject.into(),
            from: "Ann <ann@example.com>".into(),
            ..Default::default()
        }
    }
}
