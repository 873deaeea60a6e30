//! Action labels: the set of categories the LLM may assign.
//!
//! Stored as `labels.json` in the data directory. A missing or invalid file
//! falls back to the built-in set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// One user-defined label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelConfig {
    pub name: String,
    /// Instruction shown to the LLM for this label.
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

impl LabelConfig {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
            description: None,
            examples: Vec::new(),
        }
    }

    fn builtin(name: &str, prompt: &str, description: &str, examples: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            prompt: prompt.to_string(),
            description: Some(description.to_string()),
            examples: examples.iter().map(|e| e.to_string()).collect(),
        }
    }
}

/// The whole `labels.json` document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LabelsConfiguration {
    pub labels: Vec<LabelConfig>,
}

impl Default for LabelsConfiguration {
    fn default() -> Self {
        Self {
            labels: vec![
                LabelConfig::builtin(
                    "to_respond",
                    "Emails that require a response from me: questions directed at me, requests for information, decisions needed, or conversations where I need to reply",
                    "Emails you need to respond to",
                    &["Direct questions to me", "Requests for decisions", "Meeting invitations needing RSVP", "Client inquiries"],
                ),
                LabelConfig::builtin(
                    "fyi",
                    "Important informational emails that don't require my response but are important for me to know: updates, announcements, or information relevant to my work or interests",
                    "Emails that don't require your response, but are important",
                    &["Project updates", "Company announcements", "Policy changes", "Important news"],
                ),
                LabelConfig::builtin(
                    "comment",
                    "Collaborative communications from team tools like comments in Google Docs, Microsoft Office, Slack notifications, or other team collaboration platforms",
                    "Team chats in tools like Google Docs or Microsoft Office",
                    &["Google Docs comments", "Office 365 comments", "Slack notifications", "Team collaboration updates"],
                ),
                LabelConfig::builtin(
                    "notification",
                    "Automated updates and notifications from tools, services, and platforms I use: system notifications, app updates, service alerts",
                    "Automated updates from tools you use",
                    &["GitHub notifications", "App updates", "Service alerts", "System notifications", "Backup reports"],
                ),
                LabelConfig::builtin(
                    "meeting_update",
                    "Calendar and meeting-related updates from platforms like Zoom, Google Meet, Microsoft Teams, calendar invitations, meeting reminders, or scheduling changes",
                    "Calendar updates from Zoom, Google Meet, etc",
                    &["Zoom meeting links", "Calendar invitations", "Meeting reminders", "Schedule changes", "Meeting recordings"],
                ),
                LabelConfig::builtin(
                    "awaiting_reply",
                    "Emails where I'm expecting a response: follow-ups to my previous emails, replies to questions I asked, or confirmations I'm waiting for",
                    "Emails you're expecting a reply to",
                    &["Replies to my questions", "Confirmations I requested", "Follow-up responses", "Pending approvals"],
                ),
                LabelConfig::builtin(
                    "actioned",
                    "Email threads that have been resolved, completed, or no longer need attention: confirmations of completed tasks, resolved issues, or closed conversations",
                    "Email threads that have been resolved",
                    &["Task completion confirmations", "Issue resolved notifications", "Completed project updates", "Closed tickets"],
                ),
                LabelConfig::builtin(
                    "marketing",
                    "Marketing emails, promotional content, cold emails, newsletters from companies trying to sell products or services, or unsolicited business communications",
                    "Marketing or cold emails",
                    &["Product promotions", "Sales pitches", "Cold outreach", "Marketing newsletters", "Advertising emails"],
                ),
            ],
        }
    }
}

impl LabelsConfiguration {
    /// Label names in configured order.
    pub fn available_labels(&self) -> Vec<String> {
        self.labels.iter().map(|l| l.name.clone()).collect()
    }

    pub fn label_prompts(&self) -> HashMap<String, String> {
        self.labels
            .iter()
            .map(|l| (l.name.clone(), l.prompt.clone()))
            .collect()
    }

    /// Short descriptions for display; the prompt stands in when a label has none.
    pub fn label_descriptions(&self) -> HashMap<String, String> {
        self.labels
            .iter()
            .map(|l| {
                let desc = l.description.clone().unwrap_or_else(|| l.prompt.clone());
                (l.name.clone(), desc)
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&LabelConfig> {
        self.labels.iter().find(|l| l.name == name)
    }

    pub fn add_label(&mut self, label: LabelConfig) -> Result<()> {
        if label.name.trim().is_empty() {
            bail!("label name must not be empty");
        }
        if self.get(&label.name).is_some() {
            bail!("label '{}' already exists", label.name);
        }
        self.labels.push(label);
        Ok(())
    }

    /// Returns `false` when no label had that name.
    pub fn remove_label(&mut self, name: &str) -> bool {
        let before = self.labels.len();
        self.labels.retain(|l| l.name != name);
        self.labels.len() != before
    }

    /// Replace the label called `name`, keeping its position.
    pub fn update_label(&mut self, name: &str, updated: LabelConfig) -> bool {
        match self.labels.iter_mut().find(|l| l.name == name) {
            Some(slot) => {
                *slot = updated;
                true
            }
            None => false,
        }
    }
}

/// Loads and persists `labels.json`.
#[derive(Debug, Clone)]
pub struct LabelsConfigManager {
    path: PathBuf,
}

impl LabelsConfigManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Manager for `<data dir>/labels.json`.
    pub fn default_location() -> Self {
        Self::new(crate::utils::get_data_path().join("labels.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> LabelsConfiguration {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(_) => {
                info!(
                    path = %self.path.display(),
                    "no custom labels config found, using defaults"
                );
                return LabelsConfiguration::default();
            }
        };

        match serde_json::from_str::<LabelsConfiguration>(&content) {
            Ok(config) if !config.labels.is_empty() => {
                debug!(count = config.labels.len(), "loaded labels config");
                config
            }
            Ok(_) => {
                warn!(path = %self.path.display(), "labels config is empty, using defaults");
                LabelsConfiguration::default()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "invalid labels config, using defaults");
                LabelsConfiguration::default()
            }
        }
    }

    pub fn save(&self, config: &LabelsConfiguration) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    /// Write the built-in labels unless a file is already present.
    /// Returns `true` when a file was created.
    pub fn create_default(&self) -> Result<bool> {
        if self.path.exists() {
            return Ok(false);
        }
        self.save(&LabelsConfiguration::default())?;
        info!(path = %self.path.display(), "default labels config created");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_labels() {
        let config = LabelsConfiguration::default();
        assert_eq!(
            config.available_labels(),
            vec![
                "to_respond",
                "fyi",
                "comment",
                "notification",
                "meeting_update",
                "awaiting_reply",
                "actioned",
                "marketing"
            ]
        );
        assert!(config.labels.iter().all(|l| !l.examples.is_empty()));
    }

    #[test]
    fn test_descriptions_fall_back_to_prompt() {
        let mut config = LabelsConfiguration::default();
        config
            .add_label(LabelConfig::new("receipts", "Purchase receipts"))
            .unwrap();

        let descriptions = config.label_descriptions();
        assert_eq!(descriptions["receipts"], "Purchase receipts");
        assert_eq!(descriptions["fyi"], "Emails that don't require your response, but are important");
        assert_eq!(config.label_prompts()["receipts"], "Purchase receipts");
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut config = LabelsConfiguration::default();
        let err = config
            .add_label(LabelConfig::new("fyi", "again"))
            .unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(config.labels.len(), 8);
    }

    #[test]
    fn test_remove_and_update() {
        let mut config = LabelsConfiguration::default();
        assert!(config.remove_label("marketing"));
        assert!(!config.remove_label("marketing"));
        assert_eq!(config.labels.len(), 7);

        assert!(config.update_label("fyi", LabelConfig::new("info", "Just info")));
        assert_eq!(config.labels[1].name, "info");
        assert!(!config.update_label("missing", LabelConfig::new("x", "y")));
    }

    #[test]
    fn test_load_missing_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LabelsConfigManager::new(dir.path().join("labels.json"));
        assert_eq!(manager.load(), LabelsConfiguration::default());
    }

    #[test]
    fn test_load_invalid_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.json");
        std::fs::write(&path, "{ not json").unwrap();
        let manager = LabelsConfigManager::new(&path);
        assert_eq!(manager.load().labels.len(), 8);
    }

    #[test]
    fn test_save_and_reload_custom() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LabelsConfigManager::new(dir.path().join("labels.json"));

        let config = LabelsConfiguration {
            labels: vec![LabelConfig::new("urgent", "Needs attention today")],
        };
        manager.save(&config).unwrap();

        let reloaded = manager.load();
        assert_eq!(reloaded.available_labels(), vec!["urgent"]);
        assert!(reloaded.labels[0].description.is_none());
    }

    #[test]
    fn test_create_default_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let manager = LabelsConfigManager::new(dir.path().join("labels.json"));

        assert!(manager.create_default().unwrap());
        let custom = LabelsConfiguration {
            labels: vec![LabelConfig::new("only", "one")],
        };
        manager.save(&custom).unwrap();

        assert!(!manager.create_default().unwrap());
        assert_eq!(manager.load(), custom);
    }
}
