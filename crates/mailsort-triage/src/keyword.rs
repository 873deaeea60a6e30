//! Keyword heuristics: a rule-based categorizer that needs no LLM.
//!
//! Also provides [`best_label_for`], which picks the configured label whose
//! name and examples best overlap an email. The LLM categorizer uses it when
//! the model answers with a label that does not exist.

use std::collections::BTreeMap;
use std::fmt;

use mailsort_core::config::LabelsConfiguration;
use mailsort_core::types::EmailMessage;

/// Minimum confidence kept by [`filter_by_confidence`] by default.
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.5;

const SPAM_CONFIDENCE: f64 = 0.9;
const SPAM_THRESHOLD: usize = 2;

const SPAM_INDICATORS: &[&str] = &[
    "urgent",
    "act now",
    "limited time",
    "click here",
    "free money",
    "winner",
    "congratulations",
    "lottery",
    "prince",
    "inheritance",
];

/// Topic categories. Declaration order is the tie-break order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EmailCategory {
    Work,
    Personal,
    Finance,
    Shopping,
    Social,
    Promotions,
    Spam,
    Newsletter,
    Other,
}

impl EmailCategory {
    pub const ALL: [EmailCategory; 9] = [
        EmailCategory::Work,
        EmailCategory::Personal,
        EmailCategory::Finance,
        EmailCategory::Shopping,
        EmailCategory::Social,
        EmailCategory::Promotions,
        EmailCategory::Spam,
        EmailCategory::Newsletter,
        EmailCategory::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EmailCategory::Work => "work",
            EmailCategory::Personal => "personal",
            EmailCategory::Finance => "finance",
            EmailCategory::Shopping => "shopping",
            EmailCategory::Social => "social",
            EmailCategory::Promotions => "promotions",
            EmailCategory::Spam => "spam",
            EmailCategory::Newsletter => "newsletter",
            EmailCategory::Other => "other",
        }
    }

    /// Keywords scored for this category. Personal, spam and other have
    /// none: spam is decided by [`SPAM_INDICATORS`], the other two are
    /// never picked by keyword ratio.
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            EmailCategory::Work => &[
                "meeting",
                "project",
                "deadline",
                "report",
                "presentation",
                "client",
                "proposal",
                "budget",
                "invoice",
                "contract",
            ],
            EmailCategory::Finance => &[
                "bank",
                "payment",
                "transaction",
                "credit",
                "debit",
                "account",
                "statement",
                "loan",
                "mortgage",
                "insurance",
            ],
            EmailCategory::Shopping => &[
                "order",
                "purchase",
                "receipt",
                "shipping",
                "delivery",
                "product",
                "cart",
                "checkout",
                "discount",
                "sale",
            ],
            EmailCategory::Social => &[
                "facebook",
                "twitter",
                "linkedin",
                "instagram",
                "notification",
                "friend",
                "follow",
                "like",
                "comment",
                "share",
            ],
            EmailCategory::Promotions => &[
                "offer",
                "deal",
                "discount",
                "sale",
                "promotion",
                "limited time",
                "special",
                "coupon",
                "save",
                "free",
            ],
            EmailCategory::Newsletter => &[
                "newsletter",
                "subscription",
                "unsubscribe",
                "weekly",
                "monthly",
                "digest",
                "update",
                "news",
            ],
            EmailCategory::Personal | EmailCategory::Spam | EmailCategory::Other => &[],
        }
    }
}

impl fmt::Display for EmailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct CategorizedEmail {
    pub email: EmailMessage,
    pub category: EmailCategory,
    pub confidence: f64,
    pub keywords: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordCategorizer;

impl KeywordCategorizer {
    pub fn new() -> Self {
        Self
    }

    pub fn categorize_email(&self, email: &EmailMessage) -> CategorizedEmail {
        let text = format!("{} {} {}", email.subject, email.snippet, email.from).to_lowercase();

        let mut best = (EmailCategory::Other, 0.0_f64, Vec::new());
        for category in EmailCategory::ALL {
            let keywords = category.keywords();
            if keywords.is_empty() {
                continue;
            }
            let matched: Vec<String> = keywords
                .iter()
                .filter(|k| text.contains(*k))
                .map(|k| k.to_string())
                .collect();
            if matched.is_empty() {
                continue;
            }
            let ratio = matched.len() as f64 / keywords.len() as f64;
            if ratio > best.1 {
                best = (category, ratio, matched);
            }
        }

        if is_spam(email) {
            best = (EmailCategory::Spam, SPAM_CONFIDENCE, vec!["spam".to_string()]);
        }

        CategorizedEmail {
            email: email.clone(),
            category: best.0,
            confidence: best.1,
            keywords: best.2,
        }
    }

    pub fn categorize_emails(&self, emails: &[EmailMessage]) -> Vec<CategorizedEmail> {
        emails.iter().map(|e| self.categorize_email(e)).collect()
    }
}

fn is_spam(email: &EmailMessage) -> bool {
    let text = format!("{} {}", email.subject, email.snippet).to_lowercase();
    SPAM_INDICATORS
        .iter()
        .filter(|indicator| text.contains(*indicator))
        .count()
        >= SPAM_THRESHOLD
}

pub fn group_by_category(
    items: &[CategorizedEmail],
) -> BTreeMap<EmailCategory, Vec<&CategorizedEmail>> {
    let mut grouped: BTreeMap<EmailCategory, Vec<&CategorizedEmail>> = BTreeMap::new();
    for item in items {
        grouped.entry(item.category).or_default().push(item);
    }
    grouped
}

/// Count per category. Every category is present, zero when unused.
pub fn summary_stats(items: &[CategorizedEmail]) -> BTreeMap<EmailCategory, usize> {
    let mut stats: BTreeMap<EmailCategory, usize> =
        EmailCategory::ALL.iter().map(|c| (*c, 0)).collect();
    for item in items {
        *stats.entry(item.category).or_insert(0) += 1;
    }
    stats
}

pub fn filter_by_confidence(items: &[CategorizedEmail], min: f64) -> Vec<&CategorizedEmail> {
    items.iter().filter(|i| i.confidence >= min).collect()
}

fn significant_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .map(str::to_lowercase)
}

/// Configured label that best overlaps the email's subject, preview,
/// sender and body. `None` when nothing overlaps.
pub fn best_label_for(email: &EmailMessage, labels: &LabelsConfiguration) -> Option<String> {
    let text = format!(
        "{} {} {} {}",
        email.subject, email.snippet, email.from, email.body
    )
    .to_lowercase();

    let mut best: Option<(&str, usize)> = None;
    for label in &labels.labels {
        let mut words: Vec<String> = label
            .name
            .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
            .filter(|w| w.len() >= 3)
            .map(str::to_lowercase)
            .collect();
        for example in &label.examples {
            words.extend(significant_words(example));
        }
        words.sort();
        words.dedup();

        let score = words.iter().filter(|w| text.contains(w.as_str())).count();
        if score > 0 && best.map_or(true, |(_, s)| score > s) {
            best = Some((&label.name, score));
        }
    }
    best.map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailsort_core::config::LabelConfig;

    fn email(subject: &str, snippet: &str, from: &str) -> EmailMessage {
        EmailMessage {
            id: subject.to_string(),
            subject: subject.into(),
            snippet: snippet.into(),
            from: from.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_work_email() {
        let result = KeywordCategorizer::new().categorize_email(&email(
            "Project meeting moved",
            "The deadline for the report is Friday",
            "boss@corp.com",
        ));
        assert_eq!(result.category, EmailCategory::Work);
        assert!((result.confidence - 0.4).abs() < 1e-9);
        assert_eq!(result.keywords, vec!["meeting", "project", "deadline", "report"]);
    }

    #[test]
    fn test_no_match_is_other() {
        let result = KeywordCategorizer::new().categorize_email(&email("Hi", "see you", "a@b.c"));
        assert_eq!(result.category, EmailCategory::Other);
        assert_eq!(result.confidence, 0.0);
        assert!(result.keywords.is_empty());
    }

    #[test]
    fn test_tie_keeps_earlier_category() {
        // one hit in shopping ("sale") and one in promotions ("sale")
        let result = KeywordCategorizer::new().categorize_email(&email("Big sale", "", "x@y.z"));
        assert_eq!(result.category, EmailCategory::Shopping);
    }

    #[test]
    fn test_spam_override() {
        let result = KeywordCategorizer::new().categorize_email(&email(
            "Congratulations WINNER",
            "project meeting",
            "x@y.z",
        ));
        assert_eq!(result.category, EmailCategory::Spam);
        assert_eq!(result.confidence, 0.9);
        assert_eq!(result.keywords, vec!["spam"]);
    }

    #[test]
    fn test_single_spam_indicator_is_not_spam() {
        let result = KeywordCategorizer::new().categorize_email(&email("Urgent", "", "x@y.z"));
        assert_ne!(result.category, EmailCategory::Spam);
    }

    #[test]
    fn test_summary_stats_zero_filled() {
        let c = KeywordCategorizer::new();
        let items = c.categorize_emails(&[
            email("bank statement", "", ""),
            email("hello", "", ""),
        ]);
        let stats = summary_stats(&items);
        assert_eq!(stats.len(), EmailCategory::ALL.len());
        assert_eq!(stats[&EmailCategory::Finance], 1);
        assert_eq!(stats[&EmailCategory::Other], 1);
        assert_eq!(stats[&EmailCategory::Spam], 0);
    }

    #[test]
    fn test_group_and_filter() {
        let c = KeywordCategorizer::new();
        let items = c.categorize_emails(&[
            email("act now, click here", "", ""),
            email("weekly newsletter", "", ""),
            email("nothing", "", ""),
        ]);
        let grouped = group_by_category(&items);
        assert_eq!(grouped[&EmailCategory::Spam].len(), 1);
        assert_eq!(grouped[&EmailCategory::Newsletter].len(), 1);
        assert!(!grouped.contains_key(&EmailCategory::Work));

        let confident = filter_by_confidence(&items, DEFAULT_MIN_CONFIDENCE);
        assert_eq!(confident.len(), 1);
        assert_eq!(confident[0].category, EmailCategory::Spam);
    }

    #[test]
    fn test_best_label_for_uses_names_and_examples() {
        let labels = LabelsConfiguration {
            labels: vec![
                LabelConfig::new("to_respond", "needs reply"),
                LabelConfig {
                    examples: vec!["Calendar invitation for standup".into()],
                    ..LabelConfig::new("meeting_update", "calendar things")
                },
            ],
        };
        let invite = email("Invitation: standup", "calendar", "cal@corp.com");
        assert_eq!(best_label_for(&invite, &labels).as_deref(), Some("meeting_update"));

        let respond = email("Please respond by Monday", "", "");
        assert_eq!(best_label_for(&respond, &labels).as_deref(), Some("to_respond"));

        assert!(best_label_for(&email("zzz", "", ""), &labels).is_none());
    }
}
