//! Utility helpers: data paths, date parsing, sender/subject formatting.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::types::EmailMessage;

/// Env var that relocates the data directory (handy for tests and containers).
pub const HOME_ENV: &str = "MAILSORT_HOME";

/// Get the mailsort data directory (e.g. `~/.mailsort/`).
pub fn get_data_path() -> PathBuf {
    if let Ok(dir) = std::env::var(HOME_ENV) {
        if !dir.trim().is_empty() {
            return expand_home(dir.trim());
        }
    }
    let home = dirs_next::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".mailsort")
}

/// Get current ISO 8601 timestamp.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Expand `~` to the home directory in a path string.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs_next::home_dir() {
            return home.join(rest);
        }
    }
    if path == "~" {
        if let Some(home) = dirs_next::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Parse a provider date string.
///
/// Accepts RFC 3339 (Graph `receivedDateTime`) and RFC 2822 (the `Date:`
/// header). Trailing comments such as `(UTC)` are tolerated.
pub fn parse_email_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // "Tue, 1 Jul 2003 10:52:37 +0200 (CEST)"
    let without_comment = match raw.find(" (") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    DateTime::parse_from_rfc2822(without_comment)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// `"Jane Doe <jane@example.com>"` → `"jane@example.com"`.
pub fn extract_email_address(full: &str) -> String {
    match (full.find('<'), full.rfind('>')) {
        (Some(start), Some(end)) if end > start + 1 => full[start + 1..end].to_string(),
        _ => full.to_string(),
    }
}

/// `"\"Jane Doe\" <jane@example.com>"` → `"Jane Doe"`.
pub fn extract_name(full: &str) -> String {
    match full.find('<') {
        Some(idx) if idx > 0 => {
            let name = full[..idx].trim().replace('"', "");
            if name.is_empty() {
                full.to_string()
            } else {
                name
            }
        }
        _ => full.to_string(),
    }
}

/// Human-friendly date, e.g. `"May 1, 2024, 12:05 PM"`.
/// Unparseable input is returned unchanged.
pub fn format_date(raw: &str) -> String {
    match parse_email_date(raw) {
        Some(dt) => dt.format("%b %-d, %Y, %I:%M %p").to_string(),
        None => raw.to_string(),
    }
}

/// Truncate to `max_len` characters and append `...` when something was cut.
/// Unicode-safe.
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() <= max_len {
        text.to_string()
    } else {
        let kept: String = text.chars().take(max_len).collect();
        format!("{kept}...")
    }
}

/// Sort newest first. Messages without a parseable date go last.
pub fn sort_emails_by_date(emails: &mut [EmailMessage]) {
    emails.sort_by(|a, b| b.received_at.cmp(&a.received_at));
}

/// `"meeting_update"` → `"MEETING UPDATE"`.
pub fn humanize_label(label: &str) -> String {
    label.replace('_', " ").to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_extract_email_address() {
        assert_eq!(
            extract_email_address("Jane Doe <jane@example.com>"),
            "jane@example.com"
        );
        assert_eq!(extract_email_address("jane@example.com"), "jane@example.com");
    }

    #[test]
    fn test_extract_name() {
        assert_eq!(extract_name("\"Jane Doe\" <jane@example.com>"), "Jane Doe");
        assert_eq!(extract_name("Bob <bob@example.com>"), "Bob");
        assert_eq!(extract_name("bob@example.com"), "bob@example.com");
        assert_eq!(extract_name("<bob@example.com>"), "<bob@example.com>");
    }

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello", 5), "hello");
    }

    #[test]
    fn test_truncate_long() {
        assert_eq!(truncate_text("hello world", 5), "hello...");
    }

    #[test]
    fn test_truncate_unicode() {
        assert_eq!(truncate_text("こんにちは世界", 2), "こん...");
    }

    #[test]
    fn test_parse_rfc2822_and_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        assert_eq!(parse_email_date("Wed, 1 May 2024 12:00:00 +0200"), Some(expected));
        assert_eq!(parse_email_date("2024-05-01T10:00:00Z"), Some(expected));
        assert_eq!(
            parse_email_date("Wed, 1 May 2024 10:00:00 +0000 (UTC)"),
            Some(expected)
        );
        assert_eq!(parse_email_date("yesterday"), None);
        assert_eq!(parse_email_date(""), None);
    }

    #[test]
    fn test_format_date() {
        assert_eq!(format_date("2024-05-01T12:05:00Z"), "May 1, 2024, 12:05 PM");
        assert_eq!(format_date("not a date"), "not a date");
    }

    #[test]
    fn test_sort_emails_by_date() {
        let at = |h| Some(Utc.with_ymd_and_hms(2024, 5, 1, h, 0, 0).unwrap());
        let mut emails = vec![
            EmailMessage { id: "old".into(), received_at: at(8), ..Default::default() },
            EmailMessage { id: "none".into(), received_at: None, ..Default::default() },
            EmailMessage { id: "new".into(), received_at: at(11), ..Default::default() },
        ];
        sort_emails_by_date(&mut emails);
        let ids: Vec<&str> = emails.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "none"]);
    }

    #[test]
    fn test_humanize_label() {
        assert_eq!(humanize_label("meeting_update"), "MEETING UPDATE");
        assert_eq!(humanize_label("fyi"), "FYI");
    }

    #[test]
    fn test_expand_home_absolute() {
        assert_eq!(expand_home("/absolute/path"), PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_timestamp_is_valid() {
        chrono::DateTime::parse_from_rfc3339(&timestamp()).unwrap();
    }
}
