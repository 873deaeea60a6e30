//! Monitor state: the persisted last-check instant and the status snapshot.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use mailsort_core::config::schema::MonitoringConfig;

/// File name of the last-check marker inside the data directory.
pub const LAST_CHECK_FILE: &str = ".last-email-check";

/// How far back the first check looks when no marker exists.
pub const INITIAL_LOOKBACK_MINUTES: i64 = 60;

/// The RFC 3339 instant of the previous check, kept in a small text file.
#[derive(Clone, Debug)]
pub struct LastCheckStore {
    path: PathBuf,
}

impl LastCheckStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(LAST_CHECK_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or unparseable.
    pub fn load(&self) -> Option<DateTime<Utc>> {
        let raw = std::fs::read_to_string(&self.path).ok()?;
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "ignoring unparseable last-check marker");
                None
            }
        }
    }

    /// Previous check instant, or `now - 1h` on first run.
    pub fn since(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.load()
            .unwrap_or(now - Duration::minutes(INITIAL_LOOKBACK_MINUTES))
    }

    pub fn save(&self, at: DateTime<Utc>) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, at.to_rfc3339())
    }
}

/// Snapshot returned by `EmailMonitor::status`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatus {
    pub is_running: bool,
    /// Only known while running.
    pub next_check: Option<DateTime<Utc>>,
    pub last_check: Option<DateTime<Utc>>,
    pub config: MonitoringConfig,
}
