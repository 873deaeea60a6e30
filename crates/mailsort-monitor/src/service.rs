//! Polling monitor: periodically labels mail that arrived since the last check.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use mailsort_core::config::schema::MonitoringConfig;
use mailsort_core::utils::humanize_label;
use mailsort_mail::MailClient;
use mailsort_triage::{process_recent, LlmCategorizer, ProcessSummary};

use crate::types::{LastCheckStore, MonitorStatus};

const NO_CHECK: i64 = i64::MIN;

pub struct EmailMonitor {
    client: Arc<dyn MailClient>,
    categorizer: Arc<LlmCategorizer>,
    config: MonitoringConfig,
    store: LastCheckStore,
    period: Duration,
    running: AtomicBool,
    /// Start of the most recent check, epoch ms.
    last_check_ms: AtomicI64,
    shutdown: Notify,
}

impl EmailMonitor {
    /// The last-check marker lives in `data_dir`.
    pub fn new(
        client: Arc<dyn MailClient>,
        categorizer: Arc<LlmCategorizer>,
        config: MonitoringConfig,
        data_dir: &Path,
    ) -> Self {
        let period = Duration::from_secs(config.poll_interval.max(1) * 60);
        Self {
            client,
            categorizer,
            config,
            store: LastCheckStore::in_dir(data_dir),
            period,
            running: AtomicBool::new(false),
            last_check_ms: AtomicI64::new(NO_CHECK),
            shutdown: Notify::new(),
        }
    }

    /// Override the poll period derived from `poll_interval`.
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run an initial check, then one per period until [`stop`](Self::stop).
    ///
    /// Returns immediately if the monitor is already running.
    pub async fn start(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            info!("email monitor is already running");
            return;
        }

        info!(
            poll_interval_min = self.config.poll_interval,
            max_per_check = self.config.max_emails_per_check,
            "email monitor started"
        );
        self.check_for_new_emails().await;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.period) => {
                    self.check_for_new_emails().await;
                }
                _ = self.shutdown.notified() => {
                    info!("email monitor stopped");
                    return;
                }
            }
        }
    }

    /// Ask a running loop to exit. A check in progress finishes first.
    pub fn stop(&self) {
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("stopping email monitor");
            // notify_one keeps a permit if the loop is mid-check
            self.shutdown.notify_one();
        }
    }

    /// One pass: label messages received since the previous check.
    ///
    /// Never fails. A fetch error is logged, yields an empty summary and
    /// leaves the marker untouched so the next pass retries the same window.
    pub async fn check_for_new_emails(&self) -> ProcessSummary {
        let started = Utc::now();
        let since = self.store.since(started);
        if self.config.log_activity {
            info!(since = %since, "checking for new emails");
        }

        let fetch_limit = (self.config.max_emails_per_check * 2).min(u32::MAX as usize) as u32;
        let summary = match process_recent(
            self.client.as_ref(),
            &self.categorizer,
            fetch_limit,
            since,
            self.config.max_emails_per_check,
        )
        .await
        {
            Ok(summary) => summary,
            Err(e) => {
                error!(error = %e, "failed to fetch recent emails");
                return ProcessSummary::default();
            }
        };

        self.last_check_ms
            .store(started.timestamp_millis(), Ordering::SeqCst);
        if let Err(e) = self.store.save(started) {
            warn!(path = %self.store.path().display(), error = %e, "failed to record check time");
        }

        if summary.processed == 0 {
            if self.config.log_activity {
                info!("no new emails");
            }
        } else {
            for (label, count) in &summary.stats {
                info!(label = %humanize_label(label), count, "new emails labelled");
            }
            for failed in summary.outcomes.iter().filter(|o| !o.is_ok()) {
                warn!(label = %failed.label, error = failed.error.as_deref().unwrap_or(""), "label not applied");
            }
        }
        debug!(next_check = ?self.next_check(), "check finished");
        summary
    }

    fn last_check(&self) -> Option<DateTime<Utc>> {
        match self.last_check_ms.load(Ordering::SeqCst) {
            NO_CHECK => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    fn next_check(&self) -> Option<DateTime<Utc>> {
        if !self.is_running() {
            return None;
        }
        let period = chrono::Duration::from_std(self.period).ok()?;
        Some(self.last_check().unwrap_or_else(Utc::now) + period)
    }

    pub fn status(&self) -> MonitorStatus {
        MonitorStatus {
            is_running: self.is_running(),
            next_check: self.next_check(),
            last_check: self.last_check(),
            config: self.config.clone(),
        }
    }
}
