//! Axum server receiving Gmail and Outlook push notifications.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use mailsort_core::config::schema::WebhooksConfig;
use mailsort_mail::MailClient;
use mailsort_triage::{process_recent, LlmCategorizer, ProcessSummary};

use crate::notifications::{decode_gmail_push, OutlookNotificationBatch};
use crate::verify::{verify_client_state, verify_signature, SIGNATURE_HEADER};

pub const HEALTH_PATH: &str = "/health";
pub const GMAIL_PATH: &str = "/webhooks/gmail";
pub const OUTLOOK_PATH: &str = "/webhooks/outlook";

struct AppState {
    client: Arc<dyn MailClient>,
    categorizer: Arc<LlmCategorizer>,
    config: WebhooksConfig,
    /// Serializes processing runs.
    processing: Mutex<()>,
}

impl AppState {
    fn secret(&self) -> Option<&str> {
        self.config.secret.as_deref().filter(|s| !s.is_empty())
    }

    async fn process_new_emails(&self, source: &'static str) -> Option<ProcessSummary> {
        let _guard = self.processing.lock().await;
        let minutes = self.config.recent_window_minutes;
        let Some(since) = window_start(Utc::now(), minutes) else {
            error!(source, minutes, "recentWindowMinutes is out of range, skipping");
            return None;
        };

        match process_recent(
            self.client.as_ref(),
            &self.categorizer,
            self.config.fetch_limit,
            since,
            usize::MAX,
        )
        .await
        {
            Ok(summary) => {
                if summary.processed == 0 {
                    info!(source, "no new emails to process");
                } else {
                    info!(
                        source,
                        processed = summary.processed,
                        labels = ?summary.stats,
                        "processed new emails"
                    );
                }
                for failed in summary.outcomes.iter().filter(|o| !o.is_ok()) {
                    warn!(source, label = %failed.label, "label not applied");
                }
                Some(summary)
            }
            Err(e) => {
                error!(source, error = %e, "failed to process new emails");
                None
            }
        }
    }
}

/// Start of the look-back window, `None` when `minutes` does not fit a timestamp.
fn window_start(now: DateTime<Utc>, minutes: i64) -> Option<DateTime<Utc>> {
    Duration::try_minutes(minutes).and_then(|window| now.checked_sub_signed(window))
}

/// Run processing in the background so the HTTP reply does not wait on the LLM.
fn spawn_processing(state: &Arc<AppState>, source: &'static str) {
    let state = state.clone();
    tokio::spawn(async move {
        state.process_new_emails(source).await;
    });
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatus {
    pub is_running: bool,
    pub port: u16,
    pub endpoints: Vec<String>,
}

pub struct WebhookServer {
    state: Arc<AppState>,
    cancel: CancellationToken,
    running: AtomicBool,
}

impl WebhookServer {
    pub fn new(
        client: Arc<dyn MailClient>,
        categorizer: Arc<LlmCategorizer>,
        config: WebhooksConfig,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                client,
                categorizer,
                config,
                processing: Mutex::new(()),
            }),
            cancel: CancellationToken::new(),
            running: AtomicBool::new(false),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(health))
            .route(GMAIL_PATH, post(gmail_push))
            .route(OUTLOOK_PATH, post(outlook_notification).get(outlook_validation))
            .with_state(self.state.clone())
    }

    /// Token that stops the server when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Bind `host:port` and serve until [`stop`](Self::stop).
    pub async fn start(&self) -> Result<()> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind to {addr}"))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr().context("listener has no local address")?;
        info!(addr = %local, "webhook server listening");
        for endpoint in self.endpoints() {
            debug!(endpoint = %endpoint, "registered");
        }

        self.running.store(true, Ordering::SeqCst);
        let cancel = self.cancel.clone();
        let result = axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await
            .context("webhook server error");
        self.running.store(false, Ordering::SeqCst);
        info!("webhook server stopped");
        result
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    fn endpoints(&self) -> Vec<String> {
        vec![
            format!("GET {HEALTH_PATH}"),
            format!("POST {GMAIL_PATH}"),
            format!("POST {OUTLOOK_PATH}"),
            format!("GET {OUTLOOK_PATH}"),
        ]
    }

    pub fn status(&self) -> WebhookStatus {
        WebhookStatus {
            is_running: self.running.load(Ordering::SeqCst),
            port: self.state.config.port,
            endpoints: self.endpoints(),
        }
    }
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn gmail_push(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    info!("received Gmail push notification");
    match decode_gmail_push(&body) {
        Ok(n) => info!(email = %n.email_address, history_id = %n.history_id, "Gmail notification"),
        Err(e) => warn!(error = %e, "could not decode Gmail notification, checking anyway"),
    }
    spawn_processing(&state, "gmail");
    (StatusCode::OK, "OK").into_response()
}

fn validation_echo(query: &HashMap<String, String>) -> Option<Response> {
    let token = query.get("validationToken")?;
    info!("Outlook subscription validation");
    Some((StatusCode::OK, token.clone()).into_response())
}

fn outlook_authorized(state: &AppState, headers: &HeaderMap, body: &[u8]) -> bool {
    let Some(secret) = state.secret() else {
        return true;
    };
    if let Some(sig) = headers.get(SIGNATURE_HEADER) {
        return sig
            .to_str()
            .map(|s| verify_signature(body, s, secret))
            .unwrap_or(false);
    }
    match serde_json::from_slice::<OutlookNotificationBatch>(body) {
        Ok(batch) => verify_client_state(&batch, secret),
        Err(_) => false,
    }
}

async fn outlook_notification(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(echo) = validation_echo(&query) {
        return echo;
    }

    info!("received Outlook notification");
    if !outlook_authorized(&state, &headers, &body) {
        warn!("rejected Outlook notification with bad signature or clientState");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    }
    if let Ok(batch) = serde_json::from_slice::<OutlookNotificationBatch>(&body) {
        debug!(count = batch.value.len(), "Outlook notification batch");
    }

    spawn_processing(&state, "outlook");
    (StatusCode::OK, "OK").into_response()
}

async fn outlook_validation(Query(query): Query<HashMap<String, String>>) -> Response {
    match validation_echo(&query) {
        Some(echo) => echo,
        None => {
            warn!("Outlook validation request without token");
            (StatusCode::BAD_REQUEST, "Bad Request").into_response()
        }
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
