//! Polling monitor for mailsort.
//!
//! - **types**: last-check marker persistence and the status snapshot
//! - **service**: `EmailMonitor`, the periodic check loop

pub mod service;
pub mod types;

pub use service::EmailMonitor;
pub use types::{LastCheckStore, MonitorStatus, LAST_CHECK_FILE};
