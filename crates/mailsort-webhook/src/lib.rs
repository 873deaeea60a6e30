//! Webhook receiver for provider push notifications.
//!
//! - **server**: axum routes, background processing and graceful shutdown
//! - **verify**: HMAC signature and `clientState` checks
//! - **notifications**: Pub/Sub and Graph payload types

pub mod notifications;
pub mod server;
pub mod verify;

pub use server::{WebhookServer, WebhookStatus};
