//! mailsort core: shared types, configuration, and helpers used by every
//! other crate in the workspace.

pub mod config;
pub mod types;
pub mod utils;

pub use types::{EmailLabel, EmailMessage, EmailProvider};
