//! Configuration: app schema, loading with env var overrides, and labels.
//!
//! # Usage
//! ```no_run
//! use mailsort_core::config;
//!
//! let cfg = config::load_config(None);
//! println!("Provider: {}", cfg.email_provider);
//! ```

pub mod labels;
pub mod loader;
pub mod schema;

// Re-export key types
pub use labels::{LabelConfig, LabelsConfigManager, LabelsConfiguration};
pub use loader::{create_default_config, get_config_path, load_config, save_config};
pub use schema::Config;
