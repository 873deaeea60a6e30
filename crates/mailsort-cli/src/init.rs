//! `mailsort init`: create the data directory, config, and labels files.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;

use mailsort_core::config::{create_default_config, LabelsConfigManager};
use mailsort_core::utils::get_data_path;

/// Run the init command.
pub fn run() -> Result<()> {
    println!();
    println!("{}", "📬 mailsort Setup".cyan().bold());
    println!();

    let data_dir = get_data_path();
    init_in(&data_dir)?;

    println!();
    println!("  Next steps:");
    println!(
        "    1. Gmail: place your OAuth client as {}",
        data_dir.join("credentials.json").display()
    );
    println!("       Outlook: set outlook.clientId in config.json");
    println!("    2. export ANTHROPIC_API_KEY=\"your-api-key-here\"");
    println!("    3. mailsort auth");
    println!("    4. mailsort run");
    println!();
    Ok(())
}

/// Write default config and labels into `dir`, keeping existing files.
fn init_in(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let config_path = dir.join("config.json");
    report(
        create_default_config(Some(&config_path))
            .with_context(|| format!("failed to write {}", config_path.display()))?,
        &config_path,
    );

    let labels = LabelsConfigManager::new(dir.join("labels.json"));
    report(labels.create_default()?, labels.path());
    Ok(())
}

fn report(created: bool, path: &Path) {
    if created {
        println!("  {} created {}", "✓".green(), path.display());
    } else {
        println!("  {} {} already exists", "✓".green(), path.display());
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
