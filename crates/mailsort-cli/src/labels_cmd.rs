//! `mailsort labels`: manage the action labels offered to the LLM.
//!
//! - `mailsort labels list`: show every label with its description
//! - `mailsort labels add NAME PROMPT [--description D] [--example E]...`
//! - `mailsort labels remove NAME`

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;

use mailsort_core::config::{LabelConfig, LabelsConfigManager};

// ─────────────────────────────────────────────
// Subcommand enum
// ─────────────────────────────────────────────

#[derive(Subcommand)]
pub enum LabelsCommands {
    /// List configured labels
    List,

    /// Add a new label
    Add {
        /// Label name, e.g. "waiting_on"
        name: String,

        /// Instruction telling the LLM when to pick this label
        prompt: String,

        /// Short human-readable description
        #[arg(short, long)]
        description: Option<String>,

        /// Example of a matching email (repeatable)
        #[arg(short, long = "example")]
        examples: Vec<String>,
    },

    /// Remove a label by name
    Remove {
        name: String,
    },
}

/// Dispatch a labels subcommand against `<data dir>/labels.json`.
pub fn dispatch(cmd: LabelsCommands) -> Result<()> {
    let manager = LabelsConfigManager::default_location();
    match cmd {
        LabelsCommands::List => list_labels(&manager),
        LabelsCommands::Add {
            name,
            prompt,
            description,
            examples,
        } => add_label(&manager, name, prompt, description, examples),
        LabelsCommands::Remove { name } => remove_label(&manager, &name),
    }
}

// ─────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────

fn list_labels(manager: &LabelsConfigManager) -> Result<()> {
    let config = manager.load();
    let source = if manager.path().exists() {
        manager.path().display().to_string()
    } else {
        "built-in defaults".to_string()
    };

    println!();
    println!("  {} {}", "Labels".bold(), format!("({source})").dimmed());
    println!();
    for label in &config.labels {
        let desc = label.description.as_deref().unwrap_or(&label.prompt);
        println!("  {:<18} {}", label.name.cyan(), desc);
        for example in &label.examples {
            println!("  {:<18} {}", "", format!("e.g. {example}").dimmed());
        }
    }
    println!();
    Ok(())
}

fn add_label(
    manager: &LabelsConfigManager,
    name: String,
    prompt: String,
    description: Option<String>,
    examples: Vec<String>,
) -> Result<()> {
    let mut config = manager.load();
    let mut label = LabelConfig::new(name.trim(), prompt);
    label.description = description;
    label.examples = examples;
    config.add_label(label)?;
    manager.save(&config)?;
    println!("  {} added label '{}'", "✓".green(), name.trim());
    Ok(())
}

fn remove_label(manager: &LabelsConfigManager, name: &str) -> Result<()> {
    let mut config = manager.load();
    if config.get(name).is_none() {
        bail!("no label named '{name}'");
    }
    // An empty file loads as the defaults, so the last label stays.
    if config.labels.len() == 1 {
        bail!("cannot remove '{name}': at least one label is required");
    }
    config.remove_label(name);
    manager.save(&config)?;
    println!("  {} removed label '{}'", "✓".green(), name);
    Ok(())
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
