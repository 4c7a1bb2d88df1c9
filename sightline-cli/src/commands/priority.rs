//! Priority command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use sightline_core::{PriorityConfig, PriorityManager, RecognitionMethod};
use tracing::info;

use crate::utils::open_store;

fn manager(data_dir: &Path) -> Result<PriorityManager> {
    let store = open_store(data_dir)?;
    PriorityManager::load(store).context("Failed to load priority configuration")
}

fn print_config(config: &PriorityConfig) {
    let mut methods = config.methods.clone();
    methods.sort_by_key(|m| m.priority);

    for (position, entry) in methods.iter().enumerate() {
        let state = if entry.enabled {
            "enabled".green()
        } else {
            "disabled".dimmed()
        };
        println!("   {}. {:<10} {state}", position + 1, entry.method.to_string());
    }
}

/// Show the current method order.
pub fn show(data_dir: &Path, json: bool) -> Result<()> {
    let config = manager(data_dir)?.resolve();

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else {
        print_config(&config);
    }
    Ok(())
}

/// Enable `methods` in the given order; the rest are disabled.
pub fn set(data_dir: &Path, methods: &[RecognitionMethod], quiet: bool) -> Result<()> {
    let manager = manager(data_dir)?;
    let config = PriorityConfig::from_order(methods);
    manager
        .save(config.clone())
        .context("Failed to save priority configuration")?;

    info!(order = ?config.enabled_in_order(), "Updated method order");
    if !quiet {
        println!("{}", "Method order updated".green().bold());
        print_config(&config);
    }
    Ok(())
}

/// Restore the default order.
pub fn reset(data_dir: &Path, quiet: bool) -> Result<()> {
    let manager = manager(data_dir)?;
    manager
        .reset_to_default()
        .context("Failed to reset priority configuration")?;

    if !quiet {
        println!("{}", "Method order reset to default".green().bold());
        print_config(&manager.resolve());
    }
    Ok(())
}
