//! Quota command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use sightline_core::QuotaTracker;

use crate::utils::{format_local, open_store};

/// Show usage for every registered quota source.
pub fn status(data_dir: &Path, json: bool) -> Result<()> {
    let store = open_store(data_dir)?;
    let tracker = QuotaTracker::load(store).context("Failed to load quota records")?;
    let records = tracker
        .status_of_all()
        .context("Failed to read quota records")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No quota sources registered yet");
        return Ok(());
    }

    for record in records {
        let availability = if record.is_available() {
            "available".green()
        } else {
            "exhausted".red()
        };
        println!("{} ({availability})", record.source.bold());
        println!(
            "   {} {}/{} (reset {})",
            "Today:".dimmed(),
            record.daily_used,
            record.daily_limit,
            format_local(record.last_daily_reset)
        );
        println!(
            "   {} {}/{} (reset {})",
            "This month:".dimmed(),
            record.monthly_used,
            record.monthly_limit,
            format_local(record.last_monthly_reset)
        );
    }

    Ok(())
}
