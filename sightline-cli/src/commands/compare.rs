//! Compare command implementation.

use anyhow::Result;
use colored::Colorize;

use crate::utils::resolve_fingerprint;

/// Execute the compare command.
pub fn execute(first: &str, second: &str, threshold: u32, json: bool) -> Result<()> {
    let a = resolve_fingerprint(first)?;
    let b = resolve_fingerprint(second)?;

    let distance = a.distance(&b);
    let similar = a.is_similar(&b, Some(threshold));

    if json {
        let report = serde_json::json!({
            "a": a.to_hex(),
            "b": b.to_hex(),
            "distance": distance,
            "similarity": a.similarity(&b),
            "threshold": threshold,
            "similar": similar,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("   {} {a}", "A:".dimmed());
    println!("   {} {b}", "B:".dimmed());
    println!(
        "   {} {distance} bits ({:.1}% similar)",
        "Distance:".dimmed(),
        a.similarity(&b) * 100.0
    );
    if similar {
        println!("   {} {}", "Verdict:".dimmed(), "SIMILAR".green().bold());
    } else {
        println!("   {} {}", "Verdict:".dimmed(), "DIFFERENT".yellow().bold());
    }

    Ok(())
}
