//! Fingerprint command implementation.

use std::path::PathBuf;

use anyhow::Result;
use sightline_core::compute_fingerprint;

use crate::utils::load_image;

/// Execute the fingerprint command.
pub fn execute(files: &[PathBuf], json: bool) -> Result<()> {
    let mut rows = Vec::with_capacity(files.len());
    for file in files {
        let fingerprint = compute_fingerprint(&load_image(file)?);
        rows.push((file, fingerprint));
    }

    if json {
        let entries: Vec<_> = rows
            .iter()
            .map(|(file, fingerprint)| {
                serde_json::json!({
                    "file": file.display().to_string(),
                    "fingerprint": fingerprint.to_hex(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        for (file, fingerprint) in rows {
            println!("{fingerprint}  {}", file.display());
        }
    }

    Ok(())
}
