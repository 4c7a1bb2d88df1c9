//! Common utility functions shared across CLI commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, Utc};
use image::DynamicImage;
use sightline_core::{compute_fingerprint, Fingerprint, JsonFileStore};
use tracing::debug;

/// Open (creating if needed) the JSON store in `data_dir`.
pub fn open_store(data_dir: &Path) -> Result<Arc<JsonFileStore>> {
    let store = JsonFileStore::open(data_dir)
        .with_context(|| format!("Failed to open data directory: {}", data_dir.display()))?;
    debug!(path = %data_dir.display(), "Opened data directory");
    Ok(Arc::new(store))
}

/// Decode an image file.
pub fn load_image(path: &Path) -> Result<DynamicImage> {
    let image = image::open(path)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "Loaded image");
    Ok(image)
}

/// Fingerprint an argument that is either an image path or a hex fingerprint.
pub fn resolve_fingerprint(arg: &str) -> Result<Fingerprint> {
    let path = Path::new(arg);
    if path.exists() {
        return Ok(compute_fingerprint(&load_image(path)?));
    }
    Fingerprint::from_hex(arg)
        .with_context(|| format!("Failed to read image: {arg} is neither a file nor a fingerprint"))
}

/// Format a confidence in `[0, 1]` as a whole percentage.
pub fn format_confidence(confidence: f64) -> String {
    format!("{:.0}%", confidence * 100.0)
}

/// Format a UTC timestamp in the local timezone.
pub fn format_local(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
