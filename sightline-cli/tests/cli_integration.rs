//! CLI integration tests for sightline-cli.
//!
//! These tests run the actual binary against a throwaway data directory and
//! check outputs, exit codes and persisted state.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use image::{DynamicImage, GrayImage, Luma};
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a Command for the sightline binary, isolated to `data_dir`.
fn sightline(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("sightline").unwrap();
    cmd.arg("--data-dir").arg(data_dir);
    cmd.env_remove("RUST_LOG");
    cmd.env_remove("SIGHTLINE_QUOTA_DAILY");
    cmd
}

/// Write a small synthetic PNG and return its path.
fn write_photo(dir: &Path, name: &str, seed: u32) -> PathBuf {
    let path = dir.join(name);
    DynamicImage::ImageLuma8(GrayImage::from_fn(96, 96, |x, y| {
        Luma([((x * (seed + 2) + y * y) % 256) as u8])
    }))
    .save(&path)
    .unwrap();
    path
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).unwrap()
}

// ============================================================================
// Help and Usage
// ============================================================================

#[test]
fn test_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    sightline(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("recognize"))
        .stdout(predicate::str::contains("priority"))
        .stdout(predicate::str::contains("quota"))
        .stdout(predicate::str::contains("Exit codes:"));
}

#[test]
fn test_unknown_method_is_usage_error() {
    let temp = TempDir::new().unwrap();
    sightline(temp.path())
        .args(["priority", "set", "telepathy"])
        .assert()
        .code(64);
}

// ============================================================================
// Fingerprint and Compare
// ============================================================================

#[test]
fn test_fingerprint_json() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "mug.png", 1);

    let report = json_stdout(sightline(temp.path()).args(["fingerprint", "--json"]).arg(&photo));
    let fingerprint = report[0]["fingerprint"].as_str().unwrap();
    assert_eq!(fingerprint.len(), 16);
    assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn test_compare_same_image_is_similar() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "mug.png", 1);

    sightline(temp.path())
        .arg("compare")
        .arg(&photo)
        .arg(&photo)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 bits"))
        .stdout(predicate::str::contains("SIMILAR"));
}

#[test]
fn test_compare_hex_fingerprints() {
    let temp = TempDir::new().unwrap();
    let report = json_stdout(sightline(temp.path()).args([
        "compare",
        "--json",
        "0000000000000000",
        "ffffffffffffffff",
    ]));

    assert_eq!(report["distance"], 64);
    assert_eq!(report["similar"], false);
}

#[test]
fn test_missing_image_returns_input_error() {
    let temp = TempDir::new().unwrap();
    sightline(temp.path())
        .args(["recognize", "nonexistent_photo.jpg"])
        .assert()
        .code(66)
        .stderr(predicate::str::contains("Failed to read image"));
}

// ============================================================================
// Recognize
// ============================================================================

#[test]
fn test_recognize_offline_uses_on_device_classifier() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "teapot.png", 3);

    let report = json_stdout(
        sightline(temp.path())
            .args(["recognize", "--offline", "--json"])
            .arg(&photo),
    );
    assert_eq!(report["outcome"]["method"], "offline");
    assert!(report["outcome"]["enrichment"]["summary"].is_string());
    assert!(report["quality"]["tier"].is_string());

    // The cloud source is registered but was never charged
    let records = json_stdout(sightline(temp.path()).args(["quota", "status", "--json"]));
    assert_eq!(records[0]["source"], "vision-api");
    assert_eq!(records[0]["daily_used"], 0);
}

#[test]
fn test_recognize_with_nothing_reachable_returns_no_result() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "fossil.png", 4);

    sightline(temp.path())
        .args(["priority", "set", "cloud-api"])
        .assert()
        .success();

    sightline(temp.path())
        .args(["recognize", "--offline"])
        .arg(&photo)
        .assert()
        .code(65);
}

#[test]
fn test_recognize_with_exhausted_quota_returns_no_result() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "abacus.png", 5);

    sightline(temp.path())
        .args(["priority", "set", "cloud-api"])
        .assert()
        .success();

    sightline(temp.path())
        .env("SIGHTLINE_QUOTA_DAILY", "0")
        .arg("recognize")
        .arg(&photo)
        .assert()
        .code(65);
}

#[test]
fn test_recognize_cloud_charges_quota() {
    let temp = TempDir::new().unwrap();
    let photo = write_photo(temp.path(), "plant.png", 6);

    sightline(temp.path())
        .args(["priority", "set", "cloud-api"])
        .assert()
        .success();

    let report = json_stdout(sightline(temp.path()).args(["recognize", "--json"]).arg(&photo));
    assert_eq!(report["outcome"]["method"], "cloud_api");

    let records = json_stdout(sightline(temp.path()).args(["quota", "status", "--json"]));
    assert_eq!(records[0]["daily_used"], 1);
    assert_eq!(records[0]["monthly_used"], 1);
}

// ============================================================================
// Priority
// ============================================================================

#[test]
fn test_priority_defaults() {
    let temp = TempDir::new().unwrap();
    sightline(temp.path())
        .args(["priority", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. offline"))
        .stdout(predicate::str::contains("2. cloud_api"))
        .stdout(predicate::str::contains("3. user_ai"));
}

#[test]
fn test_priority_set_persists_and_reset_restores() {
    let temp = TempDir::new().unwrap();

    sightline(temp.path())
        .args(["priority", "set", "user-ai", "offline"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Method order updated"));
    assert!(temp.path().join("priority.config.json").exists());

    let config = json_stdout(sightline(temp.path()).args(["priority", "show", "--json"]));
    let methods = config["methods"].as_array().unwrap();
    let first = methods
        .iter()
        .find(|m| m["priority"] == 0)
        .unwrap();
    assert_eq!(first["method"], "user_ai");
    let cloud = methods
        .iter()
        .find(|m| m["method"] == "cloud_api")
        .unwrap();
    assert_eq!(cloud["enabled"], false);

    sightline(temp.path())
        .args(["priority", "reset"])
        .assert()
        .success();
    sightline(temp.path())
        .args(["priority", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1. offline"));
}

#[test]
fn test_quota_status_empty() {
    let temp = TempDir::new().unwrap();
    sightline(temp.path())
        .args(["quota", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No quota sources registered"));
}
