//! CLI Integration Tests
//!
//! These tests run the `aquamon` binary. None of them needs a reachable
//! store: commands that read pointed at a closed local port must degrade to
//! empty output rather than fail.
//!
//! ```
//! cargo test --package aquamon-cli --test cli_integration
//! ```

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// A store URL nothing listens on.
const OFFLINE_STORE: &str = "http://127.0.0.1:9";

/// Run aquamon with an isolated config file and a clean environment.
fn run_aquamon(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_aquamon"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("AQUAMON_STORE_URL")
        .env_remove("AQUAMON_DEVICE")
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to run aquamon binary")
}

fn temp_config() -> (TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    (dir, path)
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_command() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["--help"]);

    assert!(output.status.success(), "Help should succeed");
    let stdout = stdout(&output);
    for cmd in ["watch", "export", "summary", "devices", "chart", "fetch", "config"] {
        assert!(stdout.contains(cmd), "Help should list {}", cmd);
    }
}

#[test]
fn test_version_command() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["--version"]);

    assert!(output.status.success(), "Version should succeed");
    assert!(stdout(&output).contains("aquamon"));
}

#[test]
fn test_subcommand_help() {
    let (_dir, config) = temp_config();
    for cmd in ["watch", "export", "summary", "devices", "chart", "fetch", "config"] {
        let output = run_aquamon(&config, &[cmd, "--help"]);
        assert!(output.status.success(), "{} --help should succeed", cmd);
        assert!(!stdout(&output).is_empty(), "{} --help should produce output", cmd);
    }
}

#[test]
fn test_completions() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["completions", "bash"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("aquamon"));
}

// =============================================================================
// Config Commands
// =============================================================================

#[test]
fn test_config_path() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["config", "path"]);

    assert!(output.status.success(), "Config path should succeed");
    assert_eq!(stdout(&output).trim(), config.display().to_string());
}

#[test]
fn test_config_show_without_file() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["config", "show"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("store_root = \"devices\""));
    assert!(stderr(&output).contains("No config file"));
    assert!(!config.exists(), "show must not create the file");
}

#[test]
fn test_config_round_trip() {
    let (_dir, config) = temp_config();

    let output = run_aquamon(&config, &["config", "init"]);
    assert!(output.status.success(), "init failed: {}", stderr(&output));
    assert!(config.exists());

    for (key, value) in [
        ("store-url", "http://localhost:9000"),
        ("refresh-mode", "push"),
        ("interval-secs", "30"),
        ("default-device", "tank-1"),
    ] {
        let output = run_aquamon(&config, &["config", "set", key, value]);
        assert!(output.status.success(), "set {} failed: {}", key, stderr(&output));
    }

    let output = run_aquamon(&config, &["config", "show"]);
    let shown = stdout(&output);
    assert!(shown.contains("store_url = \"http://localhost:9000\""));
    assert!(shown.contains("default_device = \"tank-1\""));
    assert!(shown.contains("mode = \"push\""));
    assert!(shown.contains("interval_secs = 30"));

    let output = run_aquamon(&config, &["config", "init"]);
    assert!(!output.status.success(), "init must not overwrite");
}

#[test]
fn test_config_set_rejects_invalid_value() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["config", "set", "interval-secs", "0"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("refresh.interval_secs"));
}

#[test]
fn test_invalid_config_blocks_commands() {
    let (_dir, config) = temp_config();
    std::fs::write(&config, "[refresh]\npoint_count = 0\n").unwrap();

    let output = run_aquamon(&config, &["--store-url", OFFLINE_STORE, "summary"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("refresh.point_count"));
}

// =============================================================================
// Read Commands against an offline store
// =============================================================================

#[test]
fn test_missing_store_url() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(&config, &["devices"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No store URL configured"));
}

#[test]
fn test_devices_offline_is_empty() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(
        &config,
        &["--store-url", OFFLINE_STORE, "-q", "devices", "--format", "json"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let devices: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(devices, serde_json::json!([]));
}

#[test]
fn test_summary_offline_is_empty() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(
        &config,
        &["--store-url", OFFLINE_STORE, "-q", "summary", "--format", "json"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let summary: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(summary["count"], 0);
    assert_eq!(summary["metrics"].as_array().unwrap().len(), 7);
    assert!(
        summary["metrics"]
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["count"] == 0 && m["avg"] == 0.0)
    );
}

#[test]
fn test_export_offline_writes_header_only() {
    let (dir, config) = temp_config();
    let target = dir.path().join("out.csv");
    let output = run_aquamon(
        &config,
        &[
            "--store-url",
            OFFLINE_STORE,
            "export",
            "--start",
            "2024-01-01",
            "--end",
            "2024-01-31",
            "--output",
            target.to_str().unwrap(),
        ],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stderr(&output).contains("Exported 0 readings"));

    let mut reader = csv::Reader::from_path(&target).unwrap();
    let headers: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(headers[0], "Time");
    assert_eq!(headers[1], "Device");
    assert_eq!(headers.len(), 9);
    assert_eq!(reader.records().count(), 0);
}

#[test]
fn test_export_rejects_inverted_range() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(
        &config,
        &[
            "--store-url",
            OFFLINE_STORE,
            "export",
            "--start",
            "2024-02-01",
            "--end",
            "2024-01-01",
            "--stdout",
        ],
    );

    assert!(!output.status.success());
    assert!(stderr(&output).contains("is after"));
}

#[test]
fn test_fetch_offline_is_empty_array() {
    let (_dir, config) = temp_config();
    let output = run_aquamon(
        &config,
        &["--store-url", OFFLINE_STORE, "-q", "fetch", "--device", "tank-1", "--limit", "5"],
    );

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "[]");
}
