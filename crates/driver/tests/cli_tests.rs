//! CLI integration tests

use std::io::Write;
use std::process::Command;

fn driver() -> Command {
    Command::new(env!("CARGO_BIN_EXE_mto-driver"))
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = driver()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("--config"), "Should show config option");
    assert!(stdout.contains("--scenario"), "Should show scenario option");
    assert!(stdout.contains("--skip-export"), "Should show skip-export option");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = driver()
        .arg("--version")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("mto-driver"), "Should show binary name");
}

/// Test that a missing configuration file is fatal
#[test]
fn test_missing_config_file_fails() {
    let output = driver()
        .args(["--config", "/nonexistent/mto-eval.toml", "--skip-export"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Missing config should fail");
}

/// Test that an invalid configuration is rejected before any request
#[test]
fn test_invalid_config_fails() {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .unwrap();
    writeln!(file, "[poller]\nttl = 0").unwrap();

    let output = driver()
        .arg("--config")
        .arg(file.path())
        .output()
        .expect("Failed to execute command");

    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Invalid config should fail");
    assert!(stderr.contains("ttl"), "Should name the invalid setting");
}

/// Test that an unknown output format is rejected
#[test]
fn test_invalid_format_rejected() {
    let output = driver()
        .args(["--format", "yaml"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Unknown format should fail");
}
