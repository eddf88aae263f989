//! Startup tests for the proptax binary.
//!
//! These run the real binary and only cover paths that finish before a
//! browser would be launched: argument parsing, config creation and loading,
//! and argument validation.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// Helper: get a Command for the proptax binary.
fn proptax() -> assert_cmd::Command {
    cargo_bin_cmd!("proptax")
}

/// Helper: copy the shipped config into a temp dir so the binary can find
/// `./config/proptax.toml` relative to its working directory.
fn setup_config_dir(tmp: &TempDir) {
    let src = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    let dst = tmp.path().join("config");
    fs::create_dir_all(&dst).unwrap();
    fs::copy(src.join("proptax.toml"), dst.join("proptax.toml")).unwrap();
}

#[test]
fn test_help_works_without_config() {
    let tmp = TempDir::new().expect("create temp dir");

    proptax()
        .current_dir(tmp.path())
        .arg("--help")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("--pdf-dir"))
        .stdout(predicate::str::contains("--input"));
}

#[test]
fn test_init_creates_config_file() {
    let tmp = TempDir::new().expect("create temp dir");
    let config_path = tmp.path().join("config").join("proptax.toml");

    assert!(!config_path.exists(), "config should not exist yet");

    proptax()
        .current_dir(tmp.path())
        .arg("--init")
        .timeout(Duration::from_secs(10))
        .assert()
        .success()
        .stdout(predicate::str::contains("Created default configuration file"));

    assert!(config_path.exists(), "config file should have been created");

    let content = fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("[portal]"), "config should have [portal] section");
    assert!(content.contains("[timing]"), "config should have [timing] section");
}

/// With stdin piped (not a TTY) a missing config must fail fast instead of
/// waiting on the create-config prompt.
#[test]
fn test_missing_config_exits_fast_not_hangs() {
    let tmp = TempDir::new().expect("create temp dir");

    proptax()
        .current_dir(tmp.path())
        .args(["--input", "props.csv", "--pdf-dir", "pdf"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("--init"));
}

#[test]
fn test_invalid_config_is_reported() {
    let tmp = TempDir::new().expect("create temp dir");
    let dst = tmp.path().join("config");
    fs::create_dir_all(&dst).unwrap();
    fs::write(dst.join("proptax.toml"), "[portal]\nsearch_url = 42\n").unwrap();

    proptax()
        .current_dir(tmp.path())
        .args(["--input", "props.csv", "--pdf-dir", "pdf"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_missing_required_args_is_usage_error() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);

    proptax()
        .current_dir(tmp.path())
        .args(["--input", "props.csv"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("--pdf-dir"));
}

/// Argument validation runs after config loading and before Chrome starts.
#[test]
fn test_missing_input_file_fails_before_browser_launch() {
    let tmp = TempDir::new().expect("create temp dir");
    setup_config_dir(&tmp);

    proptax()
        .current_dir(tmp.path())
        .args(["--input", "does_not_exist.csv", "--pdf-dir", "pdf"])
        .timeout(Duration::from_secs(10))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));

    assert!(!tmp.path().join("pdf").exists(), "no PDF directory for a rejected run");
}
