//! Integration tests for the modelquota binary.
//!
//! Each test writes a config into a temp directory and points the binary's
//! file store at it.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const SINGLE_MODEL_CONFIG: &str = r#"
[[resources]]
name = "test-model"
daily_capacity = 1
"#;

const TWO_MODEL_CONFIG: &str = r#"
[[resources]]
name = "primary-model"
daily_capacity = 2

[[resources]]
name = "fallback-model"
daily_capacity = 3
"#;

/// Get a Command instance for the modelquota binary
#[allow(deprecated)]
fn modelquota_cmd(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("modelquota").expect("Failed to find modelquota binary");
    cmd.current_dir(dir)
        .env_remove("MODELQUOTA_DATA_DIR")
        .env_remove("MODELQUOTA_RETENTION_DAYS")
        .arg("--data-dir")
        .arg(dir);
    cmd
}

fn write_config(dir: &Path, content: &str) -> std::path::PathBuf {
    let path = dir.join("quota.toml");
    fs::write(&path, content).expect("Failed to write config");
    path
}

#[test]
fn test_reserve_then_exhausted() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), SINGLE_MODEL_CONFIG);

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("reserve")
        .assert()
        .success()
        .stdout(predicate::str::contains("test-model"))
        .stdout(predicate::str::contains("(1/1 used today)"));

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("reserve")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("all models for"));
}

#[test]
fn test_concurrent_reserve_respects_capacity() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), TWO_MODEL_CONFIG);

    let output = modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("--json")
        .args(["reserve", "--count", "8"])
        .output()
        .expect("Failed to run modelquota");

    assert_eq!(output.status.code(), Some(3));
    let stdout = String::from_utf8(output.stdout).expect("utf8 stdout");
    let outcomes: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("json line"))
        .collect();

    let count = |resource: &str| {
        outcomes
            .iter()
            .filter(|o| o["resource"] == resource)
            .count()
    };
    assert_eq!(outcomes.len(), 8);
    assert_eq!(count("primary-model"), 2);
    assert_eq!(count("fallback-model"), 3);
    assert_eq!(
        outcomes.iter().filter(|o| o["outcome"] == "exhausted").count(),
        3
    );
}

#[test]
fn test_usage_persists_between_runs() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), TWO_MODEL_CONFIG);

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["reserve", "-n", "3"])
        .assert()
        .success();

    let output = modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["--json", "usage"])
        .output()
        .expect("Failed to run modelquota");
    assert!(output.status.success());

    let usage: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("usage json");
    let days = usage.as_object().expect("object keyed by day");
    assert_eq!(days.len(), 1);
    let counts = days.values().next().expect("one day");
    assert_eq!(counts["primary-model"], 2);
    assert_eq!(counts["fallback-model"], 1);
}

#[test]
fn test_status_reports_next_model() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), TWO_MODEL_CONFIG);

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["reserve", "--count", "2"])
        .assert()
        .success();

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("## Quota Summary"))
        .stdout(predicate::str::contains("**primary-model**: 2/2 used"))
        .stdout(predicate::str::contains("**Next Reservation**: fallback-model"));
}

#[test]
fn test_invalid_config_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(
        temp_dir.path(),
        r#"
        [[resources]]
        name = "broken"
        daily_capacity = 0
        "#,
    );

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .arg("reserve")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("daily capacity"));
}

#[test]
fn test_prune_with_nothing_to_remove() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config = write_config(temp_dir.path(), SINGLE_MODEL_CONFIG);

    modelquota_cmd(temp_dir.path())
        .arg("--config")
        .arg(&config)
        .args(["prune", "--days", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 day(s)"));
}
