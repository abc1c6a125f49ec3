use std::fs;
use std::process::{Command, Output};

use tempfile::TempDir;

fn texbench(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_texbench"))
        .env_remove("TEXBENCH_CONFIG")
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run texbench")
}

#[test]
fn missing_dimension_is_a_usage_error() {
    let output = texbench(&[]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Usage"));
}

#[test]
fn help_succeeds() {
    let output = texbench(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--strategy"));
    assert!(stdout.contains("DIM"));
}

#[test]
fn unaligned_dimension_is_rejected() {
    let output = texbench(&["6"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("multiples of 4"));
}

#[test]
fn summary_requires_a_cycle_limit() {
    let dir = TempDir::new().unwrap();
    let summary = dir.path().join("summary.json");
    let output = texbench(&["64", "--headless", "--summary", summary.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!summary.exists());
}

#[test]
fn bad_config_fails_before_touching_the_gpu() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("config.toml");
    fs::write(&config, "version = 7\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_texbench"))
        .env("TEXBENCH_CONFIG", &config)
        .env("RUST_LOG", "warn")
        .args(["64", "--headless", "--cycles", "1"])
        .output()
        .expect("failed to run texbench");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches("unsupported config version").count(), 1, "{stderr}");
    assert!(!String::from_utf8_lossy(&output.stdout).contains("unsupported config version"));
}
