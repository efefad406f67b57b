//! Smoke tests for the songforge CLI
//!
//! These validate the command surface and exit codes without requiring the
//! LLM credential or the external SVS engine.

use assert_cmd::Command;
use predicates::prelude::*;

/// A command with the songforge configuration variables scrubbed, so host
/// environment never leaks into assertions.
fn songforge() -> Command {
    let mut cmd = Command::cargo_bin("songforge").expect("binary builds");
    cmd.env_remove("CEREBRAS_API_KEY")
        .env_remove("DS_PYTHON_PATH")
        .env_remove("DS_PROJECT_ROOT")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    songforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("compose"))
        .stdout(predicate::str::contains("doctor"))
        .stdout(predicate::str::contains("input"));
}

#[test]
fn version_flag_works() {
    songforge()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("songforge"));
}

#[test]
fn doctor_reports_unconfigured_environment() {
    songforge()
        .arg("doctor")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAIL"))
        .stdout(predicate::str::contains("DS_PROJECT_ROOT"));
}

#[test]
fn compose_without_credential_exits_with_config_code() {
    songforge()
        .args(["compose", "小酒窝", "--title", "Smoke"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("CEREBRAS_API_KEY"));
}

#[test]
fn input_without_credential_exits_with_config_code() {
    songforge()
        .args(["input", "小酒窝"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("CEREBRAS_API_KEY"));
}

#[test]
fn unknown_language_is_a_usage_error() {
    songforge()
        .args(["input", "hello", "--language", "klingon"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("language"));
}
