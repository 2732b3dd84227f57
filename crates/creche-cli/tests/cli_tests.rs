//! CLI integration tests for creche.
//!
//! These tests verify command-line argument parsing, help output and exit
//! codes for error conditions that need no database.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a command for the creche binary.
fn cmd() -> Command {
    Command::cargo_bin("creche").unwrap()
}

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("migrate"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_serve_subcommand_help() {
    cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("--port"));
}

#[test]
fn test_migrate_subcommand_help() {
    cmd()
        .args(["migrate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--report"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("creche"));
}

#[test]
fn test_global_flags_are_listed() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbosity"));
}

#[test]
fn test_serve_with_missing_config_fails() {
    cmd()
        .args(["--config", "/nonexistent/creche.yaml", "serve"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_migrate_without_env_fails_with_config_error() {
    cmd()
        .arg("migrate")
        .env_remove("MIGRATE_MYSQL_HOST")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("MIGRATE_MYSQL_HOST"));
}

#[test]
fn test_unknown_subcommand_fails() {
    cmd().arg("frobnicate").assert().failure();
}
