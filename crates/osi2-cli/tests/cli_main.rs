//! Basic CLI tests for the osi2 command-line interface.

use assert_cmd::Command;
use predicates::prelude::*;

// Include command-specific test modules
mod commands;

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Osi2 control registry"))
        .stdout(predicate::str::contains("lib-name"))
        .stdout(predicate::str::contains("probe"));
}

/// Test that the CLI shows version information.
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("osi2"));
}

/// Test the verbose flag is accepted as a global flag.
#[test]
fn test_verbose_flag_accepted() {
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("--verbose").arg("lib-name").arg("clp");

    cmd.assert().success();
}

/// Test that providing no subcommand shows an error.
#[test]
fn test_no_subcommand_shows_error() {
    let mut cmd = Command::cargo_bin("osi2").unwrap();

    // Clap's error code for a missing required subcommand
    cmd.assert().failure().code(2);
}

/// Test that a missing config file is reported.
#[test]
fn test_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("lib-name")
        .arg("clp");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Failed to load config"));
}
