//! Tests for the `probe` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

#[test]
fn test_probe_missing_library() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.env_remove("OSI2_PLUGIN_DIR")
        .arg("probe")
        .arg("clp")
        .arg("--dir")
        .arg(dir.path())
        .arg("--api")
        .arg("OsiSimplex");

    cmd.assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("-1"))
        .stderr(predicate::str::contains("Failed to load \"clp\""));
}

#[test]
fn test_probe_uses_configured_plugin_dir() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "plugin_dir = {:?}", dir.path().to_str().unwrap()).unwrap();

    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.env_remove("OSI2_PLUGIN_DIR")
        .arg("--config")
        .arg(config.path())
        .arg("probe")
        .arg("glpk");

    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("libOsi2GlpkShim"));
}

#[test]
fn test_probe_requires_short_name() {
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("probe");

    cmd.assert().failure().code(2);
}
