//! Tests for the `lib-name` command.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn test_lib_name_capitalises() {
    let expected = format!("libOsi2ClpShim.{}\n", std::env::consts::DLL_EXTENSION);
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("lib-name").arg("clp");

    cmd.assert().success().stdout(predicate::eq(expected));
}

#[test]
fn test_lib_name_requires_short_name() {
    let mut cmd = Command::cargo_bin("osi2").unwrap();
    cmd.arg("lib-name");

    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("<SHORT_NAME>"));
}
