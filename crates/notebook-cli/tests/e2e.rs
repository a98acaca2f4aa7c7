//! End-to-end tests for the notebook CLI's argument handling.

use assert_cmd::Command;
use predicates::prelude::*;

fn notebook_cmd() -> Command {
    Command::cargo_bin("notebook").expect("binary should build")
}

#[test]
fn help_lists_serve_subcommand() {
    notebook_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn serve_help_lists_bind_and_dsn_flags() {
    notebook_cmd()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind"))
        .stdout(predicate::str::contains("--dsn"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    notebook_cmd().arg("frobnicate").assert().failure();
}

#[test]
fn serve_rejects_malformed_bind_address() {
    notebook_cmd()
        .args(["serve", "--bind", "not-an-address"])
        .assert()
        .failure();
}
