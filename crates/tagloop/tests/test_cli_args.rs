//! CLI argument parsing tests

use assert_cmd::Command;
use predicates::prelude::*;

fn tagloop() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tagloop"))
}

#[test]
fn test_help_flag() {
    tagloop()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("works through tagged actions"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_version_flag() {
    tagloop()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_no_args_shows_usage() {
    tagloop()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_run_help_lists_flags() {
    tagloop()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--message"))
        .stdout(predicate::str::contains("--workspace"))
        .stdout(predicate::str::contains("--no-summarize"))
        .stdout(predicate::str::contains("--no-prune"))
        .stdout(predicate::str::contains("--auto-approve"))
        .stdout(predicate::str::contains("--verbose"));
}

#[test]
fn test_unknown_subcommand() {
    tagloop()
        .arg("engage")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}
