//! Integration tests for the CLI binary.
//!
//! Registered as a [[test]] in the dime-cli crate so that
//! CARGO_BIN_EXE_dime is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `dime` binary.
fn dime_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_dime"))
}

fn run(home: &Path, args: &[&str]) -> Output {
    dime_binary()
        .arg("--home")
        .arg(home)
        .args(args)
        .output()
        .expect("failed to execute dime")
}

fn run_ok(home: &Path, args: &[&str]) -> String {
    let output = run(home, args);
    assert!(
        output.status.success(),
        "dime {args:?} should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = dime_binary()
        .arg("--help")
        .output()
        .expect("failed to execute dime --help");

    assert!(
        output.status.success(),
        "dime --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("Usage"),
        "dime --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = dime_binary()
        .arg("--version")
        .output()
        .expect("failed to execute dime --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("dime"),
        "dime --version should contain the binary name, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = dime_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute dime");
    assert!(!output.status.success());
}

#[test]
fn cli_root_and_leaf_verify() {
    let dir = tempfile::tempdir().expect("tempdir");
    let home = dir.path();

    run_ok(home, &["key", "generate", "--name", "root"]);
    let out = run_ok(
        home,
        &["identity", "self-issue", "--key", "root", "--name", "root", "--system", "cli-test"],
    );
    assert!(out.contains("Identity self-issued"));
    assert!(home.join("identities/root.id").exists());

    run_ok(home, &["key", "generate", "--name", "leaf"]);
    run_ok(home, &["request", "generate", "--key", "leaf", "--capability", "generic"]);
    let request = home.join("requests/leaf.iir");
    assert!(request.exists());

    run_ok(
        home,
        &[
            "identity",
            "issue",
            "--request",
            request.to_str().unwrap(),
            "--issuer",
            "root",
            "--issuer-key",
            "root",
            "--name",
            "leaf",
            "--root",
            "root",
        ],
    );

    let out = run_ok(home, &["identity", "verify", "--name", "leaf", "--root", "root"]);
    assert_eq!(out.trim(), "Complete");
    let out = run_ok(home, &["identity", "verify", "--name", "leaf", "--trusted", "root"]);
    assert_eq!(out.trim(), "Intact");

    let output = run(home, &["identity", "verify", "--name", "leaf"]);
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "Untrusted");
}

#[test]
fn cli_issue_refuses_disallowed_capability() {
    let dir = tempfile::tempdir().expect("tempdir");
    let home = dir.path();

    run_ok(home, &["key", "generate", "--name", "root"]);
    run_ok(home, &["identity", "self-issue", "--key", "root", "--name", "root"]);
    run_ok(home, &["key", "generate", "--name", "leaf"]);
    run_ok(home, &["request", "generate", "--key", "leaf", "--capability", "issue"]);

    let request = home.join("requests/leaf.iir");
    let output = run(
        home,
        &[
            "identity",
            "issue",
            "--request",
            request.to_str().unwrap(),
            "--issuer",
            "root",
            "--issuer-key",
            "root",
            "--name",
            "leaf",
        ],
    );
    assert!(!output.status.success());
    assert!(!home.join("identities/leaf.id").exists());
}

#[test]
fn cli_inspect_prints_claims() {
    let dir = tempfile::tempdir().expect("tempdir");
    let home = dir.path();

    run_ok(home, &["key", "generate", "--name", "k", "--capability", "exchange"]);
    let out = run_ok(home, &["inspect", home.join("keys/k.key").to_str().unwrap()]);
    assert!(out.contains("Header:     KEY"));
    assert!(out.contains("uid:"));
    assert!(out.contains("key:"));
}

#[test]
fn cli_refuses_to_overwrite_key() {
    let dir = tempfile::tempdir().expect("tempdir");
    let home = dir.path();

    run_ok(home, &["key", "generate", "--name", "k"]);
    let output = run(home, &["key", "generate", "--name", "k"]);
    assert!(!output.status.success());
}

#[test]
fn cli_rejects_out_of_range_validity() {
    let dir = tempfile::tempdir().expect("tempdir");
    let home = dir.path();

    run_ok(home, &["key", "generate", "--name", "root"]);
    let output = run(
        home,
        &["identity", "self-issue", "--key", "root", "--name", "root", "--days", "9223372036854775807"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("out of range"));
    assert!(!home.join("identities/root.id").exists());

    run_ok(home, &["identity", "self-issue", "--key", "root", "--name", "root"]);
    run_ok(home, &["key", "generate", "--name", "leaf"]);
    run_ok(home, &["request", "generate", "--key", "leaf", "--capability", "generic"]);
    let request = home.join("requests/leaf.iir");
    let output = run(
        home,
        &[
            "identity",
            "issue",
            "--request",
            request.to_str().unwrap(),
            "--issuer",
            "root",
            "--issuer-key",
            "root",
            "--name",
            "leaf",
            "--days",
            "9223372036854775807",
        ],
    );
    assert!(!output.status.success());
    assert!(!home.join("identities/leaf.id").exists());
}
