//! Integration tests for the CLI binary.
//!
//! Drives the `susdb` binary through a full store → verify → close cycle
//! against a temporary storage root.
//!
//! This test is registered as a [[test]] in the susdb-cli crate so that
//! CARGO_BIN_EXE_susdb is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `susdb` binary with an isolated environment.
fn susdb(root: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_susdb"));
    cmd.env_remove("SUSDB_ROOT")
        .env_remove("SUSDB_LOG_PATH")
        .env_remove("SUSDB_EXTERNAL_SUPPORT")
        .env_remove("SUSDB_BUCKET")
        .env_remove("RUST_LOG")
        .arg("--root")
        .arg(root);
    cmd
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to execute susdb")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Pull a labelled value (`  UID:   ...`) out of command output.
fn labelled(output: &Output, label: &str) -> String {
    stdout(output)
        .lines()
        .find_map(|line| line.trim().strip_prefix(label).map(|v| v.trim().to_string()))
        .unwrap_or_else(|| panic!("no {label} line in: {}", stdout(output)))
}

#[test]
fn cli_responds_to_help() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(susdb(dir.path()).arg("--help"));

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("store") && out.contains("verify") && out.contains("close"));
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(susdb(dir.path()).arg("--nonexistent-flag"));
    assert!(!output.status.success());
}

#[test]
fn cli_store_verify_close_cycle() {
    let dir = tempfile::tempdir().unwrap();

    let stored = run(susdb(dir.path()).args(["store", "--string", "mike12345678iuiujfkk"]));
    assert!(
        stored.status.success(),
        "store failed: {}",
        String::from_utf8_lossy(&stored.stderr)
    );
    let uid = labelled(&stored, "UID:");
    let sus = labelled(&stored, "SUS:");
    assert!(dir.path().join(format!("user_db_{uid}")).is_file());

    let verified = run(susdb(dir.path()).args(["verify", "--uid", &uid, "--string", "mike12345678iuiujfkk"]));
    assert!(verified.status.success());
    assert_eq!(stdout(&verified).trim(), "Success");

    let mismatch = run(susdb(dir.path()).args(["verify", "--uid", &uid, "--string", "wrong"]));
    assert_eq!(mismatch.status.code(), Some(5));

    let view = run(susdb(dir.path()).args(["view", "--uid", &uid]));
    assert!(view.status.success());
    let fields: serde_json::Value = serde_json::from_slice(&view.stdout).unwrap();
    assert_eq!(fields.as_object().unwrap().len(), 4);
    assert_eq!(fields["secured_token"], sus.as_str());

    let retrieved = run(susdb(dir.path()).args(["retrieve", "--uid", &uid, "--key", "id"]));
    assert_eq!(stdout(&retrieved).trim(), uid);

    let unknown_key = run(susdb(dir.path()).args(["retrieve", "--uid", &uid, "--key", "nope"]));
    assert_eq!(unknown_key.status.code(), Some(8));

    let bad_close = run(susdb(dir.path()).args(["close", "--uid", &uid, "--sus", "wrong"]));
    assert_eq!(bad_close.status.code(), Some(5));

    let closed = run(susdb(dir.path()).args(["close", "--uid", &uid, "--sus", &sus]));
    assert!(closed.status.success());

    let gone = run(susdb(dir.path()).args(["verify", "--uid", &uid, "--string", "mike12345678iuiujfkk"]));
    assert_eq!(gone.status.code(), Some(4));
}

#[test]
fn cli_recover_rotates_token() {
    let dir = tempfile::tempdir().unwrap();
    let stored = run(susdb(dir.path()).args(["store", "--string", "first"]));
    let uid = labelled(&stored, "UID:");
    let old_sus = labelled(&stored, "SUS:");

    let recovered = run(susdb(dir.path()).args(["recover", "--uid", &uid, "--string", "second"]));
    assert!(recovered.status.success());
    assert_eq!(labelled(&recovered, "UID:"), uid);
    assert_ne!(labelled(&recovered, "SUS:"), old_sus);

    let verified = run(susdb(dir.path()).args(["verify", "--uid", &uid, "--string", "second"]));
    assert!(verified.status.success());
}

#[test]
fn cli_rejected_store_leaves_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(susdb(dir.path()).args(["store", "--string", ""]));

    assert_eq!(output.status.code(), Some(3));
    assert!(stdout(&output).is_empty());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "found {leftovers:?}");
}

#[test]
fn cli_check_token_does_not_delete() {
    let dir = tempfile::tempdir().unwrap();
    let stored = run(susdb(dir.path()).args(["store", "--string", "keep"]));
    let uid = labelled(&stored, "UID:");
    let sus = labelled(&stored, "SUS:");

    let checked = run(susdb(dir.path()).args(["check", "--uid", &uid, "--sus", &sus]));
    assert!(checked.status.success());
    assert_eq!(stdout(&checked).trim(), "Success");

    let wrong = run(susdb(dir.path()).args(["check", "--uid", &uid, "--sus", "wrong"]));
    assert_eq!(wrong.status.code(), Some(5));

    let verified = run(susdb(dir.path()).args(["verify", "--uid", &uid, "--string", "keep"]));
    assert!(verified.status.success());
}

#[test]
fn cli_malformed_uid_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(susdb(dir.path()).args(["view", "--uid", "../etc"]));
    assert_eq!(output.status.code(), Some(6));
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn cli_writes_log_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("logs").join("susdb.log");
    let output = run(susdb(&dir.path().join("store"))
        .arg("--log-file")
        .arg(&log)
        .args(["store", "--string", "logged"]));
    assert!(output.status.success());

    let contents = std::fs::read_to_string(&log).unwrap();
    assert!(contents.contains("[STORAGE]"));
    assert!(!contents.contains("logged\""), "secrets must not be logged");
}
