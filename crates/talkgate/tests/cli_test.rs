//! Integration tests for the `talkgate` binary.
//!
//! Argument parsing, config management and error exits, all without a
//! voice server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `talkgate` binary with env isolation.
fn talkgate_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("talkgate");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("TALKGATE_CONFIG")
        .env_remove("TALKGATE_ACCOUNT")
        .env_remove("TALKGATE_LOG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("talkgate.toml");
    std::fs::write(&path, body).unwrap();
    path
}

const ACCOUNTS: &str = r#"
default_account = "site"

[accounts.home]
address = "127.0.0.1:9"
username = "gw-home"

[accounts.site]
address = "127.0.0.1:9"
channel = "Ops"
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    talkgate_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Mumble")
                .and(predicate::str::contains("run"))
                .and(predicate::str::contains("ping"))
                .and(predicate::str::contains("config")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    talkgate_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("talkgate"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    talkgate_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_unknown_subcommand_is_usage_error() {
    let home = tempfile::tempdir().unwrap();
    talkgate_cmd(home.path())
        .arg("launch")
        .assert()
        .code(2);
}

// ── Config management ───────────────────────────────────────────────

#[test]
fn test_config_path_honours_flag() {
    let home = tempfile::tempdir().unwrap();
    talkgate_cmd(home.path())
        .args(["--config", "/etc/talkgate/gw.toml", "config", "path"])
        .assert()
        .success()
        .stdout("/etc/talkgate/gw.toml\n");
}

#[test]
fn test_config_init_then_check() {
    let home = tempfile::tempdir().unwrap();
    let path = home.path().join("conf").join("talkgate.toml");
    let path_arg = path.to_str().unwrap();

    talkgate_cmd(home.path())
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    assert!(path.exists());

    talkgate_cmd(home.path())
        .args(["--config", path_arg, "config", "check"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Config OK")
                .and(predicate::str::contains("home voice.example.org:64738"))
                .and(predicate::str::contains("[default]")),
        );

    // A second init refuses to overwrite.
    talkgate_cmd(home.path())
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_config_check_rejects_unknown_commands() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(
        home.path(),
        &format!("{ACCOUNTS}\n[http]\nenabled = true\ncommands = [\"SelfDestruct\"]\n"),
    );

    talkgate_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "config", "check"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("SelfDestruct"));
}

#[test]
fn test_config_check_marks_override_account() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), ACCOUNTS);

    talkgate_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "--account", "home", "config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("home 127.0.0.1:9 as gw-home (channel -) [default]"));
}

// ── Error exits ─────────────────────────────────────────────────────

#[test]
fn test_run_without_config_points_at_init() {
    let home = tempfile::tempdir().unwrap();
    talkgate_cmd(home.path())
        .args(["--config", home.path().join("missing.toml").to_str().unwrap(), "run"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("talkgate config init"));
}

#[test]
fn test_unknown_account_is_config_error() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), ACCOUNTS);

    talkgate_cmd(home.path())
        .args(["--config", path.to_str().unwrap(), "--account", "cabin", "ping"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("cabin"));
}

#[test]
fn test_ping_reports_unreachable_servers() {
    let home = tempfile::tempdir().unwrap();
    let path = write_config(home.path(), ACCOUNTS);

    talkgate_cmd(home.path())
        .args([
            "--config",
            path.to_str().unwrap(),
            "--quiet",
            "ping",
            "--timeout-ms",
            "200",
        ])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("home")
                .and(predicate::str::contains("site"))
                .and(predicate::str::contains("unreachable")),
        );
}
