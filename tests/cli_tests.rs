//! End-to-end tests for the `chatlog` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

/// A `chatlog` command isolated from the user's configuration.
fn chatlog(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("chatlog").unwrap();
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env_remove("CHATLOG_FOLDER")
        .env_remove("CHATLOG_CONFIG")
        .env_remove("CHATLOG_OUTPUT")
        .env_remove("RUST_LOG");
    cmd
}

fn record(home: &Path, folder: &Path, conversation: &str, contact: &str, text: &str) {
    chatlog(home)
        .arg("--folder")
        .arg(folder)
        .args(["record", conversation, contact, text])
        .assert()
        .success();
}

#[test]
fn test_id_escapes_reserved_characters() {
    let home = tempfile::tempdir().unwrap();
    chatlog(home.path())
        .args(["id", "Room/Name:1"])
        .assert()
        .success()
        .stdout("Room2fName3a1\n");
}

#[test]
fn test_id_path_uses_folder() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["id", "a b", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("a20b.xml"));
}

#[test]
fn test_record_then_list_and_show() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    record(home.path(), &folder, "standup", "Ada", "morning all");
    record(home.path(), &folder, "standup", "Charles", "engine is ready");

    assert!(folder.join("standup.xml").exists());

    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("standup"))
        .stdout(predicate::str::contains("1 conversations, 2 messages"));

    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["show", "standup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ada: morning all"))
        .stdout(predicate::str::contains("Charles: engine is ready"));
}

#[test]
fn test_record_ignores_blank_text() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["record", "quiet", "Ada", "   "])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing recorded"));
}

#[test]
fn test_search_walks_matches_across_conversations() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    record(home.path(), &folder, "first", "Ada", "hello there");
    record(home.path(), &folder, "first", "Ada", "goodbye");
    record(home.path(), &folder, "second", "Charles", "hello again");

    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["--output", "compact", "search", "HELLO"])
        .assert()
        .success()
        .stdout(predicate::str::contains("first:0"))
        .stdout(predicate::str::contains("second:0"))
        .stdout(predicate::str::contains("first:1").not());
}

#[test]
fn test_search_without_matches() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    record(home.path(), &folder, "first", "Ada", "hello there");

    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["search", "zebra"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches for \"zebra\""));
}

#[test]
fn test_list_json_output() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    record(home.path(), &folder, "json-check", "Ada", "structured");

    let output = chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["--json", "list"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(rows[0]["id"], "json-check");
    assert_eq!(rows[0]["messages"], 1);
}

#[test]
fn test_show_missing_conversation_fails() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    std::fs::create_dir_all(&folder).unwrap();

    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["show", "nobody"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("chatlog: Conversation not found"))
        .stderr(predicate::str::contains("nobody"));
}

#[test]
fn test_missing_folder_fails() {
    let home = tempfile::tempdir().unwrap();
    chatlog(home.path())
        .arg("--folder")
        .arg(home.path().join("absent"))
        .arg("list")
        .assert()
        .failure();
}

#[test]
fn test_config_init_and_path() {
    let home = tempfile::tempdir().unwrap();
    let config = home.path().join("chatlog.toml");

    chatlog(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(config.exists());

    chatlog(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .code(5)
        .stderr(predicate::str::contains("--force"));

    chatlog(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(file exists)"));

    chatlog(home.path())
        .arg("--config")
        .arg(&config)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[store]"));
}

#[test]
fn test_explicit_config_must_exist() {
    let home = tempfile::tempdir().unwrap();
    chatlog(home.path())
        .arg("--config")
        .arg(home.path().join("missing.toml"))
        .arg("list")
        .assert()
        .failure();
}

#[test]
fn test_watch_with_timeout_reports_status() {
    let home = tempfile::tempdir().unwrap();
    let folder = home.path().join("logs");
    record(home.path(), &folder, "watched", "Ada", "still here");

    chatlog(home.path())
        .arg("--folder")
        .arg(&folder)
        .args(["watch", "--poll", "--interval", "50", "--timeout", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 conversations, 1 messages"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    chatlog(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chatlog"));
}
