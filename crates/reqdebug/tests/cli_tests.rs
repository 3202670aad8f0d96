use assert_cmd::Command;
use predicates::prelude::*;
use tracing::info;

fn reqdebug() -> Command {
    let mut cmd = Command::cargo_bin("reqdebug").unwrap();
    // keep the tests independent of the developer's environment
    for name in ["REQDEBUG_CONFIG", "REQDEBUG_FORMAT", "REQDEBUG_SORT", "REQDEBUG_SLACK_HOOK"] {
        cmd.env_remove(name);
    }
    cmd
}

#[test]
fn test_help_command() {
    reqdebug_common::logging::ensure_test_logging(None);
    info!("Testing CLI help command");

    reqdebug().arg("--help").assert().success().stdout(predicate::str::contains("dump trees"));
}

#[test]
fn test_version_command() {
    reqdebug_common::logging::ensure_test_logging(None);
    reqdebug().arg("--version").assert().success().stdout(predicate::str::contains("reqdebug"));
}

#[test]
fn test_dump_text_from_file() {
    reqdebug_common::logging::ensure_test_logging(None);
    info!("Dumping a JSON file as text");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("order.json");
    std::fs::write(&path, r#"{"b": [1, 2], "a": "x", "id": 7}"#).unwrap();

    reqdebug()
        .args(["dump", "--format", "text"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Array(3)"))
        .stdout(predicate::str::contains(" ├─[ a ] => String(1)  \"x\""))
        .stdout(predicate::str::contains(" │  └─[ 1 ] => Integer(1)  2"))
        .stdout(predicate::str::contains(" └─[ id ] => Integer(1)  7"));
}

#[test]
fn test_dump_unsorted_from_stdin() {
    reqdebug_common::logging::ensure_test_logging(None);

    let output = reqdebug()
        .args(["dump", "--format", "text", "--no-sort", "-"])
        .write_stdin(r#"{"b": 1, "a": 2}"#)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    let b = stdout.find("[ b ]").unwrap();
    let a = stdout.find("[ a ]").unwrap();
    assert!(b < a);
}

#[test]
fn test_dump_html_embeds_assets() {
    reqdebug_common::logging::ensure_test_logging(None);

    reqdebug()
        .args(["dump", "--format", "html", "--mark", "pk", "-"])
        .write_stdin(r#"{"pk": 1}"#)
        .assert()
        .success()
        .stdout(predicate::str::contains("<style>"))
        .stdout(predicate::str::contains("dev-key-marked"));
}

#[test]
fn test_dump_rejects_invalid_json() {
    reqdebug_common::logging::ensure_test_logging(None);

    reqdebug()
        .args(["dump", "-"])
        .write_stdin("{not json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_marker_text() {
    reqdebug_common::logging::ensure_test_logging(None);

    reqdebug()
        .args(["marker", "--text", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Integer: 42"))
        .stdout(predicate::str::starts_with("#"));
}

#[test]
fn test_notify_without_hook_fails() {
    reqdebug_common::logging::ensure_test_logging(None);

    reqdebug()
        .args(["notify", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No webhook configured"));
}

#[test]
fn test_missing_subcommand() {
    reqdebug_common::logging::ensure_test_logging(None);
    reqdebug().assert().failure().stderr(predicate::str::contains("Usage"));
}
