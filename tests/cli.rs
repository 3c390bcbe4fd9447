use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shopsync(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shopsync").unwrap();
    cmd.env("SHOPSYNC_HOME", home.path()).env_remove("RUST_LOG");
    cmd
}

fn add_action(home: &TempDir, action_type: &str, payload: &str) -> String {
    let output = shopsync(home)
        .args(["add", action_type, "--payload", payload, "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let action: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    action["id"].as_str().unwrap().to_string()
}

#[test]
fn test_help() {
    Command::cargo_bin("shopsync")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("QUICK START"));
}

#[test]
fn test_empty_status() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args(["status", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
}

#[test]
fn test_add_persists_across_invocations() {
    let home = TempDir::new().unwrap();

    let first = add_action(&home, "order:place", r#"{"total": 5000}"#);
    let second = add_action(&home, "chat:send", r#"{"text": "hi"}"#);

    let output = shopsync(&home).args(["list", "-o", "json"]).output().unwrap();
    assert!(output.status.success());
    let list: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(list["count"], 2);
    assert_eq!(list["items"][0]["id"], first.as_str());
    assert_eq!(list["items"][1]["id"], second.as_str());
    assert_eq!(list["items"][0]["status"], "queued");
    assert_eq!(list["items"][0]["payload"]["total"], 5000);

    assert!(home.path().join("shopsync.db").exists());
}

#[test]
fn test_add_rejects_invalid_payload() {
    let home = TempDir::new().unwrap();

    shopsync(&home)
        .args(["add", "order:place", "--payload", "{not json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid payload JSON"));
}

#[test]
fn test_remove_action() {
    let home = TempDir::new().unwrap();
    let id = add_action(&home, "return:request", r#"{"orderId": "o-1"}"#);

    shopsync(&home)
        .args(["remove", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("Removed action: {id}")));

    shopsync(&home)
        .args(["remove", &id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_clear_requires_force() {
    let home = TempDir::new().unwrap();
    add_action(&home, "order:place", "{}");
    add_action(&home, "wallet:topup", r#"{"amount": 20}"#);

    shopsync(&home)
        .arg("clear")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));

    shopsync(&home)
        .args(["clear", "--force"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 2 action(s)"));

    shopsync(&home)
        .args(["status", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
}

#[test]
fn test_run_against_unreachable_backend_marks_failed() {
    let home = TempDir::new().unwrap();
    std::fs::write(
        home.path().join("config.yaml"),
        "queue:\n  max_retry_attempts: 2\n  initial_retry_delay_ms: 1\n  max_retry_delay_ms: 1\napi:\n  base_url: http://127.0.0.1:1\n",
    )
    .unwrap();

    let id = add_action(&home, "order:place", r#"{"total": 5000}"#);

    let output = shopsync(&home)
        .args(["run", "--timeout", "60", "-o", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(summary["sent"], 0);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["failures"][0]["id"], id.as_str());
    assert_eq!(summary["failures"][0]["retryCount"], 2);

    shopsync(&home)
        .args(["list", "--status", "failed", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"count\": 1"));

    shopsync(&home)
        .args(["retry", "--all"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Requeued 1 failed action(s)"));

    shopsync(&home)
        .args(["list", "--status", "queued", "-o", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"retryCount\": 0"));
}
