//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `sentinel` binary against a snapshot store
//! in a temporary directory, so each test starts from an empty table.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Helper: a `sentinel` command bound to the store in `dir`, with the
/// process environment unable to redirect it elsewhere.
fn sentinel(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("sentinel");
    cmd.arg("--store")
        .arg(store_path(dir))
        .env_remove("SENTINEL_STORE_PATH")
        .env_remove("SENTINEL_WAREHOUSE_ENDPOINT")
        .env_remove("SENTINEL_WEBHOOK_URL")
        .env_remove("SENTINEL_LOG");
    cmd
}

fn store_path(dir: &TempDir) -> PathBuf {
    dir.path().join("interventions.json")
}

/// Create one intervention and return its task id.
fn create(dir: &TempDir, document_id: &str) -> String {
    let out = sentinel(dir)
        .args([
            "create",
            "--document-type",
            "sale.order",
            "--document-id",
            document_id,
            "--issue-type",
            "qty_mismatch",
            "--title",
            "Quantity mismatch",
            "--priority",
            "high",
        ])
        .output()
        .expect("run sentinel");
    assert!(out.status.success(), "create failed: {:?}", out);
    String::from_utf8(out.stdout).unwrap().trim().to_string()
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    cargo_bin_cmd!("sentinel")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Sentinel intervention lifecycle and audit tool",
        ));
}

#[test]
fn version_exits_0() {
    cargo_bin_cmd!("sentinel")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sentinel"));
}

#[test]
fn unknown_status_is_rejected_by_parser() {
    let dir = TempDir::new().unwrap();
    sentinel(&dir)
        .args(["list", "--status", "pending"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("pending"));
}

// ──────────────────────────────────────────────
// 2. Create, list, show
// ──────────────────────────────────────────────

#[test]
fn empty_store_lists_nothing() {
    let dir = TempDir::new().unwrap();
    sentinel(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no interventions"));
}

#[test]
fn create_then_list_and_show() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "42");
    assert!(!task_id.is_empty());
    assert!(store_path(&dir).exists());

    sentinel(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(task_id.as_str()))
        .stdout(predicate::str::contains("sale.order:42"));

    sentinel(&dir)
        .args(["show", &task_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("history:"))
        .stdout(predicate::str::contains("qty_mismatch"));
}

#[test]
fn show_unknown_task_fails() {
    let dir = TempDir::new().unwrap();
    sentinel(&dir)
        .args(["show", "no-such-task"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn create_with_dedup_reuses_open_intervention() {
    let dir = TempDir::new().unwrap();
    let first = create(&dir, "7");
    let out = sentinel(&dir)
        .args([
            "--output",
            "json",
            "create",
            "--document-type",
            "sale.order",
            "--document-id",
            "7",
            "--issue-type",
            "qty_mismatch",
            "--title",
            "again",
            "--dedup",
        ])
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(json["task_id"], first.as_str());
    assert_eq!(json["created"], false);
}

// ──────────────────────────────────────────────
// 3. Lifecycle
// ──────────────────────────────────────────────

#[test]
fn second_claim_fails() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "1");
    sentinel(&dir)
        .args(["--user", "alice", "claim", &task_id])
        .assert()
        .success()
        .stdout(predicate::str::contains("assigned"));
    sentinel(&dir)
        .args(["--user", "bob", "claim", &task_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot claim"));
}

#[test]
fn resolve_records_history_in_json() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "2");
    sentinel(&dir)
        .args(["--user", "carol", "resolve", &task_id, "--notes", "fixed upstream"])
        .assert()
        .success();

    let out = sentinel(&dir)
        .args(["--output", "json", "show", &task_id])
        .output()
        .unwrap();
    assert!(out.status.success());
    let record: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(record["status"], "resolved");
    assert_eq!(record["resolved_by"], "carol");
    assert_eq!(record["resolution_type"], "fixed");
    let history = record["status_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1]["by"], "carol");
}

#[test]
fn snooze_rejects_unparseable_time() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "3");
    sentinel(&dir)
        .args(["snooze", &task_id, "--until", "next tuesday"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --until"));
}

#[test]
fn snooze_sets_status() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "4");
    sentinel(&dir)
        .args(["snooze", &task_id, "--until", "2099-01-01T00:00:00Z"])
        .assert()
        .success()
        .stdout(predicate::str::contains("snoozed"));
}

#[test]
fn approve_without_held_plan_fails() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "5");
    sentinel(&dir)
        .args(["approve", &task_id])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot approve"))
        .stderr(predicate::str::contains("status open"));
}

#[test]
fn reject_sends_back_to_planning() {
    let dir = TempDir::new().unwrap();
    let task_id = create(&dir, "6");
    sentinel(&dir)
        .args(["reject", &task_id, "--reason", "wrong warehouse"])
        .assert()
        .success()
        .stdout(predicate::str::contains("planning"));
}

#[test]
fn json_errors_go_to_stderr_as_json() {
    let dir = TempDir::new().unwrap();
    let out = sentinel(&dir)
        .args(["--output", "json", "show", "missing"])
        .output()
        .unwrap();
    assert!(!out.status.success());
    let err: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert!(err["error"].as_str().unwrap().contains("missing"));
}

#[test]
fn quiet_suppresses_error_text() {
    let dir = TempDir::new().unwrap();
    sentinel(&dir)
        .args(["--quiet", "show", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::is_empty());
}

// ──────────────────────────────────────────────
// 4. Reports
// ──────────────────────────────────────────────

#[test]
fn stats_count_created_interventions() {
    let dir = TempDir::new().unwrap();
    create(&dir, "10");
    create(&dir, "11");
    let out = sentinel(&dir)
        .args(["--output", "json", "stats"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(stats["total"], 2);
    assert_eq!(stats["by_priority"]["high"], 2);
    assert_eq!(stats["period_days"], 7);
}

#[test]
fn agent_without_tasks_reports_zero() {
    let dir = TempDir::new().unwrap();
    sentinel(&dir)
        .args(["agent", "agent-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tasks           0"));
}

#[test]
fn derive_today_shows_open_issue() {
    let dir = TempDir::new().unwrap();
    create(&dir, "20");
    sentinel(&dir)
        .arg("derive")
        .assert()
        .success()
        .stdout(predicate::str::contains("sale.order:20:qty_mismatch  open"));
}

#[test]
fn derive_rejects_bad_date() {
    let dir = TempDir::new().unwrap();
    sentinel(&dir)
        .args(["derive", "--date", "05/02/2025"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid --date"));
}

// ──────────────────────────────────────────────
// 5. Configuration
// ──────────────────────────────────────────────

#[test]
fn invalid_config_fails_before_running() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("sentinel.toml");
    fs::write(&config, "[approval]\ndefault_threshold = 1.5\n").unwrap();
    sentinel(&dir)
        .arg("--config")
        .arg(&config)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn config_store_path_is_used_without_flag() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("sentinel.toml");
    let snapshot = dir.path().join("from-config.json");
    fs::write(
        &config,
        format!("store_path = {:?}\n", snapshot.to_string_lossy()),
    )
    .unwrap();
    cargo_bin_cmd!("sentinel")
        .env_remove("SENTINEL_STORE_PATH")
        .env_remove("SENTINEL_WAREHOUSE_ENDPOINT")
        .arg("--config")
        .arg(&config)
        .args([
            "create",
            "--document-type",
            "account.move",
            "--document-id",
            "1",
            "--issue-type",
            "unbalanced",
            "--title",
            "t",
        ])
        .assert()
        .success();
    assert!(snapshot.exists());
}
