//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run against the dev data directory
//! and verify the JSON outputs.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "tomodoro-cli", "--"])
        .args(args)
        .env("TOMODORO_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn timer_status_reports_engine_state() {
    let (stdout, stderr, code) = run_cli(&["timer", "status"]);
    assert_eq!(code, 0, "timer status failed: {stderr}");
    let result: serde_json::Value = serde_json::from_str(&stdout).expect("JSON output");
    assert_eq!(result["success"], true);
    assert!(result["data"]["status"].is_string());
    assert!(result["data"]["remaining"].is_u64());
}

#[test]
fn pause_without_a_session_fails_cleanly() {
    // Make sure nothing is running first.
    let (_, _, code) = run_cli(&["timer", "reset"]);
    assert_eq!(code, 0);

    let (stdout, _, code) = run_cli(&["timer", "pause"]);
    assert_eq!(code, 0, "invalid transitions report, not crash");
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["success"], false);
}

#[test]
fn task_add_and_list_roundtrip() {
    let (stdout, stderr, code) = run_cli(&["task", "add", "E2E test task", "--priority", "high"]);
    assert_eq!(code, 0, "task add failed: {stderr}");
    let task: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(task["content"], "E2E test task");
    assert_eq!(task["priority"], "high");
    let id = task["id"].as_i64().unwrap();

    let (stdout, _, code) = run_cli(&["task", "list", "--all"]);
    assert_eq!(code, 0);
    let tasks: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(tasks
        .as_array()
        .unwrap()
        .iter()
        .any(|t| t["id"].as_i64() == Some(id)));

    let (_, _, code) = run_cli(&["task", "delete", &id.to_string()]);
    assert_eq!(code, 0);
}

#[test]
fn config_show_prints_toml() {
    let (stdout, stderr, code) = run_cli(&["config", "show"]);
    assert_eq!(code, 0, "config show failed: {stderr}");
    assert!(stdout.contains("[timer]"));
    assert!(stdout.contains("work_duration"));
}

#[test]
fn stats_today_reports_counters() {
    let (stdout, stderr, code) = run_cli(&["stats", "today"]);
    assert_eq!(code, 0, "stats today failed: {stderr}");
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(stats["completed_pomodoros"].is_u64());
}
