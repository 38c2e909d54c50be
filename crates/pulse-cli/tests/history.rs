use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn run_appends_to_history_and_history_lists_it() {
    let temp = tempdir().unwrap();
    let recording = temp.path().join("rec.csv");
    let history = temp.path().join("history.jsonl");
    Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "simulate",
            "--seed",
            "5",
            "--out",
            recording.to_str().unwrap(),
        ])
        .assert()
        .success();
    Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "run",
            "--mode",
            "hrv",
            "--input",
            recording.to_str().unwrap(),
            "--history",
            history.to_str().unwrap(),
        ])
        .assert()
        .success();

    let out = Command::cargo_bin("pulse")
        .unwrap()
        .args(["history", "--file", history.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries: Value = serde_json::from_slice(&out).unwrap();
    let entries = entries.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["mode"], "basic_hrv");
    assert!(entries[0]["mean_hr"].as_u64().unwrap() > 0);
}

#[test]
fn history_command_handles_a_missing_file() {
    let temp = tempdir().unwrap();
    let out = Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "history",
            "--file",
            temp.path().join("absent.jsonl").to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let entries: Value = serde_json::from_slice(&out).unwrap();
    assert!(entries.as_array().unwrap().is_empty());
}
