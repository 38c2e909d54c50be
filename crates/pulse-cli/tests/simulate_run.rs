use assert_cmd::Command;
use serde_json::Value;
use tempfile::tempdir;

#[test]
fn simulate_then_run_reports_plausible_hrv() {
    let temp = tempdir().unwrap();
    let recording = temp.path().join("rec.csv");
    Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "simulate",
            "--seed",
            "7",
            "--out",
            recording.to_str().unwrap(),
        ])
        .assert()
        .success();
    assert!(recording.exists());

    let out = Command::cargo_bin("pulse")
        .unwrap()
        .args(["run", "--mode", "hrv", "--input", recording.to_str().unwrap()])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&out).unwrap();
    let mean_hr = json["summary"]["mean_hr"].as_u64().expect("hrv summary");
    assert!((65..=80).contains(&mean_hr), "mean hr {mean_hr}");
    let mean_ppi = json["summary"]["mean_ppi"].as_u64().unwrap();
    assert!((750..=920).contains(&mean_ppi), "mean ppi {mean_ppi}");
}

#[test]
fn run_strict_profile_still_tracks_a_resting_recording() {
    let temp = tempdir().unwrap();
    let recording = temp.path().join("rec.csv");
    Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "simulate",
            "--seed",
            "13",
            "--out",
            recording.to_str().unwrap(),
        ])
        .assert()
        .success();

    let out = Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "run",
            "--mode",
            "hrv",
            "--strict",
            "--input",
            recording.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&out).unwrap();
    // the simulated resting rhythm sits inside the strict 60-100 BPM band
    let mean_hr = json["summary"]["mean_hr"].as_u64().expect("hrv summary");
    assert!((65..=80).contains(&mean_hr), "mean hr {mean_hr}");
}

#[test]
fn run_cloud_mode_with_analyze_prints_indices() {
    let temp = tempdir().unwrap();
    let recording = temp.path().join("rec.csv");
    Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "simulate",
            "--seed",
            "11",
            "--out",
            recording.to_str().unwrap(),
        ])
        .assert()
        .success();

    let out = Command::cargo_bin("pulse")
        .unwrap()
        .args([
            "run",
            "--mode",
            "cloud",
            "--analyze",
            "--input",
            recording.to_str().unwrap(),
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&out).unwrap();
    assert!(json["pns_index"].is_number());
    assert!(json["sns_index"].is_number());
    let mean_hr = json["mean_hr_bpm"].as_f64().unwrap();
    assert!(mean_hr > 60.0 && mean_hr < 85.0, "mean hr {mean_hr}");
}
