//! Tests for the command-line binary

use face_gaze_tracker::config::Config;
use std::path::PathBuf;
use std::process::Command;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_face-gaze-tracker"))
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("face-gaze-tracker-cli-{}-{}", std::process::id(), name))
}

#[test]
fn test_write_example_config() {
    let path = temp_path("example.yaml");
    let status = binary()
        .arg("--write-example-config")
        .arg(&path)
        .status()
        .unwrap();
    assert!(status.success());

    let config = Config::from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    config.validate().unwrap();
}

#[test]
fn test_missing_source_fails() {
    let output = binary().output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--replay"), "unexpected stderr: {stderr}");
}

#[test]
fn test_replay_and_synthetic_conflict() {
    let output = binary().args(["--replay", "frames.yaml", "--synthetic"]).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_replay_runs_to_completion() {
    let path = temp_path("replay.yaml");
    std::fs::write(
        &path,
        "frames:\n  - t: 0.0\n    detections:\n      - { x: 295, y: 215, width: 50, height: 50, confidence: 0.9 }\n  - t: 0.1\n    detections:\n      - { x: 297, y: 215, width: 50, height: 50, confidence: 0.9 }\n",
    )
    .unwrap();

    let status = binary()
        .arg("--replay")
        .arg(&path)
        .args(["--easing", "cubic", "--rate", "50"])
        .status()
        .unwrap();
    std::fs::remove_file(&path).ok();
    assert!(status.success());
}

#[test]
fn test_synthetic_with_duration() {
    let status = binary()
        .args(["--synthetic", "--duration", "0.3"])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn test_invalid_rate_rejected() {
    let output = binary().args(["--synthetic", "--rate", "0"]).output().unwrap();
    assert!(!output.status.success());
}
