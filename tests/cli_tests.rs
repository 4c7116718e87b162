//! Integration tests for the tickprof binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn tickprof() -> Command {
    let mut cmd = Command::cargo_bin("tickprof").unwrap();
    cmd.env_remove("TICKPROF_CALIBRATION_MS");
    cmd
}

#[test]
fn test_calibrate_prints_constants() {
    tickprof()
        .args(["calibrate", "--clock", "monotonic", "--calibration-ms", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ticks per millisecond:"))
        .stdout(predicate::str::contains("overhead ticks:"))
        .stdout(predicate::str::contains("Monotonic"));
}

#[test]
fn test_demo_csv_report() {
    let output = tickprof()
        .args(["demo", "-n", "10", "--depth", "6", "--calibration-ms", "5"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command failed with status: {}", output.status);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();

    assert_eq!(lines[0], "name,avg milliseconds,perc95,perc99,hits");
    assert_eq!(lines.len(), 4, "unexpected report:\n{}", stdout);
    // Enclosing region is the costliest
    assert!(lines[1].starts_with("demo::iteration,"));
    // Recursive fib calls collapse into one sample per iteration
    assert!(
        lines.iter().any(|line| line.starts_with("demo::fib,") && line.ends_with(",10")),
        "fib row missing or wrong hit count:\n{}",
        stdout
    );
    assert!(lines.iter().any(|line| line.starts_with("demo::checksum,") && line.ends_with(",10")));
}

#[test]
fn test_demo_json_report() {
    let output = tickprof()
        .args(["demo", "-n", "3", "--format", "json", "--calibration-ms", "5"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["format"], "tickprof-json-v1");
    assert_eq!(value["summary"]["total_regions"], 3);
    assert_eq!(value["summary"]["total_hits"], 9);
}

#[test]
fn test_demo_with_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "clock = \"monotonic\"\ncalibration_ms = 3").unwrap();

    tickprof()
        .args(["demo", "-n", "2", "--config"])
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("name,avg milliseconds,perc95,perc99,hits\n"));
}

#[test]
fn test_invalid_calibration_fails() {
    tickprof()
        .args(["calibrate", "--calibration-ms", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("calibration_ms must be at least 1"));
}

#[test]
fn test_missing_config_file_fails() {
    tickprof()
        .args(["demo", "--config", "/nonexistent/tickprof.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read profiler config"));
}

#[test]
fn test_debug_flag_logs_calibration() {
    tickprof()
        .args(["calibrate", "--clock", "monotonic", "--calibration-ms", "2", "--debug"])
        .assert()
        .success()
        .stderr(predicate::str::contains("timer calibration complete"));
}
