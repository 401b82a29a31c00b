//! Integration test: the tabs-harness binary runs both scenarios end to end
//! and emits schema-valid structured logs.

use std::path::PathBuf;
use std::process::Command;

use tabs_harness::structured_log::validate_log_file;

fn harness() -> Command {
    Command::new(env!("CARGO_BIN_EXE_tabs-harness"))
}

fn temp_log(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tabs-harness-{}-{name}.jsonl", std::process::id()))
}

fn run_json(args: &[&str]) -> serde_json::Value {
    let output = harness().args(args).output().expect("harness should run");
    assert!(
        output.status.success(),
        "harness failed:\nstdout={}\nstderr={}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report")
}

#[test]
fn counter_scenario_reports_exact_count() {
    let log = temp_log("counter");
    let report = run_json(&[
        "counter",
        "--threads",
        "4",
        "--increments",
        "10000",
        "--run-id",
        "cli",
        "--log",
        log.to_str().unwrap(),
        "--json",
    ]);
    assert_eq!(report["final"], 40_000);
    assert_eq!(report["expected"], 40_000);
    assert_eq!(report["difference"], 0);
    assert_eq!(report["correct"], true);

    let (lines, errors) = validate_log_file(&log).unwrap();
    assert!(errors.is_empty(), "log errors: {errors:?}");
    // start + one per worker + result
    assert_eq!(lines, 6);
    let content = std::fs::read_to_string(&log).unwrap();
    assert!(content.contains("\"trace_id\":\"tabs::cli::001\""));
    let _ = std::fs::remove_file(&log);
}

#[test]
fn sum_scenario_reports_closed_form_total() {
    let log = temp_log("sum");
    let report = run_json(&[
        "sum",
        "--threads",
        "3",
        "--len",
        "100000",
        "--log",
        log.to_str().unwrap(),
        "--json",
    ]);
    assert_eq!(report["partial_sums"].as_array().unwrap().len(), 3);
    assert_eq!(report["total"], 5_000_050_000u64);
    assert_eq!(report["correct"], true);

    let (lines, errors) = validate_log_file(&log).unwrap();
    assert!(errors.is_empty(), "log errors: {errors:?}");
    assert_eq!(lines, 5);
    let _ = std::fs::remove_file(&log);
}

#[test]
fn text_output_names_the_verdict() {
    let output = harness()
        .args(["counter", "--threads", "2", "--increments", "1000"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Final count: 2000"));
    assert!(stdout.contains("Difference:  0"));
    assert!(stdout.contains("CORRECT"));
}

#[test]
fn zero_threads_fails() {
    let output = harness()
        .args(["sum", "--threads", "0", "--len", "10"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn validate_log_rejects_malformed_lines() {
    let log = temp_log("malformed");
    std::fs::write(&log, "{\"level\":\"info\"}\nnot json\n").unwrap();
    let output = harness()
        .args(["validate-log", "--log", log.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 lines"));
    let _ = std::fs::remove_file(&log);
}

fn counter_with_min_stack(value: &str) -> serde_json::Value {
    let output = harness()
        .env("TABS_MIN_STACK", value)
        .args(["counter", "--threads", "4", "--increments", "5000", "--json"])
        .output()
        .expect("harness should run");
    assert!(
        output.status.success(),
        "TABS_MIN_STACK={value} run failed:\nstderr={}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be a JSON report")
}

#[test]
fn explicit_min_stack_from_env_is_honored() {
    let report = counter_with_min_stack("65536");
    assert_eq!(report["final"], 20_000);
    assert_eq!(report["correct"], true);

    let report = counter_with_min_stack("0x2_0000");
    assert_eq!(report["correct"], true);

    // Below the platform minimum: clamped, not rejected.
    let report = counter_with_min_stack("1");
    assert_eq!(report["correct"], true);
}

#[test]
fn unusable_min_stack_falls_back_to_os_default() {
    for value in ["garbage", "0", ""] {
        let report = counter_with_min_stack(value);
        assert_eq!(report["final"], 20_000);
        assert_eq!(report["correct"], true);
    }
}
