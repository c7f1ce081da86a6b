//! Group timeouts, flushing and discards

use crate::common::*;
use serde_json::json;

fn incomplete() -> String {
    lines(&[sequenced("a", json!(1), 1, 3), sequenced("a", json!(2), 2, 3)])
}

#[test]
fn test_group_timeout_releases_partial_result() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command.args([
        "--group-timeout-ms",
        "50",
        "--send-partial-result-on-timeout",
        "--drain-ms",
        "500",
    ]);

    let output = run_with_stdin(command, &incomplete());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(payloads(&output), vec![json!([1, 2])]);
}

#[test]
fn test_group_timeout_expression() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command.args([
        "--group-timeout-expression",
        "size() >= 2 ? 50 : null",
        "--send-partial-result-on-timeout",
        "--drain-ms",
        "500",
    ]);
    let input = lines(&[
        sequenced("a", json!(1), 1, 3),
        sequenced("a", json!(2), 2, 3),
        sequenced("b", json!(9), 1, 3),
    ]);

    let output = run_with_stdin(command, &input);

    // "b" holds a single message, so no timeout was ever scheduled for it
    assert_eq!(payloads(&output), vec![json!([1, 2])]);
    assert!(stderr(&output).contains("1 group(s) still open"));
}

#[test]
fn test_flush_on_exit_writes_discards() {
    let home = tempfile::tempdir().unwrap();
    let discards = home.path().join("discarded.jsonl");
    let mut command = correlator(home.path());
    command.arg("--flush-on-exit").arg("--discard-file").arg(&discards);

    let output = run_with_stdin(command, &incomplete());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(payloads(&output).is_empty());
    let written = std::fs::read_to_string(&discards).unwrap();
    let discarded: Vec<serde_json::Value> = written
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(discarded.len(), 2);
    assert_eq!(discarded[0]["payload"], json!(1));
}

#[test]
fn test_flush_on_exit_with_partial_results() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command.args(["--flush-on-exit", "--send-partial-result-on-timeout"]);

    let output = run_with_stdin(command, &incomplete());

    assert_eq!(payloads(&output), vec![json!([1, 2])]);
}

#[test]
fn test_unwritable_discard_file_fails() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command
        .arg("--discard-file")
        .arg(home.path().join("missing-dir").join("discarded.jsonl"));

    let output = run_with_stdin(command, &incomplete());

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Cannot open"));
}
