//! Aggregated output

use crate::common::*;
use serde_json::json;
use std::io::Write;

#[test]
fn test_complete_group_is_released_as_one_message() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[
        sequenced("order-1", json!(1), 1, 3),
        sequenced("order-1", json!(2), 2, 3),
        sequenced("order-1", json!(3), 3, 3),
    ]);

    let output = run_with_stdin(correlator(home.path()), &input);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(payloads(&output), vec![json!([1, 2, 3])]);
}

#[test]
fn test_interleaved_keys_are_grouped_separately() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[
        sequenced("a", json!("a1"), 1, 2),
        sequenced("b", json!("b1"), 1, 2),
        sequenced("b", json!("b2"), 2, 2),
        sequenced("a", json!("a2"), 2, 2),
    ]);

    let output = run_with_stdin(correlator(home.path()), &input);

    assert_eq!(
        payloads(&output),
        vec![json!(["b1", "b2"]), json!(["a1", "a2"])]
    );
}

#[test]
fn test_common_headers_survive_aggregation() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[
        json!({"headers": {"correlation_id": "x", "sequence_number": 1, "sequence_size": 2, "tenant": "acme", "part": "head"}, "payload": 1}).to_string(),
        json!({"headers": {"correlation_id": "x", "sequence_number": 2, "sequence_size": 2, "tenant": "acme", "part": "tail"}, "payload": 2}).to_string(),
    ]);

    let output = run_with_stdin(correlator(home.path()), &input);

    let released = released(&output);
    assert_eq!(released.len(), 1);
    let headers = &released[0]["headers"];
    assert_eq!(headers["tenant"], json!("acme"));
    assert_eq!(headers["correlation_id"], json!("x"));
    assert!(headers.get("part").is_none());
    assert!(headers.get("sequence_number").is_none());
}

#[test]
fn test_invalid_lines_are_skipped() {
    let home = tempfile::tempdir().unwrap();
    let input = format!(
        "this is not json\n{}\n{}\n",
        keyed_without_key(),
        sequenced("a", json!(1), 1, 1)
    );

    let output = run_with_stdin(correlator(home.path()), &input);

    assert!(output.status.success());
    assert_eq!(payloads(&output), vec![json!([1])]);
    let log = stderr(&output);
    assert!(log.contains("Line 1"), "stderr: {}", log);
    assert!(log.contains("2 rejected"), "stderr: {}", log);
}

fn keyed_without_key() -> String {
    json!({"headers": {"other": 1}, "payload": 0}).to_string()
}

#[test]
fn test_input_file() {
    let home = tempfile::tempdir().unwrap();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        "{}",
        lines(&[sequenced("a", json!(1), 1, 2), sequenced("a", json!(2), 2, 2)])
    )
    .unwrap();
    let mut command = correlator(home.path());
    command.arg("--input").arg(file.path());

    let output = run_with_stdin(command, "");

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(payloads(&output), vec![json!([1, 2])]);
}

#[test]
fn test_custom_correlation_header() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[
        json!({"headers": {"batch": 7, "sequence_number": 1, "sequence_size": 2}, "payload": "x"}).to_string(),
        json!({"headers": {"batch": 7, "sequence_number": 2, "sequence_size": 2}, "payload": "y"}).to_string(),
    ]);
    let mut command = correlator(home.path());
    command.args(["--correlation-header", "batch"]);

    let output = run_with_stdin(command, &input);

    assert_eq!(payloads(&output), vec![json!(["x", "y"])]);
}
