//! Resequencer mode

use crate::common::*;
use serde_json::json;

fn resequencer(home: &std::path::Path) -> std::process::Command {
    let mut command = correlator(home);
    command.args(["--mode", "resequencer"]);
    command
}

#[test]
fn test_out_of_order_sequence_is_written_in_order() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[
        sequenced("a", json!(4), 4, 4),
        sequenced("a", json!(2), 2, 4),
        sequenced("a", json!(1), 1, 4),
        sequenced("a", json!(3), 3, 4),
    ]);

    let output = run_with_stdin(resequencer(home.path()), &input);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        payloads(&output),
        vec![json!(1), json!(2), json!(3), json!(4)]
    );
}

#[test]
fn test_messages_keep_their_own_headers() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[sequenced("a", json!(2), 2, 2), sequenced("a", json!(1), 1, 2)]);

    let output = run_with_stdin(resequencer(home.path()), &input);

    let numbers: Vec<_> = released(&output)
        .iter()
        .map(|message| message["headers"]["sequence_number"].clone())
        .collect();
    assert_eq!(numbers, vec![json!(1), json!(2)]);
}

#[test]
fn test_keys_are_resequenced_independently() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[
        sequenced("a", json!("a2"), 2, 2),
        sequenced("b", json!("b1"), 1, 2),
        sequenced("a", json!("a1"), 1, 2),
        sequenced("b", json!("b2"), 2, 2),
    ]);

    let output = run_with_stdin(resequencer(home.path()), &input);

    assert_eq!(
        payloads(&output),
        vec![json!("b1"), json!("a1"), json!("a2"), json!("b2")]
    );
}

#[test]
fn test_incomplete_sequence_is_reported_open() {
    let home = tempfile::tempdir().unwrap();
    let input = lines(&[sequenced("a", json!(1), 1, 3), sequenced("a", json!(3), 3, 3)]);

    let output = run_with_stdin(resequencer(home.path()), &input);

    assert!(output.status.success());
    assert_eq!(payloads(&output), vec![json!(1)]);
    assert!(stderr(&output).contains("1 group(s) still open"));
}
