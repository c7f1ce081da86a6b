//! Configuration files and command line errors

use crate::common::*;
use serde_json::json;

fn write_config(dir: &std::path::Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("correlator.toml");
    std::fs::write(&path, contents).unwrap();
    path
}

fn out_of_order() -> String {
    lines(&[sequenced("a", json!(2), 2, 2), sequenced("a", json!(1), 1, 2)])
}

#[test]
fn test_explicit_config_file() {
    let home = tempfile::tempdir().unwrap();
    let config = write_config(home.path(), "mode = \"resequencer\"\n");
    let mut command = correlator(home.path());
    command.arg("--config-file").arg(&config);

    let output = run_with_stdin(command, &out_of_order());

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(payloads(&output), vec![json!(1), json!(2)]);
}

#[test]
fn test_default_config_file_is_discovered() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join("correlator");
    std::fs::create_dir_all(&dir).unwrap();
    write_config(&dir, "mode = \"resequencer\"\n");

    let output = run_with_stdin(correlator(home.path()), &out_of_order());

    assert_eq!(payloads(&output), vec![json!(1), json!(2)]);
}

#[test]
fn test_command_line_mode_overrides_config_file() {
    let home = tempfile::tempdir().unwrap();
    let config = write_config(home.path(), "mode = \"resequencer\"\n");
    let mut command = correlator(home.path());
    command
        .arg("--config-file")
        .arg(&config)
        .args(["--mode", "aggregator"]);

    let output = run_with_stdin(command, &out_of_order());

    assert_eq!(payloads(&output), vec![json!([1, 2])]);
}

#[test]
fn test_missing_config_file_fails() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command.arg("--config-file").arg(home.path().join("absent.toml"));

    let output = run_with_stdin(command, "");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("does not exist"));
}

#[test]
fn test_unknown_config_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let config = write_config(home.path(), "[aggregator]\nrelease_after = 3\n");
    let mut command = correlator(home.path());
    command.arg("--config-file").arg(&config);

    let output = run_with_stdin(command, "");

    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_invalid_timeout_expression_fails() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command.args(["--group-timeout-expression", "size() ~ 2"]);

    let output = run_with_stdin(command, "");

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("FATAL"));
}

#[test]
fn test_unknown_mode_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    let mut command = correlator(home.path());
    command.args(["--mode", "splitter"]);

    let output = run_with_stdin(command, "");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_version() {
    let home = tempfile::tempdir().unwrap();
    let output = correlator(home.path()).arg("--version").output().unwrap();

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}
