//! Helpers for driving the correlator binary

#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};

/// Command for the built binary, isolated from any user configuration
pub fn correlator(config_home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_correlator"));
    command
        .env("XDG_CONFIG_HOME", config_home)
        .env("HOME", config_home)
        .arg("--no-color");
    command
}

/// Run with `input` on standard input
pub fn run_with_stdin(mut command: Command, input: &str) -> Output {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start correlator");
    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("failed to write input");
    child.wait_with_output().expect("failed to wait for correlator")
}

pub fn sequenced(key: &str, payload: Value, number: u32, size: u32) -> String {
    json!({
        "headers": {"correlation_id": key, "sequence_number": number, "sequence_size": size},
        "payload": payload
    })
    .to_string()
}

pub fn keyed(key: &str, payload: Value) -> String {
    json!({"headers": {"correlation_id": key}, "payload": payload}).to_string()
}

pub fn lines(messages: &[String]) -> String {
    messages.iter().map(|m| format!("{}\n", m)).collect()
}

/// Released messages parsed from standard output
pub fn released(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("output line is not JSON"))
        .collect()
}

pub fn payloads(output: &Output) -> Vec<Value> {
    released(output)
        .into_iter()
        .map(|message| message["payload"].clone())
        .collect()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
