use std::fs;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use mockito::Matcher;
use serde_json::json;

fn qx(args: &[&str], envs: &[(&str, &str)]) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_qx"));
    cmd.args(args)
        .env_remove("OPENAI_API_KEY")
        .env_remove("OPENAI_API_BASE_URL")
        .env_remove("OPENAI_ORGANIZATION_ID")
        .env_remove("QX_DEBUG")
        .env_remove("QX_TIMEOUT")
        .env("LOG_OUTPUT", "stderr")
        .env("RUST_LOG", "off");
    for (key, value) in envs {
        cmd.env(key, value);
    }
    cmd
}

fn run(args: &[&str], envs: &[(&str, &str)]) -> Output {
    qx(args, envs).output().expect("failed to run qx binary")
}

#[test]
fn version_prints_package_version() {
    let output = run(&["--version"], &[]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.starts_with(&format!("qx version {}", env!("CARGO_PKG_VERSION"))),
        "unexpected version output:\n{stdout}"
    );
    assert!(stdout.contains("Copyright"));
}

#[test]
fn license_prints_notices() {
    let output = run(&["--license"], &[]);
    assert_eq!(output.status.code(), Some(0));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("MIT License"));
    assert!(stdout.contains("THIRD-PARTY NOTICES"));
    assert!(stdout.contains("reqwest"));
}

#[test]
fn help_exits_cleanly() {
    let output = run(&["--help"], &[]);
    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("--web-search"));
}

#[test]
fn empty_prompt_exits_with_general_error() {
    let output = run(&["   "], &[("OPENAI_API_KEY", "sk-test")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: Prompt cannot be empty."));
    assert!(output.stdout.is_empty());
}

#[test]
fn missing_api_key_exits_with_network_error() {
    let output = run(&["what", "is", "rust"], &[]);
    assert_eq!(output.status.code(), Some(3));
    assert!(
        String::from_utf8_lossy(&output.stderr)
            .contains("OPENAI_API_KEY environment variable is not set")
    );
}

#[test]
fn invalid_temperature_exits_with_general_error() {
    let output = run(&["hi", "-t", "3.5"], &[("OPENAI_API_KEY", "sk-test")]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: Invalid option"));
}

#[test]
fn unknown_flag_exits_with_general_error() {
    let output = run(&["hi", "--bogus"], &[]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unreachable_api_exits_with_network_error() {
    let output = run(
        &["hi"],
        &[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE_URL", "http://127.0.0.1:9/v1"),
        ],
    );
    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("OPENAI_API_BASE_URL"));
}

#[test]
fn writes_response_to_output_file() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/responses")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "input": [{ "role": "user", "content": "piped\n\nsummarize" }]
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "model": "gpt-5",
                "status": "completed",
                "output": [
                    { "type": "message", "content": [{ "type": "output_text", "text": "All done." }] }
                ]
            })
            .to_string(),
        )
        .create();

    let dir = tempfile::tempdir().expect("tempdir");
    let out_path = dir.path().join("answer.txt");
    let base_url = format!("{}/v1", server.url());
    let out_arg = out_path.to_string_lossy().into_owned();

    let mut child = qx(
        &["summarize", "-o", &out_arg, "--no-web-search"],
        &[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_API_BASE_URL", &base_url),
        ],
    )
    .stdin(Stdio::piped())
    .stdout(Stdio::piped())
    .stderr(Stdio::piped())
    .spawn()
    .expect("failed to spawn qx binary");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"piped\n")
        .expect("failed to write stdin");
    let output = child.wait_with_output().expect("qx should finish");

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    mock.assert();

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Response saved to:"), "stdout:\n{stdout}");
    assert_eq!(fs::read_to_string(&out_path).expect("output file"), "All done.");
}

#[test]
fn api_error_exits_with_api_code() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/responses")
        .with_status(401)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create();

    let base_url = format!("{}/v1", server.url());
    let output = run(
        &["hi"],
        &[
            ("OPENAI_API_KEY", "sk-bad"),
            ("OPENAI_API_BASE_URL", &base_url),
        ],
    );

    mock.assert();
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Incorrect API key provided"));
}
