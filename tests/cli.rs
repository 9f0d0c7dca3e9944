#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Tests that run the compiled binary

use std::process::{Command, Output};
use std::time::{Duration, Instant};

fn doc_query(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_doc-query"));
    command.args(args).env_clear().env("RUST_LOG", "info");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("should run doc-query")
}

#[test]
fn serve_exits_when_the_store_never_becomes_ready() {
    let started = Instant::now();
    let output = doc_query(
        &["serve"],
        &[
            ("VECTOR_DB", "redis"),
            ("REDIS_HOST", "127.0.0.1"),
            ("REDIS_PORT", "1"),
            ("STORE_READY_TIMEOUT", "1"),
            ("OPENAI_API_KEY", "sk-test"),
            ("SERVER_PORT", "18765"),
        ],
    );

    assert!(!output.status.success());
    assert!(started.elapsed() < Duration::from_secs(30));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("CRITICAL"), "stderr: {}", stderr);
}

#[test]
fn serve_requires_an_api_key_for_openai() {
    let output = doc_query(&["serve"], &[("VECTOR_DB", "redis")]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("OPENAI_API_KEY"), "stderr: {}", stderr);
}

#[test]
fn config_masks_the_api_key() {
    let output = doc_query(
        &["config"],
        &[("OPENAI_API_KEY", "sk-secret-1234"), ("VECTOR_DB", "redis")],
    );

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("****1234"), "stdout: {}", stdout);
    assert!(!stdout.contains("sk-secret"));
}

#[test]
fn invalid_environment_is_reported() {
    let output = doc_query(&["config"], &[("REDIS_PORT", "not-a-port")]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("REDIS_PORT"), "stderr: {}", stderr);
}

#[test]
fn ask_reports_an_unreachable_backend() {
    let output = doc_query(
        &["ask", "What color is the sky?"],
        &[("BACKEND_HOST", "127.0.0.1"), ("BACKEND_PORT", "1")],
    );

    assert!(!output.status.success());
}
