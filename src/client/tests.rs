use super::*;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> ClientConfig {
    let address = server.address();
    ClientConfig {
        backend_host: address.ip().to_string(),
        backend_port: address.port(),
        timeout_secs: 5,
    }
}

fn part_for(name: &str, contents: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("should create temp dir");
    let file = dir.path().join(name);
    std::fs::write(&file, contents).expect("should write file");
    (dir, file)
}

#[test]
fn file_parts_are_typed_by_extension() {
    for name in ["report.pdf", "README.MD", "notes.txt", "image.png", "Makefile"] {
        let (_dir, file) = part_for(name, "x");
        assert!(file_part(&file).is_ok(), "{} should become a part", name);
    }
    assert_eq!(
        mime_guess::from_path("README.MD")
            .first_or_octet_stream()
            .essence_str(),
        "text/markdown"
    );
    assert_eq!(
        mime_guess::from_path("Makefile")
            .first_or_octet_stream()
            .essence_str(),
        "application/octet-stream"
    );
}

#[test]
fn default_backend_url() {
    let client = BackendClient::new(&ClientConfig::default()).expect("Failed to create client");
    assert_eq!(client.base_url().as_str(), "http://doc_backend:8003/");
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_posts_files_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload/"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains("name=\"files\"; filename=\"sky.txt\""))
        .and(body_string_contains("text/plain"))
        .and(body_string_contains("The sky is blue."))
        .and(body_string_contains("filename=\"notes.md\""))
        .and(body_string_contains("text/markdown"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "Files processed and embeddings generated."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (_sky_dir, sky) = part_for("sky.txt", "The sky is blue.");
    let (_notes_dir, notes) = part_for("notes.md", "# Notes");
    let config = config_for(&server);

    let status = tokio::task::spawn_blocking(move || {
        BackendClient::new(&config)?.upload(&[sky, notes])
    })
    .await
    .expect("task should join")
    .expect("upload should succeed");

    assert_eq!(status, "Files processed and embeddings generated.");
}

#[tokio::test(flavor = "multi_thread")]
async fn ask_returns_answer_and_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/"))
        .and(body_partial_json(serde_json::json!({
            "question": "What color is the sky?"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "answer": "The sky is blue.",
            "sources": "sky.txt"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let answer = tokio::task::spawn_blocking(move || {
        BackendClient::new(&config)?.ask("What color is the sky?")
    })
    .await
    .expect("task should join")
    .expect("ask should succeed");

    assert_eq!(answer.answer, "The sky is blue.");
    assert_eq!(answer.sources, "sky.txt");
}

#[tokio::test(flavor = "multi_thread")]
async fn service_errors_carry_their_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query/"))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error": "No documents have been uploaded yet."
        })))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let result = tokio::task::spawn_blocking(move || BackendClient::new(&config)?.ask("anything"))
        .await
        .expect("task should join");

    let message = result.expect_err("should fail").to_string();
    assert!(message.contains("No documents have been uploaded yet."), "got: {}", message);
    assert!(message.contains("409"), "got: {}", message);
}

#[test]
fn upload_of_missing_file_fails_before_sending() {
    let client = BackendClient::new(&ClientConfig::default()).expect("Failed to create client");
    let result = client.upload(&[PathBuf::from("/definitely/not/here.txt")]);
    assert!(result.is_err());
}
