//! End-to-end checks: router → pipeline → Gemini adapter against a mocked Gemini endpoint.

use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use httpmock::{Method::POST, MockServer};
use serde_json::{Value, json};
use stututor::{
    api::{ApiSettings, create_router},
    completion::{CompletionClient, GeminiClient, GeminiSettings, RetryPolicy, RetryingClient},
    config::{Config, DEFAULT_MAX_UPLOAD_BYTES},
    processing::{DocumentService, DocumentValidator, SUMMARY_DIRECTIVE},
};
use tower::ServiceExt;

const BOUNDARY: &str = "pipeline-boundary";
const GENERATE_PATH: &str = "/models/gemini-test:generateContent";

fn router_for(server: &MockServer, retries: u32) -> Router {
    let gemini = GeminiClient::new(GeminiSettings {
        api_key: "integration-key".into(),
        model: "gemini-test".into(),
        base_url: server.base_url(),
        timeout: Duration::from_secs(5),
    })
    .expect("gemini client");
    let client: Arc<dyn CompletionClient> = Arc::new(RetryingClient::new(
        gemini,
        RetryPolicy {
            max_retries: retries,
            backoff: Duration::ZERO,
        },
    ));
    let service = Arc::new(DocumentService::new(
        client,
        DocumentValidator::new(DEFAULT_MAX_UPLOAD_BYTES),
    ));
    create_router(
        service,
        &ApiSettings {
            allowed_origins: vec!["http://localhost:3000".into()],
            max_concurrent_documents: 4,
        },
    )
}

fn form(pdf: &[u8], question: Option<&str>) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf\"; filename=\"notes.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(pdf);
    body.extend_from_slice(b"\r\n");
    if let Some(question) = question {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"question\"\r\n\r\n{question}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send(router: Router, uri: &str, body: Vec<u8>) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(
                    header::CONTENT_TYPE,
                    format!("multipart/form-data; boundary={BOUNDARY}"),
                )
                .body(Body::from(body))
                .expect("request"),
        )
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    (status, serde_json::from_slice(&bytes).expect("json"))
}

#[tokio::test]
async fn ask_round_trips_through_gemini() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .header("x-goog-api-key", "integration-key")
                .body_contains("\"text\":\"Who is the author?\"");
            then.status(200).json_body(json!({
                "candidates": [{ "content": { "parts": [{ "text": "Ada Lovelace" }] } }],
                "modelVersion": "gemini-test"
            }));
        })
        .await;

    let (status, json) = send(
        router_for(&server, 0),
        "/pdf/ask",
        form(b"%PDF-1.4 notes", Some("  Who is the author? ")),
    )
    .await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["answer"], "Ada Lovelace");
    assert_eq!(json["model_used"], "gemini-test");
}

#[tokio::test]
async fn analyze_sends_summary_directive() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_contains(SUMMARY_DIRECTIVE);
            then.status(200).json_body(json!({
                "candidates": [{ "content": { "parts": [{ "text": "A summary." }] } }]
            }));
        })
        .await;

    let (status, json) = send(router_for(&server, 0), "/pdf/analyze", form(b"%PDF", None)).await;

    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["summary"], "A summary.");
}

#[tokio::test]
async fn quota_failure_surfaces_as_server_error() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(429).json_body(json!({
                "error": { "code": 429, "message": "quota exceeded", "status": "RESOURCE_EXHAUSTED" }
            }));
        })
        .await;

    let (status, json) = send(
        router_for(&server, 0),
        "/pdf/ask",
        form(b"%PDF", Some("q")),
    )
    .await;

    assert_eq!(mock.hits_async().await, 1);
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    let detail = json["detail"].as_str().expect("detail");
    assert!(detail.starts_with("Failed to process PDF: "));
    assert!(detail.contains("quota exceeded"));
    assert!(!detail.contains("integration-key"));
}

#[tokio::test]
async fn retry_policy_bounds_upstream_attempts() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(503).body("overloaded");
        })
        .await;

    let (status, _) = send(
        router_for(&server, 2),
        "/pdf/analyze",
        form(b"%PDF", None),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(mock.hits_async().await, 3);
}

#[tokio::test]
async fn rejected_uploads_do_not_call_gemini() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).json_body(json!({ "candidates": [] }));
        })
        .await;

    let (status, json) = send(
        router_for(&server, 0),
        "/pdf/ask",
        form(b"%PDF", Some("   ")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error_type"], "missing_instruction");
    assert_eq!(mock.hits_async().await, 0);
}

#[test]
fn config_drives_gemini_settings() {
    let config = Config::from_lookup(|key| match key {
        "GEMINI_API_KEY" => Some("secret".into()),
        "GEMINI_MODEL" => Some("gemini-custom".into()),
        "COMPLETION_TIMEOUT_SECS" => Some("7".into()),
        _ => None,
    })
    .expect("config");

    let settings = GeminiSettings::from(&config);
    assert_eq!(settings.model, "gemini-custom");
    assert_eq!(settings.timeout, Duration::from_secs(7));
    assert_eq!(RetryPolicy::from(&config).max_retries, 0);
}
