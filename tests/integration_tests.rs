//! End-to-end tests for the docqa HTTP API

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use docqa::{
    config::Config,
    create_router,
    error::LlmError,
    services::{
        AnswerService, Completion, CompletionOptions, CompletionService, DocumentStore, Extractor,
    },
    AppState,
};

const BOUNDARY: &str = "docqa-test-boundary";

/// Answers every prompt with the same text, echoing the model name.
struct FixedCompletion(&'static str);

#[async_trait]
impl CompletionService for FixedCompletion {
    async fn complete(
        &self,
        _prompt: &str,
        model: &str,
        _options: &CompletionOptions,
    ) -> Result<Completion, LlmError> {
        Ok(Completion {
            text: self.0.to_string(),
            model: model.to_string(),
        })
    }
}

struct TestApp {
    router: Router,
    uploads: TempDir,
}

fn test_app(reply: &'static str) -> TestApp {
    let uploads = tempfile::tempdir().unwrap();
    let config = Config {
        upload_dir: uploads.path().to_path_buf(),
        max_file_size_mb: 1,
        ..Config::default()
    };
    let answers = AnswerService::new(Arc::new(FixedCompletion(reply)), &config);
    let store = DocumentStore::open_in_memory().unwrap();
    let state = AppState::new(config, Extractor::new(), answers, store);

    TestApp {
        router: create_router(state),
        uploads,
    }
}

enum Part<'a> {
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                name,
                file_name,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    Request::builder()
        .method("POST")
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn text_upload(user_id: &str, data: &[u8]) -> Request<Body> {
    multipart_request(&[
        Part::File {
            name: "document",
            file_name: "notes.txt",
            content_type: "text/plain",
            data,
        },
        Part::Text {
            name: "userId",
            value: user_id,
        },
    ])
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>, axum::http::HeaderMap) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec(), headers)
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body, _) = send(router, request).await;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn stored_files(dir: &TempDir) -> Vec<String> {
    std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = test_app("ok");

    let (status, body) = send_json(
        &app.router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["services"]["database"], true);
    // No API key in the default config.
    assert_eq!(body["status"], "degraded");

    let (status, _, _) = send(
        &app.router,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_document_lifecycle() {
    let app = test_app("<think>it is in line one</think>The answer is **blue**.");

    // Upload
    let (status, body) = send_json(&app.router, text_upload("u1", b"The sky is blue.\n")).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["fileType"], "text/plain");
    assert_eq!(body["file"]["content"], "The sky is blue.");
    assert_eq!(body["file"]["file_name"], "notes.txt");
    let id = body["file"]["id"].as_i64().unwrap();
    let stored_as = body["file"]["file_path"].as_str().unwrap().to_string();
    assert!(stored_as.starts_with("doc-") && stored_as.ends_with(".txt"));
    assert_eq!(stored_files(&app.uploads), vec![stored_as.clone()]);

    // List
    let (status, body) = send_json(
        &app.router,
        Request::builder().uri("/api/pdfs/u1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Chat with reasoning
    let (status, body) = send_json(
        &app.router,
        chat_request(json!({
            "pdfId": id,
            "question": "What colour is the sky?",
            "userId": "u1",
            "includeReasoning": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "blue.");
    assert_eq!(body["reasoning"], "it is in line one");

    // Preview
    let (status, bytes, headers) = send(
        &app.router,
        Request::builder()
            .uri(format!("/api/pdf/{}?userId=u1", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"The sky is blue.\n");
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain");
    assert_eq!(headers[header::CACHE_CONTROL], "public, max-age=3600");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "inline; filename=\"notes.txt\"");

    // Delete
    let (status, body) = send_json(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/pdfs/{}?userId=u1", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(stored_files(&app.uploads).is_empty());

    let (status, body) = send_json(
        &app.router,
        Request::builder().uri("/api/pdfs/u1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_extraction_stores_nothing() {
    let app = test_app("ok");

    let request = multipart_request(&[
        Part::File {
            name: "document",
            file_name: "broken.pdf",
            content_type: "application/pdf",
            data: &[0u8, 159, 146, 150, 0, 1, 2, 3],
        },
        Part::Text {
            name: "userId",
            value: "u1",
        },
    ]);
    let (status, body) = send_json(&app.router, request).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "EXTRACTION_FAILED");
    assert_eq!(
        body["error"]["message"],
        "No text content could be extracted from the document"
    );
    assert!(stored_files(&app.uploads).is_empty());

    let (_, body) = send_json(
        &app.router,
        Request::builder().uri("/api/pdfs/u1").body(Body::empty()).unwrap(),
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rejections() {
    let app = test_app("ok");

    let request = multipart_request(&[
        Part::File {
            name: "document",
            file_name: "photo.png",
            content_type: "image/png",
            data: b"\x89PNG",
        },
        Part::Text {
            name: "userId",
            value: "u1",
        },
    ]);
    let (status, body) = send_json(&app.router, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");

    let request = multipart_request(&[Part::Text {
        name: "userId",
        value: "u1",
    }]);
    let (status, body) = send_json(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "MISSING_FILE");

    let request = multipart_request(&[Part::File {
        name: "document",
        file_name: "notes.txt",
        content_type: "text/plain",
        data: b"hello",
    }]);
    let (status, body) = send_json(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let oversized = vec![b'a'; 1024 * 1024 + 10];
    let (status, body) = send_json(&app.router, text_upload("u1", &oversized)).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "FILE_TOO_LARGE");

    assert!(stored_files(&app.uploads).is_empty());
}

#[tokio::test]
async fn test_documents_are_scoped_to_owner() {
    let app = test_app("ok");

    let (_, body) = send_json(&app.router, text_upload("owner", b"private notes")).await;
    let id = body["file"]["id"].as_i64().unwrap();

    let (status, body) = send_json(
        &app.router,
        chat_request(json!({ "pdfId": id, "question": "What?", "userId": "intruder" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    let (status, _, _) = send(
        &app.router,
        Request::builder()
            .uri(format!("/api/pdf/{}?userId=intruder", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        &app.router,
        Request::builder()
            .method("DELETE")
            .uri(format!("/api/pdfs/{}", id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(stored_files(&app.uploads).len(), 1);
}

#[tokio::test]
async fn test_plain_chat_answer() {
    let app = test_app("According to the document, private notes exist.");

    let (_, body) = send_json(&app.router, text_upload("u1", b"private notes")).await;
    let id = body["file"]["id"].as_i64().unwrap();

    let (status, body) = send_json(
        &app.router,
        chat_request(json!({ "pdfId": id, "question": "What exists?", "userId": "u1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["answer"], "private notes exist.");
    assert_eq!(body["reasoning"], Value::Null);
}
