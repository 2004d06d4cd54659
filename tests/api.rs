//! API endpoint integration tests

use std::path::Path;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use iris_gateway::api::{self, ApiState, DEFAULT_MAX_UPLOAD_BYTES};
use iris_gateway::queue::{HandoffReceiver, handoff_queue};
use iris_gateway::{CredentialResolver, ImageAnalyzer};
use secrecy::ExposeSecret;
use tower::ServiceExt;

mod common;
use common::{BOUNDARY, FakeAnalyzer, key_file_resolver, multipart_body};

struct TestApp {
    router: axum::Router,
    queue: HandoffReceiver,
    credentials: Arc<CredentialResolver>,
    dir: tempfile::TempDir,
}

impl TestApp {
    fn uploads(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    fn key_file(&self) -> std::path::PathBuf {
        self.dir.path().join("groq_api_key.txt")
    }
}

/// Build a test API router
fn build_test_app(analyzer: Arc<dyn ImageAnalyzer>) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let credentials = key_file_resolver(dir.path().join("groq_api_key.txt"));
    let (queue_tx, queue_rx) = handoff_queue();

    let state = Arc::new(ApiState {
        upload_dir: dir.path().join("uploads"),
        analyzer,
        queue: queue_tx,
        credentials: Arc::clone(&credentials),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    });

    TestApp {
        router: api::router(state),
        queue: queue_rx,
        credentials,
        dir,
    }
}

fn upload_request(parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

fn set_key_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/set-api-key")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map_or(0, Iterator::count)
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));

    let response = app
        .router
        .oneshot(Request::builder().uri("/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "API is running");
}

#[tokio::test]
async fn test_ping_endpoint() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));

    let response = app
        .router
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["message"], "pong");
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));

    let response = app
        .router
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_upload_rejects_disallowed_extension() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));
    let uploads = app.uploads();

    let response = app
        .router
        .oneshot(upload_request(&[("image", "photo.txt", b"not an image".as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(
        json,
        serde_json::json!([{ "error": "File type not allowed: photo.txt" }])
    );
    assert_eq!(file_count(&uploads), 0);
    assert!(app.queue.is_empty());
}

#[tokio::test]
async fn test_upload_saves_analyzes_and_enqueues() {
    let mut app = build_test_app(FakeAnalyzer::describing("A cat on a rug."));
    let uploads = app.uploads();

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&[("image", "Cat Photo.PNG", b"\x89PNG fake".as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);

    let entry = &entries[0];
    assert_eq!(entry["success"], true);
    assert_eq!(entry["original_filename"], "Cat_Photo.PNG");
    assert_eq!(entry["analysis"], "A cat on a rug.");

    let filename = entry["filename"].as_str().unwrap();
    assert!(filename.ends_with(".png"));
    assert_eq!(filename.len(), 32 + ".png".len());

    let saved = uploads.join(filename);
    assert_eq!(entry["file_path"], saved.display().to_string());
    assert_eq!(std::fs::read(&saved).unwrap(), b"\x89PNG fake");

    let queued = app.queue.try_dequeue().unwrap();
    assert_eq!(queued.source_filename, "Cat_Photo.PNG");
    assert_eq!(
        queued.message_to_say,
        "I received an image upload. A cat on a rug."
    );
    assert!(app.queue.try_dequeue().is_none());
}

#[tokio::test]
async fn test_upload_mixed_batch_reports_each_file() {
    let mut app = build_test_app(FakeAnalyzer::describing("A dog."));
    let uploads = app.uploads();

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&[
            ("image", "dog.jpg", b"jpeg bytes".as_slice()),
            ("image", "notes.pdf", b"pdf bytes".as_slice()),
            ("image", "anim.GIF", b"gif bytes".as_slice()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0]["success"], true);
    assert_eq!(entries[1]["error"], "File type not allowed: notes.pdf");
    assert_eq!(entries[2]["success"], true);

    assert_eq!(file_count(&uploads), 2);
    assert_eq!(app.queue.try_dequeue().unwrap().source_filename, "dog.jpg");
    assert_eq!(app.queue.try_dequeue().unwrap().source_filename, "anim.GIF");
}

#[tokio::test]
async fn test_upload_with_failed_analysis_still_succeeds() {
    let mut app = build_test_app(FakeAnalyzer::failing());

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&[("image", "cat.png", b"png bytes".as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json[0]["success"], true);
    assert!(
        json[0]["analysis"]
            .as_str()
            .unwrap()
            .starts_with("analysis failed:")
    );

    let queued = app.queue.try_dequeue().unwrap();
    assert!(queued.message_to_say.contains("Sorry"));
}

#[tokio::test]
async fn test_upload_without_image_part() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));

    let response = app
        .router
        .oneshot(upload_request(&[("document", "cat.png", b"png bytes".as_slice())]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = json_body(response).await;
    assert_eq!(json["error"], "No file part");
}

#[tokio::test]
async fn test_set_api_key_requires_key() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));

    for body in [r"{}", r#"{"apiKey": "   "}"#, "not json"] {
        let response = app
            .router
            .clone()
            .oneshot(set_key_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = json_body(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "API key is required");
    }

    assert!(!app.key_file().exists());
}

#[tokio::test]
async fn test_set_api_key_persists_and_activates() {
    let app = build_test_app(FakeAnalyzer::describing("unused"));
    assert!(app.credentials.get_credential().await.is_none());

    let response = app
        .router
        .clone()
        .oneshot(set_key_request(r#"{"apiKey": "gsk-new-key"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["message"], "API key set successfully");

    assert_eq!(
        std::fs::read_to_string(app.key_file()).unwrap().trim(),
        "gsk-new-key"
    );

    let credential = app.credentials.get_credential().await.unwrap();
    assert_eq!(credential.expose_secret(), "gsk-new-key");
}

#[tokio::test]
async fn test_set_api_key_without_backend_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (queue_tx, _queue_rx) = handoff_queue();
    let state = Arc::new(ApiState {
        upload_dir: dir.path().join("uploads"),
        analyzer: FakeAnalyzer::describing("unused"),
        queue: queue_tx,
        credentials: Arc::new(CredentialResolver::new("IRIS_TEST_KEY").with_env_lookup(|_| None)),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    });

    let response = api::router(state)
        .oneshot(set_key_request(r#"{"apiKey": "gsk-new-key"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["success"], false);
    assert!(json["message"].as_str().unwrap().starts_with("Error: "));
}

#[tokio::test]
async fn test_upload_storage_failure_is_reported_per_file() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("uploads");
    std::fs::write(&blocker, b"").unwrap();

    let (queue_tx, mut queue_rx) = handoff_queue();
    let state = Arc::new(ApiState {
        upload_dir: blocker,
        analyzer: FakeAnalyzer::describing("unused"),
        queue: queue_tx,
        credentials: key_file_resolver(dir.path().join("groq_api_key.txt")),
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
    });

    let response = api::router(state)
        .oneshot(upload_request(&[
            ("image", "a.png", b"png a".as_slice()),
            ("image", "b.png", b"png b".as_slice()),
        ]))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert!(entry["error"].as_str().unwrap().starts_with("upload error: could not create"));
    }
    assert!(queue_rx.try_dequeue().is_none());
}
