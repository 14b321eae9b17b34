//! Web API File Tests
//!
//! Integration tests for the list, upload, download and delete endpoints.

use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use axum_test::TestServer;
use depot::config::WebConfig;
use depot::file::{BlobStore, FileRepository, NewFileRecord, STAGING_DIR};
use depot::web::handlers::AppState;
use depot::web::router::create_router;
use depot::Database;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;

/// Test server together with the stores behind it.
struct TestApp {
    server: TestServer,
    db: Arc<Database>,
    storage: Arc<BlobStore>,
    _temp_dir: TempDir,
}

/// Create a test server with an in-memory database and a temporary blob directory.
async fn create_test_app(max_upload_size: Option<u64>) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let db = Arc::new(
        Database::open_in_memory()
            .await
            .expect("Failed to create test database"),
    );
    let storage = Arc::new(
        BlobStore::new(temp_dir.path().join("uploads")).expect("Failed to create blob store"),
    );

    let mut app_state = AppState::new(db.clone(), storage.clone());
    if let Some(limit) = max_upload_size {
        app_state = app_state.with_max_upload_size(limit);
    }

    let router = create_router(Arc::new(app_state), &WebConfig::default());
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        db,
        storage,
        _temp_dir: temp_dir,
    }
}

fn file_form(filename: &str, content: &[u8]) -> MultipartForm {
    MultipartForm::new().add_part("file", Part::bytes(content.to_vec()).file_name(filename))
}

/// Number of uploads still sitting in the staging directory.
fn staging_entries(app: &TestApp) -> usize {
    std::fs::read_dir(app.storage.base_path().join(STAGING_DIR))
        .unwrap()
        .count()
}

/// Upload a file and return its ID.
async fn upload(server: &TestServer, filename: &str, content: &[u8]) -> i64 {
    let response = server
        .post("/upload")
        .multipart(file_form(filename, content))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    body["data"]["id"].as_i64().unwrap()
}

// ============================================================================
// Full lifecycle
// ============================================================================

#[tokio::test]
async fn test_upload_list_download_delete() {
    let app = create_test_app(None).await;
    let content = b"%PDF-1.4 fake report";

    // Upload
    let response = app
        .server
        .post("/upload")
        .multipart(file_form("report.pdf", content))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "File uploaded successfully");
    let id = body["data"]["id"].as_i64().unwrap();

    // List
    let response = app.server.get("/").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let files = body["data"].as_array().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["id"], id);
    assert_eq!(files[0]["original_name"], "report.pdf");
    assert_eq!(files[0]["downloads"], 0);
    assert!(files[0]["upload_date"].is_string());
    assert!(files[0].get("generated_name").is_none());

    // Download
    let response = app.server.get(&format!("/download/{id}")).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), content);
    assert_eq!(
        response.header(CONTENT_DISPOSITION),
        "attachment; filename=\"report.pdf\""
    );
    assert_eq!(response.header(CONTENT_TYPE), "application/pdf");
    assert_eq!(
        response.header(CONTENT_LENGTH),
        content.len().to_string().as_str()
    );

    let body: Value = app.server.get("/").await.json();
    assert_eq!(body["data"][0]["downloads"], 1);

    // Delete
    let response = app.server.delete(&format!("/delete/{id}")).await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "File deleted");

    assert!(app.storage.list().await.unwrap().is_empty());

    // Gone
    let response = app.server.get(&format!("/download/{id}")).await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body: Value = app.server.get("/").await.json();
    assert!(body["data"].as_array().unwrap().is_empty());
}

// ============================================================================
// List Tests
// ============================================================================

#[tokio::test]
async fn test_list_empty() {
    let app = create_test_app(None).await;

    let response = app.server.get("/").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"], Value::Array(vec![]));
}

#[tokio::test]
async fn test_list_newest_first() {
    let app = create_test_app(None).await;

    let first = upload(&app.server, "first.txt", b"1").await;
    let second = upload(&app.server, "second.txt", b"2").await;
    let third = upload(&app.server, "third.txt", b"3").await;

    let body: Value = app.server.get("/").await.json();
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["id"].as_i64().unwrap())
        .collect();

    assert_eq!(ids, vec![third, second, first]);
}

// ============================================================================
// Upload Tests
// ============================================================================

#[tokio::test]
async fn test_upload_stores_blob_under_generated_name() {
    let app = create_test_app(None).await;

    let id = upload(&app.server, "../../etc/passwd.txt", b"not really").await;

    let record = FileRepository::new(app.db.pool())
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.original_name, "../../etc/passwd.txt");
    assert!(record.generated_name.ends_with(".txt"));
    assert!(!record.generated_name.contains('/'));
    assert!(app.storage.exists(&record.generated_name).await);
}

#[tokio::test]
async fn test_upload_without_file_field() {
    let app = create_test_app(None).await;

    let form = MultipartForm::new().add_text("comment", "no file here");
    let response = app.server.post("/upload").multipart(form).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "BAD_REQUEST");
    assert_eq!(body["error"]["message"], "No file provided");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let app = create_test_app(None).await;

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("", b"content"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(app.storage.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_too_large() {
    let app = create_test_app(Some(8)).await;

    let response = app
        .server
        .post("/upload")
        .multipart(file_form("big.bin", b"123456789"))
        .await;

    response.assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    assert!(app.storage.list().await.unwrap().is_empty());
    assert_eq!(staging_entries(&app), 0);
}

#[tokio::test]
async fn test_upload_large_file_arrives_intact() {
    let app = create_test_app(None).await;
    let content: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    let id = upload(&app.server, "dump.bin", &content).await;

    let response = app.server.get(&format!("/download/{id}")).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), content.as_slice());
    assert_eq!(staging_entries(&app), 0);
}

// ============================================================================
// Download Tests
// ============================================================================

#[tokio::test]
async fn test_download_not_found() {
    let app = create_test_app(None).await;

    let response = app.server.get("/download/999").await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(body["error"]["message"], "File not found");
}

#[tokio::test]
async fn test_download_counts_each_request() {
    let app = create_test_app(None).await;
    let id = upload(&app.server, "notes.txt", b"hello").await;

    for _ in 0..3 {
        app.server
            .get(&format!("/download/{id}"))
            .await
            .assert_status_ok();
    }

    let record = FileRepository::new(app.db.pool())
        .get_by_id(id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.downloads, 3);
}

#[tokio::test]
async fn test_download_dangling_record() {
    let app = create_test_app(None).await;
    let record = FileRepository::new(app.db.pool())
        .create(&NewFileRecord::new("ghost.txt", "123.txt"))
        .await
        .unwrap();

    let response = app.server.get(&format!("/download/{}", record.id)).await;

    response.assert_status(StatusCode::NOT_FOUND);
    let record = FileRepository::new(app.db.pool())
        .get_by_id(record.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.downloads, 0);
}

#[tokio::test]
async fn test_download_unknown_type_is_octet_stream() {
    let app = create_test_app(None).await;
    let id = upload(&app.server, "data.zzzunknown", b"\x00\x01\x02").await;

    let response = app.server.get(&format!("/download/{id}")).await;

    response.assert_status_ok();
    assert_eq!(response.header(CONTENT_TYPE), "application/octet-stream");
    assert_eq!(response.as_bytes().as_ref(), b"\x00\x01\x02");
}

// ============================================================================
// Delete Tests
// ============================================================================

#[tokio::test]
async fn test_delete_not_found() {
    let app = create_test_app(None).await;

    let response = app.server.delete("/delete/42").await;

    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_twice() {
    let app = create_test_app(None).await;
    let id = upload(&app.server, "once.txt", b"x").await;

    app.server
        .delete(&format!("/delete/{id}"))
        .await
        .assert_status_ok();
    app.server
        .delete(&format!("/delete/{id}"))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_with_missing_blob() {
    let app = create_test_app(None).await;
    let record = FileRepository::new(app.db.pool())
        .create(&NewFileRecord::new("ghost.txt", "456.txt"))
        .await
        .unwrap();

    let response = app.server.delete(&format!("/delete/{}", record.id)).await;

    response.assert_status_ok();
    assert_eq!(FileRepository::new(app.db.pool()).count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_only_removes_target() {
    let app = create_test_app(None).await;
    let keep = upload(&app.server, "keep.txt", b"keep").await;
    let gone = upload(&app.server, "gone.txt", b"gone").await;

    app.server
        .delete(&format!("/delete/{gone}"))
        .await
        .assert_status_ok();

    let response = app.server.get(&format!("/download/{keep}")).await;
    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"keep");
    assert_eq!(app.storage.list().await.unwrap().len(), 1);
}

// ============================================================================
// Misc
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = create_test_app(None).await;

    let response = app.server.get("/health").await;

    response.assert_status_ok();
    assert_eq!(response.text(), "OK");
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_test_app(None).await;

    let response = app.server.get("/api-docs/openapi.json").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert!(body["paths"]["/upload"]["post"].is_object());
    assert!(body["paths"]["/download/{id}"]["get"].is_object());
}

#[tokio::test]
async fn test_non_numeric_id_rejected() {
    let app = create_test_app(None).await;

    let response = app.server.get("/download/abc").await;

    response.assert_status(StatusCode::BAD_REQUEST);
}
