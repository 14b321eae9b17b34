//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use super::dto::{FileResponse, MessageResponse, UploadResponse};
use super::handlers::{self, delete_file, download_file, list_files, upload_file, AppState};
use super::middleware::create_cors_layer;
use crate::config::WebConfig;

/// Room left for multipart framing on top of the upload limit (1MB).
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

/// OpenAPI document for the file API.
#[derive(OpenApi)]
#[openapi(
    info(title = "depot", description = "Minimal file storage service"),
    paths(
        handlers::file::list_files,
        handlers::file::upload_file,
        handlers::file::download_file,
        handlers::file::delete_file
    ),
    components(schemas(FileResponse, UploadResponse, MessageResponse)),
    tags((name = "files", description = "Upload, download and delete files"))
)]
pub struct ApiDoc;

/// Create the main API router.
pub fn create_router(app_state: Arc<AppState>, web_config: &WebConfig) -> Router {
    let body_limit = usize::try_from(app_state.max_upload_size.saturating_add(MULTIPART_OVERHEAD))
        .unwrap_or(usize::MAX);

    Router::new()
        .route("/", get(list_files))
        .route("/upload", post(upload_file))
        .route("/download/:id", get(download_file))
        .route("/delete/:id", delete(delete_file))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
        .merge(create_health_router())
        .merge(create_openapi_router())
        .layer(create_cors_layer(&web_config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Create a router serving the OpenAPI document.
pub fn create_openapi_router() -> Router {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
