//! File handlers for the HTTP API.

use axum::{
    body::Body,
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;
use tokio_util::io::ReaderStream;

use crate::file::FileService;
use crate::web::dto::{ApiResponse, FileResponse, MessageResponse, UploadResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Generate a safe Content-Disposition header value for file downloads.
///
/// Control characters are dropped, and the quoted fallback is kept to plain
/// ASCII. Names that need it also get an RFC 5987 `filename*` parameter.
fn content_disposition_header(filename: &str) -> String {
    let needs_encoding = filename
        .chars()
        .any(|c| !c.is_ascii() || c.is_control() || c == '"' || c == '\\');

    if !needs_encoding {
        return format!("attachment; filename=\"{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            c if !c.is_ascii() => '_',
            _ => c,
        })
        .collect();

    let cleaned: String = filename.chars().filter(|c| !c.is_control()).collect();
    let encoded = urlencoding::encode(&cleaned);

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// GET / - List all files, newest first.
#[utoipa::path(
    get,
    path = "/",
    tag = "files",
    responses(
        (status = 200, description = "List of stored files", body = Vec<FileResponse>),
        (status = 500, description = "Metadata store unavailable")
    )
)]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<FileResponse>>>, ApiError> {
    let files = state.file_service().list().await?;

    Ok(Json(ApiResponse::new(
        files.into_iter().map(FileResponse::from).collect(),
    )))
}

/// POST /upload - Upload a file from the multipart field `file`.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    responses(
        (status = 200, description = "File uploaded", body = UploadResponse),
        (status = 400, description = "No file provided"),
        (status = 413, description = "File too large"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>, ApiError> {
    let service = state.file_service();

    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!(error = %e, "Failed to read multipart field");
        multipart_error(e.status())
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        FileService::check_original_name(&original_name)?;

        // Chunks go straight to disk; the upload is never held in memory
        let mut staged = service.stage().await?;
        while let Some(chunk) = field.chunk().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to read file content");
            multipart_error(e.status())
        })? {
            staged.append(&chunk).await?;
        }

        let record = service.upload_staged(&original_name, staged).await?;

        return Ok(Json(ApiResponse::new(UploadResponse {
            id: record.id,
            message: "File uploaded successfully".to_string(),
        })));
    }

    Err(ApiError::bad_request("No file provided"))
}

fn multipart_error(status: StatusCode) -> ApiError {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large("File too large")
    } else {
        ApiError::bad_request("Invalid multipart data")
    }
}

/// GET /download/:id - Download a file.
#[utoipa::path(
    get,
    path = "/download/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 404, description = "File not found")
    )
)]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Response<Body>, ApiError> {
    let download = state.file_service().download(file_id).await?;

    let content_type = mime_guess::from_path(&download.record.original_name)
        .first_or_octet_stream()
        .to_string();

    let response = Response::builder()
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&download.record.original_name),
        )
        .header(header::CONTENT_LENGTH, download.size)
        .body(Body::from_stream(ReaderStream::new(download.file)))
        .map_err(|e| {
            tracing::error!(file_id, error = %e, "Failed to build response");
            ApiError::internal("Failed to build response")
        })?;

    Ok(response)
}

/// DELETE /delete/:id - Delete a file.
#[utoipa::path(
    delete,
    path = "/delete/{id}",
    tag = "files",
    params(
        ("id" = i64, Path, description = "File ID")
    ),
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 404, description = "File not found"),
        (status = 500, description = "Blob could not be removed")
    )
)]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.file_service().delete(file_id).await?;

    Ok(Json(ApiResponse::new(MessageResponse::new("File deleted"))))
}
