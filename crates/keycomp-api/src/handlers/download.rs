//! Download of composed videos.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::error::{ApiError, ApiResult};
use crate::security::is_valid_output_name;
use crate::state::AppState;

/// GET /api/download/:filename
///
/// Streams a composed video as an attachment.
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_output_name(&filename) {
        return Err(ApiError::bad_request("Invalid filename"));
    }

    let path = state.config.output_dir.join(&filename);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ApiError::not_found("File not found"));
        }
        Err(e) => return Err(ApiError::internal(format!("Failed to open output: {}", e))),
    };
    let metadata = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to stat output: {}", e)))?;
    if !metadata.is_file() {
        return Err(ApiError::not_found("File not found"));
    }

    debug!(filename = %filename, size = metadata.len(), "Streaming output");

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, metadata.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "private, max-age=3600")
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
