//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use keycomp_media::MediaError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Server is busy processing another video. Please try again later.")]
    Busy,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to acquire source video: {0}")]
    Acquisition(String),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Busy => StatusCode::TOO_MANY_REQUESTS,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Media(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Acquisition(_) | ApiError::Media(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Busy => "busy",
            ApiError::BadRequest(_) => "bad_request",
            ApiError::NotFound(_) => "not_found",
            ApiError::Acquisition(_) => "acquisition_failed",
            ApiError::Media(e) => match e {
                MediaError::InvalidTrim { .. } => "invalid_trim",
                MediaError::InvalidParameters(_) => "invalid_parameters",
                MediaError::Probe { .. } => "probe_failed",
                MediaError::Encode { .. } | MediaError::Timeout(_) => "encode_failed",
                _ => "media_error",
            },
            ApiError::Internal(_) => "internal",
        }
    }

    fn is_internal(&self) -> bool {
        self.status_code() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if self.is_internal() {
            match &self {
                ApiError::Media(MediaError::Encode { stderr, exit_code, .. }) => {
                    error!(error = %self, exit_code = ?exit_code, stderr = ?stderr, "Request failed");
                }
                _ => error!(error = %self, "Request failed"),
            }
        }

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Busy.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            ApiError::bad_request("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::not_found("x").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::acquisition("x").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_media_error_mapping() {
        let trim: ApiError = MediaError::InvalidTrim {
            start_cut: 30.0,
            duration: 30.0,
        }
        .into();
        assert_eq!(trim.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(trim.code(), "invalid_trim");

        let encode: ApiError = MediaError::encode_failed("boom", None, Some(1)).into();
        assert_eq!(encode.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(encode.code(), "encode_failed");

        let probe: ApiError = MediaError::probe_failed("bad", None).into();
        assert_eq!(probe.code(), "probe_failed");
    }

    #[tokio::test]
    async fn test_busy_response_body() {
        let response = ApiError::Busy.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], "busy");
        assert!(json["detail"].as_str().unwrap().contains("busy"));
    }
}
