//! Health check handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    /// A composition is currently running
    pub busy: bool,
    pub checks: ReadinessChecks,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub ffmpeg: CheckStatus,
    pub ffprobe: CheckStatus,
    pub overlay: CheckStatus,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
        }
    }

    fn from_bool(ok: bool, msg: impl FnOnce() -> String) -> Self {
        if ok {
            Self::ok()
        } else {
            Self::error(msg())
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
/// Checks that the FFmpeg tools resolve and the overlay asset is present.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let ffmpeg = CheckStatus::from_bool(which::which(&state.tools.ffmpeg).is_ok(), || {
        format!("{} not executable", state.tools.ffmpeg.display())
    });
    let ffprobe = CheckStatus::from_bool(which::which(&state.tools.ffprobe).is_ok(), || {
        format!("{} not executable", state.tools.ffprobe.display())
    });
    let overlay = CheckStatus::from_bool(state.config.overlay_path.is_file(), || {
        format!("{} missing", state.config.overlay_path.display())
    });

    let all_ok = ffmpeg.is_ok() && ffprobe.is_ok() && overlay.is_ok();

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "degraded" }.to_string(),
        busy: state.gate.is_busy(),
        checks: ReadinessChecks {
            ffmpeg,
            ffprobe,
            overlay,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}
