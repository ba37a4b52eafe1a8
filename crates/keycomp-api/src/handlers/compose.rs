//! Composition endpoint.

use std::path::{Path, PathBuf};

use axum::body::Bytes;
use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use futures_util::{Stream, StreamExt};
use scopeguard::ScopeGuard;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use keycomp_media::{compose_video, ComposeJob, Strategy};
use keycomp_models::{OutputId, TimelineParameters};

use crate::acquisition::acquire_timed;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::scheduler::FlightPermit;
use crate::security::{sanitize_filename, validate_source_url};
use crate::state::AppState;

/// Fallback name for uploads whose filename sanitizes to nothing.
const DEFAULT_UPLOAD_NAME: &str = "upload.mp4";

/// Where the background comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Url,
    Upload,
}

/// Parsed multipart form.
#[derive(Debug, Default)]
pub struct ComposeForm {
    pub kind: Option<SourceKind>,
    pub url: Option<String>,
    pub upload: Option<PathBuf>,
    pub params: TimelineParameters,
}

/// Successful composition response.
#[derive(Debug, Serialize)]
pub struct ComposeResponse {
    pub filename: String,
    pub strategy: &'static str,
    /// Output length in seconds
    pub duration: f64,
    pub pause_points: usize,
    pub truncated: bool,
}

/// Inputs spooled for one request, removed on drop unless kept.
struct SpooledInputs {
    paths: Vec<PathBuf>,
    keep: bool,
}

impl SpooledInputs {
    fn new(keep: bool) -> Self {
        Self {
            paths: Vec::new(),
            keep,
        }
    }

    fn track(&mut self, path: PathBuf) -> PathBuf {
        self.paths.push(path.clone());
        path
    }
}

impl Drop for SpooledInputs {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        for path in &self.paths {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove spooled input");
                }
            }
        }
    }
}

/// POST /api/compose
///
/// Composes the overlay onto a background from a URL or an upload. Only one
/// composition runs at a time; concurrent callers get 429.
///
/// Once the form is read, the run moves to its own task holding the gate, so
/// a caller that disconnects does not cancel the encode.
pub async fn compose(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ComposeResponse>> {
    let Some(permit) = state.gate.try_acquire() else {
        metrics::record_busy_rejection();
        warn!("Rejecting compose request, another composition is running");
        return Err(ApiError::Busy);
    };

    metrics::set_compose_in_flight(true);
    let in_flight = scopeguard::guard((), |_| metrics::set_compose_in_flight(false));

    let mut spooled = SpooledInputs::new(state.config.keep_inputs);
    let form = read_form(multipart, &state.config.upload_dir, &mut spooled).await?;
    form.params
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let handle = tokio::spawn(async move {
        // Inputs are removed before the gate opens again
        let permit = permit;
        let _in_flight = in_flight;
        let mut spooled = spooled;
        let result = run_composition(&state, form, &mut spooled, &permit).await;
        result
    });

    match handle.await {
        Ok(result) => result.map(Json),
        Err(e) => {
            error!(error = %e, "Composition task failed");
            Err(ApiError::internal("Composition task failed"))
        }
    }
}

/// Acquire the background and run the composition to completion.
async fn run_composition(
    state: &AppState,
    form: ComposeForm,
    spooled: &mut SpooledInputs,
    permit: &FlightPermit,
) -> ApiResult<ComposeResponse> {
    let background = match form.kind {
        Some(SourceKind::Url) => {
            let url = form
                .url
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| ApiError::bad_request("No URL provided"))?;
            let url = validate_source_url(&url)
                .into_result()
                .map_err(ApiError::BadRequest)?;
            let path = acquire_timed(state.acquirer.as_ref(), &url).await?;
            spooled.track(path)
        }
        Some(SourceKind::Upload) => form
            .upload
            .ok_or_else(|| ApiError::bad_request("No file part"))?,
        None => return Err(ApiError::bad_request("Invalid input type")),
    };

    let strategy_name = Strategy::select(&form.params).name();
    let output_id = OutputId::new();
    let filename = output_id.file_name();
    let output = state.config.output_dir.join(&filename);

    let job = ComposeJob::new(&background, &state.config.overlay_path, &output, form.params);
    let outcome = match compose_video(&job, &state.tools, &state.runner).await {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics::record_composition(strategy_name, "error");
            let _ = tokio::fs::remove_file(&output).await;
            return Err(e.into());
        }
    };

    if !output.is_file() {
        metrics::record_composition(strategy_name, "error");
        return Err(ApiError::internal("Generation failed, output not found"));
    }

    metrics::record_encode_duration(outcome.strategy.name(), outcome.elapsed_secs);
    metrics::record_composition(outcome.strategy.name(), "success");
    info!(
        output_id = %output_id,
        strategy = outcome.strategy.name(),
        duration = outcome.duration,
        held_secs = permit.held_secs(),
        "Composition complete"
    );

    Ok(ComposeResponse {
        filename,
        strategy: outcome.strategy.name(),
        duration: outcome.duration,
        pause_points: outcome.pause_points,
        truncated: outcome.truncated,
    })
}

/// Read every form field, spooling an uploaded file to `upload_dir`.
async fn read_form(
    mut multipart: Multipart,
    upload_dir: &Path,
    spooled: &mut SpooledInputs,
) -> ApiResult<ComposeForm> {
    let mut form = ComposeForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let path = spool_upload(field, upload_dir).await?;
                form.upload = Some(spooled.track(path));
            }
            "type" => {
                form.kind = match text(field).await?.trim() {
                    "url" => Some(SourceKind::Url),
                    "upload" => Some(SourceKind::Upload),
                    _ => None,
                };
            }
            "url" => form.url = Some(text(field).await?),
            _ => {
                let value = text(field).await?;
                apply_param(&mut form.params, &name, &value)?;
            }
        }
    }

    Ok(form)
}

async fn text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form field: {}", e)))
}

async fn spool_upload(field: Field<'_>, upload_dir: &Path) -> ApiResult<PathBuf> {
    let original = field.file_name().unwrap_or_default().to_string();
    if original.is_empty() {
        return Err(ApiError::bad_request("No selected file"));
    }

    let safe = sanitize_filename(&original).unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string());
    let path = upload_dir.join(format!("{}_{}", Uuid::new_v4(), safe));

    let written = write_upload(field, &path).await?;
    info!(
        path = %path.display(),
        size_mb = written as f64 / (1024.0 * 1024.0),
        "Spooled upload"
    );
    Ok(path)
}

/// Stream upload chunks into `path`. The file is removed unless every chunk
/// was written and flushed.
async fn write_upload<S, E>(chunks: S, path: &Path) -> ApiResult<u64>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let mut chunks = std::pin::pin!(chunks);
    let partial = scopeguard::guard(path.to_path_buf(), |path| {
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove partial upload");
            }
        }
    });

    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload file: {}", e)))?;

    let mut written = 0u64;
    while let Some(chunk) = chunks.next().await {
        let chunk =
            chunk.map_err(|e| ApiError::bad_request(format!("Upload interrupted: {}", e)))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::internal(format!("Failed to write upload: {}", e)))?;

    ScopeGuard::into_inner(partial);
    Ok(written)
}

/// Apply one timeline form field. Unknown fields and empty values are ignored.
pub fn apply_param(params: &mut TimelineParameters, name: &str, value: &str) -> ApiResult<()> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }

    match name {
        "delay_start" => params.delay_start = parse_number(name, value)?,
        "start_cut" => params.start_cut = parse_number(name, value)?,
        "pause_interval" => params.pause_interval = parse_number(name, value)?,
        "play_interval" => params.play_interval = parse_number(name, value)?,
        "output_duration_minutes" => params.output_duration_minutes = parse_number(name, value)?,
        "freeze_background" => params.freeze_background = parse_flag(name, value)?,
        "intermittent_pause" => params.intermittent_pause = parse_flag(name, value)?,
        _ => {}
    }
    Ok(())
}

fn parse_number(name: &str, value: &str) -> ApiResult<f64> {
    value
        .parse::<f64>()
        .map_err(|_| ApiError::bad_request(format!("{} must be a number", name)))
}

fn parse_flag(name: &str, value: &str) -> ApiResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(ApiError::bad_request(format!("{} must be a boolean", name))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_params() {
        let mut params = TimelineParameters::default();
        apply_param(&mut params, "delay_start", "4").unwrap();
        apply_param(&mut params, "start_cut", " 3.5 ").unwrap();
        apply_param(&mut params, "freeze_background", "on").unwrap();
        apply_param(&mut params, "output_duration_minutes", "").unwrap();
        apply_param(&mut params, "unrelated", "whatever").unwrap();

        assert_eq!(params.delay_start, 4.0);
        assert_eq!(params.start_cut, 3.5);
        assert!(params.freeze_background);
        assert_eq!(params.output_duration_minutes, 0.0);
    }

    #[test]
    fn test_apply_params_rejects_garbage() {
        let mut params = TimelineParameters::default();
        assert!(matches!(
            apply_param(&mut params, "pause_interval", "two"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            apply_param(&mut params, "intermittent_pause", "maybe"),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_spooled_inputs_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.mp4");
        std::fs::write(&path, b"data").unwrap();

        {
            let mut spooled = SpooledInputs::new(false);
            spooled.track(path.clone());
        }
        assert!(!path.exists());

        std::fs::write(&path, b"data").unwrap();
        {
            let mut spooled = SpooledInputs::new(true);
            spooled.track(path.clone());
        }
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_write_upload_keeps_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.mp4");
        let chunks = futures_util::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"fake ")),
            Ok(Bytes::from_static(b"video")),
        ]);

        let written = write_upload(chunks, &path).await.unwrap();
        assert_eq!(written, 10);
        assert_eq!(std::fs::read(&path).unwrap(), b"fake video");
    }

    #[tokio::test]
    async fn test_write_upload_removes_partial_file_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.mp4");
        let chunks = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b"first chunk")),
            Err(std::io::Error::other("connection reset")),
        ]);

        let err = write_upload(chunks, &path).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_write_upload_create_failure_is_internal() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("missing").join("upload.mp4");
        let chunks =
            futures_util::stream::iter(vec![Ok::<_, std::io::Error>(Bytes::from_static(b"x"))]);

        let err = write_upload(chunks, &target).await.unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert!(!target.exists());
    }
}
