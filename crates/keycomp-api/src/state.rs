//! Application state.

use std::sync::Arc;

use keycomp_media::{FfmpegRunner, MediaTools};

use crate::acquisition::{build_acquirer, SourceAcquirer};
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::scheduler::SingleFlight;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub gate: Arc<SingleFlight>,
    pub tools: MediaTools,
    pub runner: FfmpegRunner,
    pub acquirer: Arc<dyn SourceAcquirer>,
}

impl AppState {
    /// Create new application state.
    ///
    /// Fails when the overlay asset is missing or FFmpeg cannot be found.
    pub async fn new(config: ApiConfig) -> ApiResult<Self> {
        if !config.overlay_path.is_file() {
            return Err(ApiError::internal(format!(
                "Overlay asset not found at {}",
                config.overlay_path.display()
            )));
        }

        for dir in [&config.upload_dir, &config.output_dir, &config.download_dir] {
            tokio::fs::create_dir_all(dir).await.map_err(|e| {
                ApiError::internal(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }

        let tools = MediaTools::resolve(config.ffmpeg_path.as_deref(), config.ffprobe_path.as_deref())?;
        let acquirer = build_acquirer(&config)?;

        Ok(Self::from_parts(config, tools, acquirer))
    }

    /// Assemble state from already-built parts.
    pub fn from_parts(
        config: ApiConfig,
        tools: MediaTools,
        acquirer: Arc<dyn SourceAcquirer>,
    ) -> Self {
        let runner = match config.encode_timeout_secs {
            Some(secs) => FfmpegRunner::new().with_timeout(secs),
            None => FfmpegRunner::new(),
        };

        Self {
            config,
            gate: Arc::new(SingleFlight::new()),
            tools,
            runner,
            acquirer,
        }
    }
}
