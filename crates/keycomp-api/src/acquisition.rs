//! Source acquisition: turn a URL into a local background file.
//!
//! The compose handler only depends on [`SourceAcquirer`]; which concrete
//! strategy runs is chosen by the deployer through `ACQUISITION_STRATEGY`.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::config::{AcquisitionStrategy, ApiConfig};
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::sanitize_filename;

/// Filename used when the URL path has none.
pub const DEFAULT_DOWNLOAD_NAME: &str = "downloaded_video.mp4";

/// Fetches a remote video into local storage.
#[async_trait]
pub trait SourceAcquirer: Send + Sync {
    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Download `url` and return the local path.
    async fn acquire(&self, url: &str) -> ApiResult<PathBuf>;
}

/// Build the acquirer selected by the configuration.
pub fn build_acquirer(config: &ApiConfig) -> ApiResult<Arc<dyn SourceAcquirer>> {
    let direct = DirectDownloader::new(&config.download_dir)?;

    let acquirer: Arc<dyn SourceAcquirer> = match config.acquisition {
        AcquisitionStrategy::Direct => Arc::new(direct),
        AcquisitionStrategy::YtDlp => Arc::new(YtDlpDownloader::new(&config.download_dir)),
        AcquisitionStrategy::Auto => {
            if which::which("yt-dlp").is_ok() {
                Arc::new(FallbackAcquirer::new(
                    YtDlpDownloader::new(&config.download_dir),
                    direct,
                ))
            } else {
                warn!("yt-dlp not found, using direct downloads only");
                Arc::new(direct)
            }
        }
    };

    info!(acquirer = acquirer.name(), "Source acquisition configured");
    Ok(acquirer)
}

/// Plain HTTP(S) download, streamed to disk.
#[derive(Debug, Clone)]
pub struct DirectDownloader {
    client: reqwest::Client,
    download_dir: PathBuf,
}

impl DirectDownloader {
    pub fn new(download_dir: impl Into<PathBuf>) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ApiError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            download_dir: download_dir.into(),
        })
    }

    /// Local name for a download: `{uuid}_{basename}`.
    fn target_name(url: &str) -> String {
        let basename = Url::parse(url)
            .ok()
            .and_then(|u| {
                u.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .and_then(|name| sanitize_filename(&name))
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_NAME.to_string());

        format!("{}_{}", Uuid::new_v4(), basename)
    }

    async fn stream_to(&self, url: &str, path: &Path) -> ApiResult<u64> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ApiError::acquisition(format!("request failed: {}", e)))?;

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create download file: {}", e)))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::acquisition(format!("download interrupted: {}", e)))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal(format!("Failed to write download: {}", e)))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to write download: {}", e)))?;

        Ok(written)
    }
}

#[async_trait]
impl SourceAcquirer for DirectDownloader {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn acquire(&self, url: &str) -> ApiResult<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create download dir: {}", e)))?;

        let path = self.download_dir.join(Self::target_name(url));
        debug!(url = %url, path = %path.display(), "Starting direct download");

        match self.stream_to(url, &path).await {
            Ok(bytes) => {
                info!(
                    path = %path.display(),
                    size_mb = bytes as f64 / (1024.0 * 1024.0),
                    "Downloaded source video"
                );
                Ok(path)
            }
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                Err(e)
            }
        }
    }
}

/// Download through the `yt-dlp` CLI.
#[derive(Debug, Clone)]
pub struct YtDlpDownloader {
    program: PathBuf,
    download_dir: PathBuf,
}

impl YtDlpDownloader {
    pub fn new(download_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("yt-dlp"),
            download_dir: download_dir.into(),
        }
    }

    /// Use a specific `yt-dlp` binary.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }
}

#[async_trait]
impl SourceAcquirer for YtDlpDownloader {
    fn name(&self) -> &'static str {
        "ytdlp"
    }

    async fn acquire(&self, url: &str) -> ApiResult<PathBuf> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create download dir: {}", e)))?;

        let path = self.download_dir.join(format!("{}.mp4", Uuid::new_v4()));
        debug!(url = %url, path = %path.display(), "Starting yt-dlp download");

        let output = Command::new(&self.program)
            .args(["--no-playlist", "-f", "best[ext=mp4]/mp4/best", "-o"])
            .arg(&path)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ApiError::acquisition(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(stderr = %stderr, "yt-dlp stderr");
            let _ = tokio::fs::remove_file(&path).await;
            return Err(ApiError::acquisition(format!(
                "yt-dlp failed: {}",
                stderr.lines().last().unwrap_or("Unknown error")
            )));
        }

        if !path.is_file() {
            return Err(ApiError::acquisition("yt-dlp did not produce an output file"));
        }

        info!(path = %path.display(), "Downloaded source video with yt-dlp");
        Ok(path)
    }
}

/// Try `primary`, then `secondary` on any failure.
pub struct FallbackAcquirer {
    primary: Box<dyn SourceAcquirer>,
    secondary: Box<dyn SourceAcquirer>,
}

impl FallbackAcquirer {
    pub fn new(primary: impl SourceAcquirer + 'static, secondary: impl SourceAcquirer + 'static) -> Self {
        Self {
            primary: Box::new(primary),
            secondary: Box::new(secondary),
        }
    }
}

#[async_trait]
impl SourceAcquirer for FallbackAcquirer {
    fn name(&self) -> &'static str {
        "auto"
    }

    async fn acquire(&self, url: &str) -> ApiResult<PathBuf> {
        match self.primary.acquire(url).await {
            Ok(path) => Ok(path),
            Err(e) => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %e,
                    "Primary acquisition failed, falling back"
                );
                self.secondary.acquire(url).await
            }
        }
    }
}

/// Acquire with timing recorded to metrics.
pub async fn acquire_timed(acquirer: &dyn SourceAcquirer, url: &str) -> ApiResult<PathBuf> {
    let start = Instant::now();
    let result = acquirer.acquire(url).await;
    metrics::record_acquisition(
        acquirer.name(),
        result.is_ok(),
        start.elapsed().as_secs_f64(),
    );
    result
}
