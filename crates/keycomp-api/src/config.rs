//! API configuration.

use std::path::PathBuf;
use std::str::FromStr;

/// How remote sources are fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionStrategy {
    /// Plain HTTP download of the URL
    Direct,
    /// `yt-dlp` only
    YtDlp,
    /// `yt-dlp` first, then a direct download
    Auto,
}

impl FromStr for AcquisitionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "ytdlp" | "yt-dlp" => Ok(Self::YtDlp),
            "auto" => Ok(Self::Auto),
            other => Err(format!("unknown acquisition strategy '{}'", other)),
        }
    }
}

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Spool directory for uploaded backgrounds
    pub upload_dir: PathBuf,
    /// Directory composed videos are written to
    pub output_dir: PathBuf,
    /// Spool directory for downloaded backgrounds
    pub download_dir: PathBuf,
    /// Green-screen overlay clip
    pub overlay_path: PathBuf,
    pub ffmpeg_path: Option<String>,
    pub ffprobe_path: Option<String>,
    /// Kill FFmpeg after this many seconds; unset means no limit
    pub encode_timeout_secs: Option<u64>,
    pub acquisition: AcquisitionStrategy,
    /// Keep spooled inputs after a run
    pub keep_inputs: bool,
    pub metrics_enabled: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors_origins: vec!["*".to_string()],
            max_body_size: 512 * 1024 * 1024, // 512MB
            environment: "development".to_string(),
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            download_dir: PathBuf::from("downloads"),
            overlay_path: PathBuf::from("greenscreen.mp4"),
            ffmpeg_path: None,
            ffprobe_path: None,
            encode_timeout_secs: None,
            acquisition: AcquisitionStrategy::Auto,
            keep_inputs: false,
            metrics_enabled: true,
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: env_parse("API_PORT").unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            max_body_size: env_parse("MAX_BODY_SIZE").unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            upload_dir: env_path("UPLOAD_DIR").unwrap_or(defaults.upload_dir),
            output_dir: env_path("OUTPUT_DIR").unwrap_or(defaults.output_dir),
            download_dir: env_path("DOWNLOAD_DIR").unwrap_or(defaults.download_dir),
            overlay_path: env_path("OVERLAY_PATH").unwrap_or(defaults.overlay_path),
            ffmpeg_path: std::env::var("FFMPEG_PATH").ok().filter(|s| !s.is_empty()),
            ffprobe_path: std::env::var("FFPROBE_PATH").ok().filter(|s| !s.is_empty()),
            encode_timeout_secs: env_parse("ENCODE_TIMEOUT_SECS").filter(|secs| *secs > 0),
            acquisition: env_parse("ACQUISITION_STRATEGY").unwrap_or(defaults.acquisition),
            keep_inputs: env_bool("KEEP_INPUTS").unwrap_or(defaults.keep_inputs),
            metrics_enabled: env_bool("METRICS_ENABLED").unwrap_or(defaults.metrics_enabled),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|v| parse_bool(&v))
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.overlay_path, PathBuf::from("greenscreen.mp4"));
        assert_eq!(config.acquisition, AcquisitionStrategy::Auto);
        assert!(config.encode_timeout_secs.is_none());
        assert!(!config.keep_inputs);
        assert!(!config.is_production());
    }

    #[test]
    fn test_acquisition_strategy_parse() {
        assert_eq!("direct".parse(), Ok(AcquisitionStrategy::Direct));
        assert_eq!("YTDLP".parse(), Ok(AcquisitionStrategy::YtDlp));
        assert_eq!("yt-dlp".parse(), Ok(AcquisitionStrategy::YtDlp));
        assert_eq!(" auto ".parse(), Ok(AcquisitionStrategy::Auto));
        assert!("pytube".parse::<AcquisitionStrategy>().is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("Yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }
}
