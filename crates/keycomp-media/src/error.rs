//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

use keycomp_models::ParameterError;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while probing, planning or encoding.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found")]
    FfmpegNotFound,

    #[error("FFprobe not found")]
    FfprobeNotFound,

    #[error("Probe failed: {message}")]
    Probe {
        message: String,
        stderr: Option<String>,
    },

    #[error("Start cut ({start_cut}s) is not shorter than the video duration ({duration}s)")]
    InvalidTrim { start_cut: f64, duration: f64 },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(#[from] ParameterError),

    #[error("Encode failed: {message}")]
    Encode {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a probe failure error.
    pub fn probe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::Probe {
            message: message.into(),
            stderr,
        }
    }

    /// Create an encode failure error.
    pub fn encode_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::Encode {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Whether the failure was caused by the caller's input rather than the engine.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidTrim { .. } | Self::InvalidParameters(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        let trim = MediaError::InvalidTrim {
            start_cut: 30.0,
            duration: 30.0,
        };
        assert!(trim.is_client_error());
        assert!(MediaError::InvalidParameters(ParameterError::NotFinite("start_cut")).is_client_error());
        assert!(!MediaError::encode_failed("boom", None, Some(1)).is_client_error());
        assert!(!MediaError::probe_failed("no duration", None).is_client_error());
    }

    #[test]
    fn test_invalid_trim_message() {
        let err = MediaError::InvalidTrim {
            start_cut: 30.0,
            duration: 30.0,
        };
        assert_eq!(
            err.to_string(),
            "Start cut (30s) is not shorter than the video duration (30s)"
        );
    }
}
