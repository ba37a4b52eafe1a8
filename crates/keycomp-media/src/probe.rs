//! FFprobe media inspection.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use keycomp_models::MediaProbe;

use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a media file for its duration and frame rate.
pub async fn probe_media(ffprobe: impl AsRef<Path>, path: impl AsRef<Path>) -> MediaResult<MediaProbe> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(MediaError::probe_failed(
            format!("file not found: {}", path.display()),
            None,
        ));
    }

    let output = Command::new(ffprobe.as_ref())
        .args([
            "-v",
            "error",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            "-select_streams",
            "v:0",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MediaError::FfprobeNotFound,
            _ => MediaError::Io(e),
        })?;

    if !output.status.success() {
        return Err(MediaError::probe_failed(
            "FFprobe exited with non-zero status",
            Some(String::from_utf8_lossy(&output.stderr).to_string()),
        ));
    }

    let probe = parse_probe_output(&output.stdout)?;
    debug!(path = %path.display(), duration = probe.duration, fps = probe.fps, "Probed media");
    Ok(probe)
}

/// Extract duration and frame rate from FFprobe's JSON output.
pub fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaProbe> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)
        .map_err(|e| MediaError::probe_failed(format!("malformed ffprobe output: {e}"), None))?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref().unwrap_or("video") == "video")
        .ok_or_else(|| MediaError::probe_failed("no video stream found", None))?;

    let duration_str = probe
        .format
        .and_then(|f| f.duration)
        .or_else(|| video_stream.duration.clone())
        .ok_or_else(|| MediaError::probe_failed("no duration field", None))?;
    let duration: f64 = duration_str
        .trim()
        .parse()
        .map_err(|_| MediaError::probe_failed(format!("invalid duration '{duration_str}'"), None))?;
    if !duration.is_finite() || duration <= 0.0 {
        return Err(MediaError::probe_failed(
            format!("non-positive duration '{duration_str}'"),
            None,
        ));
    }

    // ffprobe reports "0/0" for rates it could not determine
    let fps = [&video_stream.r_frame_rate, &video_stream.avg_frame_rate]
        .into_iter()
        .flatten()
        .find_map(|rate| parse_frame_rate(rate))
        .ok_or_else(|| {
            MediaError::probe_failed(
                format!(
                    "invalid frame rate (r_frame_rate={:?}, avg_frame_rate={:?})",
                    video_stream.r_frame_rate, video_stream.avg_frame_rate
                ),
                None,
            )
        })?;

    MediaProbe::new(duration, fps)
        .ok_or_else(|| MediaError::probe_failed("probe values out of range", None))
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
///
/// Returns `None` unless the result is finite and positive.
pub fn parse_frame_rate(s: &str) -> Option<f64> {
    let s = s.trim();
    let fps = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.trim().parse().ok()?;
            let den: f64 = den.trim().parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_frame_rate_rejects_bad_values() {
        assert!(parse_frame_rate("30/0").is_none());
        assert!(parse_frame_rate("0/0").is_none());
        assert!(parse_frame_rate("-30/1").is_none());
        assert!(parse_frame_rate("abc").is_none());
        assert!(parse_frame_rate("").is_none());
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{
            "streams": [{"codec_type": "video", "r_frame_rate": "30/1", "avg_frame_rate": "30/1"}],
            "format": {"duration": "30.000000"}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!(probe.duration, 30.0);
        assert_eq!(probe.fps, 30.0);
    }

    #[test]
    fn test_parse_probe_output_prefers_r_frame_rate() {
        let json = br#"{
            "streams": [{"codec_type": "video", "r_frame_rate": "25/1", "avg_frame_rate": "0/0"}],
            "format": {"duration": "12.5"}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!(probe.fps, 25.0);
    }

    #[test]
    fn test_parse_probe_output_falls_back_to_avg_frame_rate() {
        let json = br#"{
            "streams": [{"codec_type": "video", "r_frame_rate": "0/0", "avg_frame_rate": "24000/1001"}],
            "format": {"duration": "8"}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert!((probe.fps - 23.976).abs() < 0.001);
    }

    #[test]
    fn test_parse_probe_output_falls_back_to_stream_duration() {
        let json = br#"{
            "streams": [{"codec_type": "video", "r_frame_rate": "30/1", "duration": "42.5"}],
            "format": {}
        }"#;
        let probe = parse_probe_output(json).unwrap();
        assert_eq!(probe.duration, 42.5);
    }

    #[test]
    fn test_parse_probe_output_missing_duration() {
        let json = br#"{"streams": [{"codec_type": "video", "r_frame_rate": "30/1"}], "format": {}}"#;
        let err = parse_probe_output(json).unwrap_err();
        assert!(matches!(err, MediaError::Probe { .. }));
    }

    #[test]
    fn test_parse_probe_output_bad_rate() {
        let json = br#"{"streams": [{"codec_type": "video", "r_frame_rate": "30/0"}], "format": {"duration": "10"}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::Probe { .. })
        ));
    }

    #[test]
    fn test_parse_probe_output_no_video_stream() {
        let json = br#"{"streams": [{"codec_type": "audio"}], "format": {"duration": "10"}}"#;
        assert!(matches!(
            parse_probe_output(json),
            Err(MediaError::Probe { .. })
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_file() {
        let err = probe_media("ffprobe", "/nonexistent/background.mp4")
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Probe { .. }));
    }
}
