//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::error::{MediaError, MediaResult};
use crate::graph::fmt_num;
use crate::progress::{is_progress_line, parse_progress_line, EncodeProgress};

/// Number of non-progress stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Locations of the FFmpeg and FFprobe executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

impl MediaTools {
    /// Resolve both executables.
    ///
    /// Explicit paths win. Without an explicit FFprobe, a binary sitting next to
    /// an absolute FFmpeg path is preferred over the one on `PATH`.
    pub fn resolve(ffmpeg: Option<&str>, ffprobe: Option<&str>) -> MediaResult<Self> {
        let ffmpeg = match ffmpeg {
            Some(path) => which::which(path).map_err(|_| MediaError::FfmpegNotFound)?,
            None => check_ffmpeg()?,
        };

        let ffprobe = match ffprobe {
            Some(path) => which::which(path).map_err(|_| MediaError::FfprobeNotFound)?,
            None => match sibling_ffprobe(&ffmpeg) {
                Some(path) => path,
                None => check_ffprobe()?,
            },
        };

        Ok(Self { ffmpeg, ffprobe })
    }
}

fn sibling_ffprobe(ffmpeg: &Path) -> Option<PathBuf> {
    if !ffmpeg.is_absolute() {
        return None;
    }
    let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
    let candidate = ffmpeg.parent()?.join(name);
    candidate.exists().then_some(candidate)
}

/// One `-i` input together with the options that precede it.
#[derive(Debug, Clone)]
pub struct FfmpegInput {
    path: PathBuf,
    args: Vec<String>,
}

impl FfmpegInput {
    /// Create an input with no options.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add an input option.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Seek to a position before decoding.
    pub fn seek(self, seconds: f64) -> Self {
        self.arg("-ss").arg(fmt_num(seconds))
    }

    /// Loop the input forever.
    pub fn loop_forever(self) -> Self {
        self.arg("-stream_loop").arg("-1")
    }

    /// Request hardware-accelerated decoding.
    pub fn hwaccel(self, mode: impl Into<String>) -> Self {
        self.arg("-hwaccel").arg(mode)
    }

    /// Input file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// FFmpeg executable
    program: PathBuf,
    /// Inputs in `-i` order
    inputs: Vec<FfmpegInput>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after all inputs)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(program: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Append an input.
    pub fn input(mut self, input: FfmpegInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add an output argument.
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream into the output.
    pub fn map(self, stream: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(stream)
    }

    /// Limit the output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(fmt_num(seconds))
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// FFmpeg executable.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Output file path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        for input in &self.inputs {
            args.extend(input.args.iter().cloned());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.iter().cloned());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress logging and an optional timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
    /// Planned output length, used to turn progress into a percentage
    expected_secs: Option<f64>,
}

impl FfmpegRunner {
    /// Create a runner without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Set the planned output duration for progress reporting.
    pub fn with_expected_duration(mut self, secs: f64) -> Self {
        self.expected_secs = Some(secs);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let args = cmd.build_args();
        debug!(program = %cmd.program().display(), "Running FFmpeg: {}", args.join(" "));

        let mut child = Command::new(cmd.program())
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => MediaError::FfmpegNotFound,
                _ => MediaError::Io(e),
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::encode_failed("FFmpeg stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();
        let expected_secs = self.expected_secs;

        let stderr_handle = tokio::spawn(async move {
            let mut current = EncodeProgress::default();
            let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current) {
                        let percent = expected_secs.map(|s| progress.percentage(s));
                        debug!(
                            frame = progress.frame,
                            speed = progress.speed,
                            percent = ?percent,
                            "Encode progress"
                        );
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            tail.into_iter().collect::<Vec<_>>().join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let stderr_tail = stderr_handle.await.unwrap_or_default();

        match result {
            Ok(()) => Ok(()),
            Err(MediaError::Encode {
                message, exit_code, ..
            }) => {
                warn!(exit_code = ?exit_code, stderr = %stderr_tail, "FFmpeg failed");
                Err(MediaError::Encode {
                    message,
                    stderr: (!stderr_tail.is_empty()).then_some(stderr_tail),
                    exit_code,
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Wait for child process, honouring the timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = match self.timeout_secs {
            Some(timeout_secs) => {
                match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs);
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(timeout_secs));
                    }
                }
            }
            None => child.wait().await?,
        };

        if status.success() {
            info!("FFmpeg finished");
            Ok(())
        } else {
            Err(MediaError::encode_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// Check if FFmpeg is available on `PATH`.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available on `PATH`.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("ffmpeg", "out.mp4")
            .input(FfmpegInput::new("bg.mp4").hwaccel("auto").seek(3.0))
            .input(FfmpegInput::new("overlay.mp4").loop_forever())
            .map("[out]")
            .duration(30.0);

        let args = cmd.build_args();
        assert_eq!(
            args,
            vec![
                "-y", "-v", "error", "-progress", "pipe:2", "-hwaccel", "auto", "-ss", "3",
                "-i", "bg.mp4", "-stream_loop", "-1", "-i", "overlay.mp4", "-map", "[out]", "-t",
                "30", "out.mp4",
            ]
        );
    }

    #[test]
    fn test_seek_and_duration_keep_full_precision() {
        let args = FfmpegCommand::new("ffmpeg", "out.mp4")
            .input(FfmpegInput::new("bg.mp4").seek(1.23456))
            .duration(28.76544)
            .build_args();
        assert!(args.windows(2).any(|w| w[0] == "-ss" && w[1] == "1.23456"));
        assert!(args.windows(2).any(|w| w[0] == "-t" && w[1] == "28.76544"));
    }

    #[test]
    fn test_output_is_last() {
        let cmd = FfmpegCommand::new("ffmpeg", "out.mp4")
            .input(FfmpegInput::new("in.mp4"))
            .duration(1.5)
            .log_level("warning");
        let args = cmd.build_args();
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
        assert!(args.contains(&"warning".to_string()));
    }

    #[test]
    fn test_sibling_ffprobe_requires_absolute_path() {
        assert!(sibling_ffprobe(Path::new("ffmpeg")).is_none());
    }

    #[test]
    fn test_sibling_ffprobe_found() {
        let dir = tempfile::tempdir().unwrap();
        let name = if cfg!(windows) { "ffprobe.exe" } else { "ffprobe" };
        std::fs::write(dir.path().join(name), b"").unwrap();

        let found = sibling_ffprobe(&dir.path().join("ffmpeg")).unwrap();
        assert_eq!(found, dir.path().join(name));
    }

    #[tokio::test]
    async fn test_missing_program_is_reported() {
        let cmd = FfmpegCommand::new("/nonexistent/keycomp-ffmpeg", "out.mp4")
            .input(FfmpegInput::new("in.mp4"));
        let err = FfmpegRunner::new().run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound));
    }
}
