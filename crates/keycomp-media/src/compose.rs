//! Composition pipeline: probe, plan, compile and encode.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use keycomp_models::{EncodingConfig, MediaProbe, TimelineParameters};

use crate::command::{FfmpegCommand, FfmpegInput, FfmpegRunner, MediaTools};
use crate::composite::{assemble, OverlayTemplate};
use crate::error::{MediaError, MediaResult};
use crate::graph::FilterGraphPlan;
use crate::probe::probe_media;
use crate::strategy::{compile_strategy, LoopSegment};
use crate::timeline::{plan_timeline, Strategy, TimelinePlan};

/// Everything decided before FFmpeg is started.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositionPlan {
    pub timeline: TimelinePlan,
    pub graph: FilterGraphPlan,
    pub loops: Vec<LoopSegment>,
    pub truncated: bool,
}

/// Plan a composition without touching the filesystem.
pub fn plan_composition(
    probe: &MediaProbe,
    params: &TimelineParameters,
    template: &OverlayTemplate,
) -> MediaResult<CompositionPlan> {
    let timeline = plan_timeline(probe, params)?;
    let strategy = compile_strategy(&timeline);
    let graph = assemble(&timeline, &strategy, template);

    Ok(CompositionPlan {
        timeline,
        graph,
        loops: strategy.loops,
        truncated: strategy.truncated,
    })
}

/// Build the FFmpeg invocation for a planned composition.
pub fn build_compose_command(
    ffmpeg: impl AsRef<Path>,
    background: impl AsRef<Path>,
    overlay: impl AsRef<Path>,
    output: impl AsRef<Path>,
    start_cut: f64,
    graph: &FilterGraphPlan,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let mut background = FfmpegInput::new(background);
    if let Some(mode) = &encoding.hwaccel {
        background = background.hwaccel(mode.clone());
    }

    FfmpegCommand::new(ffmpeg, output)
        .input(background.seek(start_cut))
        .input(FfmpegInput::new(overlay).loop_forever())
        .filter_complex(graph.filter_complex())
        .map(graph.video_output.to_string())
        .map(graph.audio_output.map_arg())
        .output_args(encoding.to_ffmpeg_args())
        .duration(graph.duration)
}

/// One composition run.
#[derive(Debug, Clone)]
pub struct ComposeJob {
    pub background: PathBuf,
    pub overlay: PathBuf,
    pub output: PathBuf,
    pub params: TimelineParameters,
    pub encoding: EncodingConfig,
    pub template: OverlayTemplate,
}

impl ComposeJob {
    /// Job with default encoding and the standard overlay template.
    pub fn new(
        background: impl Into<PathBuf>,
        overlay: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        params: TimelineParameters,
    ) -> Self {
        Self {
            background: background.into(),
            overlay: overlay.into(),
            output: output.into(),
            params,
            encoding: EncodingConfig::default(),
            template: OverlayTemplate::default(),
        }
    }

    /// Override the encoding settings.
    pub fn with_encoding(mut self, encoding: EncodingConfig) -> Self {
        self.encoding = encoding;
        self
    }
}

/// Result of a finished composition.
#[derive(Debug, Clone)]
pub struct ComposeOutcome {
    pub output: PathBuf,
    pub strategy: Strategy,
    /// Planned output length in seconds
    pub duration: f64,
    pub pause_points: usize,
    pub truncated: bool,
    pub elapsed_secs: f64,
}

/// Run probe, plan, compile and encode for one job.
pub async fn compose_video(
    job: &ComposeJob,
    tools: &MediaTools,
    runner: &FfmpegRunner,
) -> MediaResult<ComposeOutcome> {
    let start = Instant::now();

    if !job.overlay.is_file() {
        return Err(MediaError::FileNotFound(job.overlay.clone()));
    }

    let probe = probe_media(&tools.ffprobe, &job.background).await?;
    info!(
        background = %job.background.display(),
        duration = probe.duration,
        fps = probe.fps,
        "Probed background"
    );

    let plan = plan_composition(&probe, &job.params, &job.template)?;
    if plan.truncated {
        warn!(
            pause_points = plan.loops.len(),
            "Pause schedule truncated, output pauses end early"
        );
    }

    let cmd = build_compose_command(
        &tools.ffmpeg,
        &job.background,
        &job.overlay,
        &job.output,
        job.params.start_cut,
        &plan.graph,
        &job.encoding,
    );

    info!(
        strategy = plan.timeline.strategy.name(),
        duration = plan.graph.duration,
        output = %job.output.display(),
        "Running FFmpeg"
    );
    runner
        .clone()
        .with_expected_duration(plan.graph.duration)
        .run(&cmd)
        .await?;

    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(elapsed_secs, output = %job.output.display(), "Composition finished");

    Ok(ComposeOutcome {
        output: job.output.clone(),
        strategy: plan.timeline.strategy,
        duration: plan.graph.duration,
        pause_points: plan.loops.len(),
        truncated: plan.truncated,
        elapsed_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_layout() {
        let probe = MediaProbe {
            duration: 30.0,
            fps: 30.0,
        };
        let params = TimelineParameters {
            start_cut: 3.0,
            delay_start: 4.0,
            ..Default::default()
        };
        let plan = plan_composition(&probe, &params, &OverlayTemplate::default()).unwrap();
        let cmd = build_compose_command(
            "ffmpeg",
            "bg.mp4",
            "greenscreen.mp4",
            "out.mp4",
            params.start_cut,
            &plan.graph,
            &EncodingConfig::default(),
        );
        let args = cmd.build_args();

        let pos = |needle: &str| args.iter().position(|a| a == needle).unwrap();
        assert_eq!(args[pos("-hwaccel") + 1], "auto");
        assert_eq!(args[pos("-ss") + 1], "3");
        assert!(pos("-ss") < pos("bg.mp4"));
        assert_eq!(args[pos("-stream_loop") + 1], "-1");
        assert!(pos("-stream_loop") < pos("greenscreen.mp4"));
        assert_eq!(args[pos("-preset") + 1], "ultrafast");
        assert_eq!(args[pos("-t") + 1], "27");
        assert!(pos("-t") < pos("out.mp4"));
        assert_eq!(args.last().unwrap(), "out.mp4");

        let maps: Vec<&String> = args
            .iter()
            .enumerate()
            .filter(|(i, _)| *i > 0 && args[i - 1] == "-map")
            .map(|(_, a)| a)
            .collect();
        assert_eq!(maps, vec!["[out]", "0:a?"]);
    }

    #[test]
    fn test_without_hwaccel() {
        let probe = MediaProbe {
            duration: 10.0,
            fps: 24.0,
        };
        let plan =
            plan_composition(&probe, &TimelineParameters::default(), &OverlayTemplate::default())
                .unwrap();
        let cmd = build_compose_command(
            "ffmpeg",
            "bg.mp4",
            "ov.mp4",
            "out.mp4",
            0.0,
            &plan.graph,
            &EncodingConfig::default().without_hwaccel(),
        );
        assert!(!cmd.build_args().contains(&"-hwaccel".to_string()));
    }

    #[tokio::test]
    async fn test_missing_overlay_fails_before_probe() {
        let job = ComposeJob::new(
            "/nonexistent/bg.mp4",
            "/nonexistent/greenscreen.mp4",
            "/tmp/out.mp4",
            TimelineParameters::default(),
        );
        let tools = MediaTools {
            ffmpeg: PathBuf::from("ffmpeg"),
            ffprobe: PathBuf::from("ffprobe"),
        };
        let err = compose_video(&job, &tools, &FfmpegRunner::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
