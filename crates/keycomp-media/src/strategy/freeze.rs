//! Freeze strategy: hold the frame at `delay_start` for the rest of the output.
//!
//! Audio is cut at `delay_start` and is not extended, so the audio track ends
//! before the video does.

use tracing::debug;

use crate::graph::{AudioMap, Filter, FilterChain, StreamLabel, LABEL_AUDIO_OUT, LABEL_BACKGROUND};
use crate::timeline::TimelinePlan;

use super::StrategyOutput;

/// Extra frozen tail in source-length mode so the final trim always has video.
pub const FREEZE_TAIL_BUFFER_SECS: f64 = 5.0;

/// Seconds of frozen frame to append after `delay_start`.
pub fn stop_duration(plan: &TimelinePlan) -> f64 {
    if plan.target_explicit {
        plan.target_duration - plan.delay_start
    } else {
        plan.effective_duration - plan.delay_start + FREEZE_TAIL_BUFFER_SECS
    }
}

/// Compile the freeze strategy.
pub fn compile(plan: &TimelinePlan) -> StrategyOutput {
    let stop = stop_duration(plan);
    if stop <= 0.0 {
        debug!(stop_duration = stop, "Nothing to freeze, passing background through");
        return StrategyOutput::pass_through(plan.target_duration);
    }

    let video = FilterChain::new()
        .input(StreamLabel::video(0))
        .filter(Filter::trim_duration(plan.delay_start))
        .filter(Filter::TpadClone {
            stop_duration: stop,
        })
        .output(StreamLabel::named(LABEL_BACKGROUND));

    let audio = FilterChain::new()
        .input(StreamLabel::audio(0))
        .filter(Filter::atrim_duration(plan.delay_start))
        .output(StreamLabel::named(LABEL_AUDIO_OUT));

    StrategyOutput {
        video: Some(video),
        audio: vec![audio],
        audio_output: AudioMap::Filtered(StreamLabel::named(LABEL_AUDIO_OUT)),
        duration: plan.target_duration,
        loops: Vec::new(),
        truncated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::Strategy;

    fn plan(effective: f64, target: Option<f64>, delay: f64) -> TimelinePlan {
        TimelinePlan {
            effective_duration: effective,
            target_duration: target.unwrap_or(effective),
            target_explicit: target.is_some(),
            delay_start: delay,
            frame_rate: 30.0,
            strategy: Strategy::Freeze,
        }
    }

    #[test]
    fn test_source_length_mode_adds_buffer() {
        let plan = plan(27.0, None, 4.0);
        assert_eq!(stop_duration(&plan), 28.0);

        let out = compile(&plan);
        assert_eq!(
            out.video.unwrap().to_string(),
            "[0:v]trim=duration=4,tpad=stop_mode=clone:stop_duration=28[bg_processed]"
        );
        assert_eq!(out.audio.len(), 1);
        assert_eq!(out.audio[0].to_string(), "[0:a]atrim=duration=4[outa]");
        assert_eq!(out.audio_output.map_arg(), "[outa]");
        assert_eq!(out.duration, 27.0);
    }

    #[test]
    fn test_target_mode_freezes_until_target() {
        let plan = plan(27.0, Some(1980.0), 4.0);
        assert_eq!(stop_duration(&plan), 1976.0);
        assert_eq!(compile(&plan).duration, 1980.0);
    }

    #[test]
    fn test_non_positive_stop_passes_through() {
        let plan = plan(27.0, Some(3.0), 4.0);
        let out = compile(&plan);
        assert!(out.video.is_none());
        assert!(out.audio.is_empty());
        assert_eq!(out.audio_output, AudioMap::Source);
        assert_eq!(out.duration, 3.0);
    }
}
