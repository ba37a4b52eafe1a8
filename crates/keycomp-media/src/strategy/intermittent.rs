//! Intermittent pause strategy: alternate paused and playing background.
//!
//! FFmpeg has no pause filter, so each pause is a `loop` stage repeating one
//! frame `pause_interval * fps` times. Every insertion lengthens the stream, so
//! the frame index of each later pause point is shifted by the frames inserted
//! before it. Audio is rebuilt in parallel from silence and trimmed source
//! fragments so it follows the same paused/played timeline.

use tracing::{debug, warn};

use crate::graph::{
    AudioMap, Filter, FilterChain, StreamLabel, LABEL_AUDIO_OUT, LABEL_BACKGROUND,
};
use crate::timeline::TimelinePlan;

use super::StrategyOutput;

/// Upper bound on loop insertions for one plan.
pub const MAX_LOOP_SEGMENTS: usize = 1000;

/// Sample rate of generated silence.
pub const SILENCE_SAMPLE_RATE: u32 = 44_100;

/// One pause point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopSegment {
    /// Source time the pause starts at (seconds, trimmed timeline)
    pub start_time: f64,
    /// Frame index of `start_time` in the unmodified stream
    pub original_frame_index: u64,
    /// Frames inserted by all earlier segments
    pub accumulated_frames_before: u64,
    /// Frames this segment inserts
    pub loop_frame_count: u64,
}

impl LoopSegment {
    /// Frame index of the pause point in the already-lengthened stream.
    pub fn target_frame_index(&self) -> u64 {
        self.original_frame_index + self.accumulated_frames_before
    }

    fn filter(&self) -> Filter {
        Filter::Loop {
            count: self.loop_frame_count,
            size: 1,
            start: self.target_frame_index(),
        }
    }
}

/// Ordered pause points for one plan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoopSchedule {
    pub segments: Vec<LoopSegment>,
    /// The walk stopped at [`MAX_LOOP_SEGMENTS`] before reaching its end
    pub truncated: bool,
}

impl LoopSchedule {
    /// Walk the timeline from `delay_start` in `play_interval` steps.
    ///
    /// Stops at the schedule end, at the end of the source, or at the segment cap.
    pub fn build(plan: &TimelinePlan, pause_interval: f64, play_interval: f64) -> Self {
        let fps = plan.frame_rate;
        let loop_frame_count = (pause_interval * fps).floor() as u64;
        let loop_until = plan.schedule_end();

        let mut segments = Vec::new();
        let mut accumulated_frames = 0u64;
        let mut truncated = false;

        for step in 0usize.. {
            let current_time = plan.delay_start + step as f64 * play_interval;
            if current_time >= loop_until || current_time >= plan.effective_duration {
                break;
            }
            if segments.len() == MAX_LOOP_SEGMENTS {
                warn!(
                    max_segments = MAX_LOOP_SEGMENTS,
                    stopped_at = current_time,
                    "Too many pause intervals, truncating schedule"
                );
                truncated = true;
                break;
            }

            let original_frame_index =
                (plan.delay_start * fps + step as f64 * play_interval * fps).floor() as u64;

            segments.push(LoopSegment {
                start_time: current_time,
                original_frame_index,
                accumulated_frames_before: accumulated_frames,
                loop_frame_count,
            });
            accumulated_frames += loop_frame_count;
        }

        Self {
            segments,
            truncated,
        }
    }

    /// Total frames inserted by the schedule.
    pub fn accumulated_frames(&self) -> u64 {
        self.segments.iter().map(|s| s.loop_frame_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// One piece of the rebuilt audio track.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioFragment {
    /// Source audio before the first pause, `[0, end)`
    Lead { end: f64 },
    /// Silence covering pause `index` (1-based)
    Silence { index: usize, duration: f64 },
    /// Source audio played after pause `index` (1-based), `[start, end)`
    Source { index: usize, start: f64, end: f64 },
}

impl AudioFragment {
    /// Unique pad name of the fragment.
    pub fn label(&self) -> StreamLabel {
        match self {
            Self::Lead { .. } => StreamLabel::named("a_start"),
            Self::Silence { index, .. } => StreamLabel::named(format!("silence_{}", index)),
            Self::Source { index, .. } => StreamLabel::named(format!("a_seg_{}", index)),
        }
    }

    /// Chain producing this fragment.
    pub fn chain(&self) -> FilterChain {
        let chain = match *self {
            Self::Lead { end } => FilterChain::new()
                .input(StreamLabel::audio(0))
                .filter(Filter::atrim_range(0.0, end))
                .filter(Filter::ASetPtsReset),
            Self::Silence { duration, .. } => FilterChain::new().filter(Filter::Silence {
                duration,
                sample_rate: SILENCE_SAMPLE_RATE,
            }),
            Self::Source { start, end, .. } => FilterChain::new()
                .input(StreamLabel::audio(0))
                .filter(Filter::atrim_range(start, end))
                .filter(Filter::ASetPtsReset),
        };
        chain.output(self.label())
    }
}

/// Audio fragments in playback order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioSegmentPlan {
    pub fragments: Vec<AudioFragment>,
}

impl AudioSegmentPlan {
    /// Mirror the loop schedule with silence and source fragments.
    pub fn build(
        plan: &TimelinePlan,
        schedule: &LoopSchedule,
        pause_interval: f64,
        play_interval: f64,
    ) -> Self {
        let mut fragments = Vec::with_capacity(schedule.segments.len() * 2 + 1);

        if plan.delay_start > 0.0 {
            fragments.push(AudioFragment::Lead {
                end: plan.delay_start,
            });
        }

        for (i, segment) in schedule.segments.iter().enumerate() {
            let index = i + 1;
            fragments.push(AudioFragment::Silence {
                index,
                duration: pause_interval,
            });
            if segment.start_time < plan.effective_duration {
                fragments.push(AudioFragment::Source {
                    index,
                    start: segment.start_time,
                    end: segment.start_time + play_interval,
                });
            }
        }

        Self { fragments }
    }

    /// Fragment chains followed by the concat chain into `output`.
    pub fn chains(&self, output: StreamLabel) -> Vec<FilterChain> {
        let mut chains: Vec<FilterChain> = self.fragments.iter().map(AudioFragment::chain).collect();

        let mut concat = FilterChain::new();
        for fragment in &self.fragments {
            concat = concat.input(fragment.label());
        }
        chains.push(
            concat
                .filter(Filter::Concat {
                    segments: self.fragments.len(),
                    video: 0,
                    audio: 1,
                })
                .output(output),
        );

        chains
    }
}

/// Compile the intermittent pause strategy.
pub fn compile(plan: &TimelinePlan, pause_interval: f64, play_interval: f64) -> StrategyOutput {
    let schedule = LoopSchedule::build(plan, pause_interval, play_interval);

    let duration = if plan.target_explicit {
        plan.target_duration
    } else {
        plan.effective_duration + schedule.accumulated_frames() as f64 / plan.frame_rate
    };

    if schedule.is_empty() {
        debug!("No pause points inside the source, passing background through");
        return StrategyOutput::pass_through(duration);
    }

    let video = schedule
        .segments
        .iter()
        .fold(FilterChain::new().input(StreamLabel::video(0)), |chain, segment| {
            chain.filter(segment.filter())
        })
        .output(StreamLabel::named(LABEL_BACKGROUND));

    let audio_plan = AudioSegmentPlan::build(plan, &schedule, pause_interval, play_interval);
    let audio = audio_plan.chains(StreamLabel::named(LABEL_AUDIO_OUT));

    debug!(
        segments = schedule.segments.len(),
        accumulated_frames = schedule.accumulated_frames(),
        duration,
        "Compiled intermittent pause schedule"
    );

    StrategyOutput {
        video: Some(video),
        audio,
        audio_output: AudioMap::Filtered(StreamLabel::named(LABEL_AUDIO_OUT)),
        duration,
        truncated: schedule.truncated,
        loops: schedule.segments,
    }
}
