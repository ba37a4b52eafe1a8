//! Timeline planning.
//!
//! Turns a probe result and the caller's parameters into a [`TimelinePlan`]:
//! the usable source length, the requested output length and the one
//! background strategy every later stage works from.

use tracing::info;

use keycomp_models::{MediaProbe, TimelineParameters};

use crate::error::{MediaError, MediaResult};

/// How the background is manipulated before compositing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Strategy {
    /// Background plays unmodified.
    PassThrough,
    /// Background freezes on its frame at `delay_start`.
    Freeze,
    /// Background alternates between paused and playing.
    IntermittentPause {
        pause_interval: f64,
        play_interval: f64,
    },
}

impl Strategy {
    /// Pick the strategy by priority: intermittent pause, then freeze, then pass-through.
    pub fn select(params: &TimelineParameters) -> Self {
        if params.intermittent_pause {
            Self::IntermittentPause {
                pause_interval: params.pause_interval,
                play_interval: params.play_interval,
            }
        } else if params.freeze_background {
            Self::Freeze
        } else {
            Self::PassThrough
        }
    }

    /// Stable name for logs, metrics and API responses.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass_through",
            Self::Freeze => "freeze",
            Self::IntermittentPause { .. } => "intermittent_pause",
        }
    }
}

/// Derived timing for one composition.
#[derive(Debug, Clone, PartialEq)]
pub struct TimelinePlan {
    /// Source length after the start cut
    pub effective_duration: f64,
    /// Requested output length, or `effective_duration`
    pub target_duration: f64,
    /// Whether `target_duration` came from the caller
    pub target_explicit: bool,
    /// Overlay start, relative to the trimmed background
    pub delay_start: f64,
    /// Background frame rate
    pub frame_rate: f64,
    pub strategy: Strategy,
}

impl TimelinePlan {
    /// Time up to which pause/freeze behaviour is scheduled.
    pub fn schedule_end(&self) -> f64 {
        if self.target_explicit {
            self.target_duration
        } else {
            self.effective_duration
        }
    }
}

/// Plan the timeline for one run.
pub fn plan_timeline(probe: &MediaProbe, params: &TimelineParameters) -> MediaResult<TimelinePlan> {
    params.validate()?;
    if !probe.is_valid() {
        return Err(MediaError::probe_failed(
            format!("invalid probe values: duration={}, fps={}", probe.duration, probe.fps),
            None,
        ));
    }

    let effective_duration = probe.duration - params.start_cut;
    if effective_duration <= 0.0 {
        return Err(MediaError::InvalidTrim {
            start_cut: params.start_cut,
            duration: probe.duration,
        });
    }

    let target_explicit = params.has_target_duration();
    let target_duration = if target_explicit {
        params.output_duration_minutes * 60.0
    } else {
        effective_duration
    };

    let strategy = Strategy::select(params);

    info!(
        effective_duration,
        target_duration,
        strategy = strategy.name(),
        "Planned timeline"
    );

    Ok(TimelinePlan {
        effective_duration,
        target_duration,
        target_explicit,
        delay_start: params.delay_start,
        frame_rate: probe.fps,
        strategy,
    })
}
