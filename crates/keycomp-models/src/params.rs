//! Caller-supplied timeline parameters.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default pause length for intermittent mode (seconds).
pub const DEFAULT_PAUSE_INTERVAL: f64 = 2.0;
/// Default play length for intermittent mode (seconds).
pub const DEFAULT_PLAY_INTERVAL: f64 = 2.0;

/// Errors raised when timeline parameters are out of range.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("{0} must be a finite number")]
    NotFinite(&'static str),

    #[error("{0} must not be negative (got {1})")]
    Negative(&'static str, f64),

    #[error("{0} must be greater than zero (got {1})")]
    NotPositive(&'static str, f64),
}

/// Temporal parameters for one composition run.
///
/// Times are in seconds relative to the trimmed background, except
/// `output_duration_minutes` where `0` means "use the source length".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelineParameters {
    /// Seconds to wait before the overlay appears
    #[serde(default)]
    pub delay_start: f64,

    /// Seconds cut from the start of the background
    #[serde(default)]
    pub start_cut: f64,

    /// Freeze the background on its last pre-overlay frame
    #[serde(default)]
    pub freeze_background: bool,

    /// Alternate between paused and playing background
    #[serde(default)]
    pub intermittent_pause: bool,

    /// Pause length in intermittent mode
    #[serde(default = "default_pause_interval")]
    pub pause_interval: f64,

    /// Play length in intermittent mode
    #[serde(default = "default_play_interval")]
    pub play_interval: f64,

    /// Requested output length in minutes (0 = source length)
    #[serde(default)]
    pub output_duration_minutes: f64,
}

fn default_pause_interval() -> f64 {
    DEFAULT_PAUSE_INTERVAL
}
fn default_play_interval() -> f64 {
    DEFAULT_PLAY_INTERVAL
}

impl Default for TimelineParameters {
    fn default() -> Self {
        Self {
            delay_start: 0.0,
            start_cut: 0.0,
            freeze_background: false,
            intermittent_pause: false,
            pause_interval: DEFAULT_PAUSE_INTERVAL,
            play_interval: DEFAULT_PLAY_INTERVAL,
            output_duration_minutes: 0.0,
        }
    }
}

impl TimelineParameters {
    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ParameterError> {
        non_negative("delay_start", self.delay_start)?;
        non_negative("start_cut", self.start_cut)?;
        non_negative("output_duration_minutes", self.output_duration_minutes)?;
        positive("pause_interval", self.pause_interval)?;
        positive("play_interval", self.play_interval)?;
        Ok(())
    }

    /// Whether the caller asked for an explicit output length.
    pub fn has_target_duration(&self) -> bool {
        self.output_duration_minutes > 0.0
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if !value.is_finite() {
        return Err(ParameterError::NotFinite(name));
    }
    if value < 0.0 {
        return Err(ParameterError::Negative(name, value));
    }
    Ok(())
}

fn positive(name: &'static str, value: f64) -> Result<(), ParameterError> {
    if !value.is_finite() {
        return Err(ParameterError::NotFinite(name));
    }
    if value <= 0.0 {
        return Err(ParameterError::NotPositive(name, value));
    }
    Ok(())
}
