//! Media probe results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Duration and frame rate of a background file, as reported by FFprobe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaProbe {
    /// Total duration in seconds
    pub duration: f64,
    /// Frame rate (fps), already reduced from `num/den`
    pub fps: f64,
}

impl MediaProbe {
    /// Create a probe result, rejecting non-positive or non-finite values.
    pub fn new(duration: f64, fps: f64) -> Option<Self> {
        let probe = Self { duration, fps };
        probe.is_valid().then_some(probe)
    }

    /// Both fields are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.duration.is_finite() && self.duration > 0.0 && self.fps.is_finite() && self.fps > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_validates() {
        assert!(MediaProbe::new(30.0, 30.0).is_some());
        assert!(MediaProbe::new(0.0, 30.0).is_none());
        assert!(MediaProbe::new(30.0, 0.0).is_none());
        assert!(MediaProbe::new(f64::INFINITY, 30.0).is_none());
    }
}
