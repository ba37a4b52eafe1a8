//! Strategy compilers.
//!
//! Each strategy turns a [`TimelinePlan`] into the chains that rewrite the
//! background video (`[0:v]` to `[bg_processed]`) and, when the strategy
//! changes the audio timeline, the chains that produce `[outa]`.

pub mod freeze;
pub mod intermittent;

pub use intermittent::{AudioFragment, AudioSegmentPlan, LoopSchedule, LoopSegment, MAX_LOOP_SEGMENTS};

use crate::graph::{AudioMap, FilterChain};
use crate::timeline::{Strategy, TimelinePlan};

/// Graph fragments produced by a strategy.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    /// Chain from `[0:v]` to the processed background, if any
    pub video: Option<FilterChain>,
    /// Audio chains, in graph order
    pub audio: Vec<FilterChain>,
    pub audio_output: AudioMap,
    /// Output length in seconds
    pub duration: f64,
    /// Loop insertions (intermittent pause only)
    pub loops: Vec<LoopSegment>,
    /// Whether the loop list hit [`MAX_LOOP_SEGMENTS`]
    pub truncated: bool,
}

impl StrategyOutput {
    /// Leave the background and its audio untouched.
    pub fn pass_through(duration: f64) -> Self {
        Self {
            video: None,
            audio: Vec::new(),
            audio_output: AudioMap::Source,
            duration,
            loops: Vec::new(),
            truncated: false,
        }
    }
}

/// Compile the plan's strategy into graph fragments.
pub fn compile_strategy(plan: &TimelinePlan) -> StrategyOutput {
    match plan.strategy {
        Strategy::PassThrough => StrategyOutput::pass_through(plan.target_duration),
        Strategy::Freeze => freeze::compile(plan),
        Strategy::IntermittentPause {
            pause_interval,
            play_interval,
        } => intermittent::compile(plan, pause_interval, play_interval),
    }
}
