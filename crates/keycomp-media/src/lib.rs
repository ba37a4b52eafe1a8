#![deny(unreachable_patterns)]
//! Timeline planning and FFmpeg CLI wrapper for chroma-key compositing.
//!
//! This crate provides:
//! - Background probing through `ffprobe`
//! - Timeline planning (pass-through, freeze, intermittent pause)
//! - A typed filter graph rendered to `-filter_complex` text
//! - Type-safe FFmpeg command building and a progress-aware runner

pub mod command;
pub mod compose;
pub mod composite;
pub mod error;
pub mod graph;
pub mod probe;
pub mod progress;
pub mod strategy;
pub mod timeline;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegInput, FfmpegRunner, MediaTools};
pub use compose::{
    build_compose_command, compose_video, plan_composition, ComposeJob, ComposeOutcome,
    CompositionPlan,
};
pub use composite::{assemble, OverlayTemplate};
pub use error::{MediaError, MediaResult};
pub use graph::{AudioMap, Filter, FilterChain, FilterGraph, FilterGraphPlan, StreamLabel};
pub use probe::{parse_frame_rate, probe_media};
pub use progress::EncodeProgress;
pub use strategy::{compile_strategy, LoopSegment, StrategyOutput, MAX_LOOP_SEGMENTS};
pub use timeline::{plan_timeline, Strategy, TimelinePlan};
