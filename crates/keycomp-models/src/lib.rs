//! Shared data models for the keycomp compositor.
//!
//! This crate provides Serde-serializable types for:
//! - Caller-supplied timeline parameters and their validation
//! - Media probe results
//! - Encoding configuration
//! - Output file identifiers

pub mod encoding;
pub mod output;
pub mod params;
pub mod probe;

// Re-export common types
pub use encoding::EncodingConfig;
pub use output::OutputId;
pub use params::{ParameterError, TimelineParameters};
pub use probe::MediaProbe;
