//! Typed FFmpeg filter graph.
//!
//! Plans are built from [`Filter`] stages and [`StreamLabel`]s and only turned
//! into `-filter_complex` text through `Display`, so planning code never
//! concatenates filter strings by hand.

use std::fmt;

/// Label of the background stream after strategy processing.
pub const LABEL_BACKGROUND: &str = "bg_processed";
/// Label of the composited video output.
pub const LABEL_VIDEO_OUT: &str = "out";
/// Label of the strategy-produced audio output.
pub const LABEL_AUDIO_OUT: &str = "outa";

/// Stream type selector for input pads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    fn specifier(self) -> char {
        match self {
            Self::Video => 'v',
            Self::Audio => 'a',
        }
    }
}

/// A stream reference: either an input file's stream or a named pad.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLabel {
    Input { index: usize, kind: StreamKind },
    Named(String),
}

impl StreamLabel {
    /// Video stream of input `index`.
    pub fn video(index: usize) -> Self {
        Self::Input {
            index,
            kind: StreamKind::Video,
        }
    }

    /// Audio stream of input `index`.
    pub fn audio(index: usize) -> Self {
        Self::Input {
            index,
            kind: StreamKind::Audio,
        }
    }

    /// Named intermediate pad.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        debug_assert!(
            !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
            "invalid pad name {name:?}"
        );
        Self::Named(name)
    }
}

impl fmt::Display for StreamLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input { index, kind } => write!(f, "[{}:{}]", index, kind.specifier()),
            Self::Named(name) => write!(f, "[{}]", name),
        }
    }
}

/// How the output file's audio track is selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioMap {
    /// Source audio of the background, if it has any.
    Source,
    /// A pad produced inside the filter graph.
    Filtered(StreamLabel),
}

impl AudioMap {
    /// Value for FFmpeg's `-map` option.
    pub fn map_arg(&self) -> String {
        match self {
            Self::Source => "0:a?".to_string(),
            Self::Filtered(label) => label.to_string(),
        }
    }
}

/// Format seconds and ratios the way filter options expect them.
///
/// Whole values print without a fractional part (`4`, not `4.0`).
pub fn fmt_num(value: f64) -> String {
    format!("{}", value)
}

/// One filter stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Video trim (`trim`)
    Trim {
        start: Option<f64>,
        end: Option<f64>,
        duration: Option<f64>,
    },
    /// Clone the last frame for `stop_duration` seconds (`tpad`)
    TpadClone { stop_duration: f64 },
    /// Repeat `size` frames starting at frame `start`, `count` times (`loop`)
    Loop { count: u64, size: u64, start: u64 },
    /// Audio trim (`atrim`)
    ATrim {
        start: Option<f64>,
        end: Option<f64>,
        duration: Option<f64>,
    },
    /// Reset audio timestamps to start at zero (`asetpts`)
    ASetPtsReset,
    /// Silent audio source (`aevalsrc=0`)
    Silence { duration: f64, sample_rate: u32 },
    /// Concatenate segments (`concat`)
    Concat {
        segments: usize,
        video: usize,
        audio: usize,
    },
    /// Scale the first input relative to the second's height (`scale2ref`)
    Scale2RefHeight { ratio: f64 },
    /// Make a colour transparent (`colorkey`)
    ColorKey {
        color: u32,
        similarity: f64,
        blend: f64,
    },
    /// Centered overlay, optionally enabled only from a given time (`overlay`)
    OverlayCentered { enable_from: Option<f64> },
}

impl Filter {
    /// `trim=duration=...`
    pub fn trim_duration(duration: f64) -> Self {
        Self::Trim {
            start: None,
            end: None,
            duration: Some(duration),
        }
    }

    /// `atrim=duration=...`
    pub fn atrim_duration(duration: f64) -> Self {
        Self::ATrim {
            start: None,
            end: None,
            duration: Some(duration),
        }
    }

    /// `atrim=start=...:end=...`
    pub fn atrim_range(start: f64, end: f64) -> Self {
        Self::ATrim {
            start: Some(start),
            end: Some(end),
            duration: None,
        }
    }
}

fn write_trim_opts(
    f: &mut fmt::Formatter<'_>,
    name: &str,
    start: Option<f64>,
    end: Option<f64>,
    duration: Option<f64>,
) -> fmt::Result {
    let opts: Vec<String> = [("start", start), ("end", end), ("duration", duration)]
        .into_iter()
        .filter_map(|(key, value)| value.map(|v| format!("{}={}", key, fmt_num(v))))
        .collect();
    write!(f, "{}={}", name, opts.join(":"))
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trim {
                start,
                end,
                duration,
            } => write_trim_opts(f, "trim", *start, *end, *duration),
            Self::TpadClone { stop_duration } => write!(
                f,
                "tpad=stop_mode=clone:stop_duration={}",
                fmt_num(*stop_duration)
            ),
            Self::Loop { count, size, start } => {
                write!(f, "loop=loop={}:size={}:start={}", count, size, start)
            }
            Self::ATrim {
                start,
                end,
                duration,
            } => write_trim_opts(f, "atrim", *start, *end, *duration),
            Self::ASetPtsReset => write!(f, "asetpts=PTS-STARTPTS"),
            Self::Silence {
                duration,
                sample_rate,
            } => write!(f, "aevalsrc=0:d={}:s={}", fmt_num(*duration), sample_rate),
            Self::Concat {
                segments,
                video,
                audio,
            } => write!(f, "concat=n={}:v={}:a={}", segments, video, audio),
            Self::Scale2RefHeight { ratio } => {
                write!(f, "scale2ref=h=ih*{}:w=-1", fmt_num(*ratio))
            }
            Self::ColorKey {
                color,
                similarity,
                blend,
            } => write!(
                f,
                "colorkey=0x{:06X}:{}:{}",
                color,
                fmt_num(*similarity),
                fmt_num(*blend)
            ),
            Self::OverlayCentered { enable_from } => {
                write!(f, "overlay=(W-w)/2:(H-h)/2")?;
                if let Some(t) = enable_from {
                    // Quoted so the comma stays inside the expression
                    write!(f, ":enable='gte(t,{})'", fmt_num(*t))?;
                }
                Ok(())
            }
        }
    }
}

/// A linear chain of filters between labelled pads.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<StreamLabel>,
    pub filters: Vec<Filter>,
    pub outputs: Vec<StreamLabel>,
}

impl FilterChain {
    /// Chain with no pads yet.
    pub fn new() -> Self {
        Self {
            inputs: Vec::new(),
            filters: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Add an input pad.
    pub fn input(mut self, label: StreamLabel) -> Self {
        self.inputs.push(label);
        self
    }

    /// Append a filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an output pad.
    pub fn output(mut self, label: StreamLabel) -> Self {
        self.outputs.push(label);
        self
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.inputs {
            write!(f, "{}", label)?;
        }
        for (i, filter) in self.filters.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}", filter)?;
        }
        for label in &self.outputs {
            write!(f, "{}", label)?;
        }
        Ok(())
    }
}

/// An ordered set of chains, serialized with `;` separators.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
}

impl FilterGraph {
    /// Append a chain.
    pub fn push(&mut self, chain: FilterChain) {
        self.chains.push(chain);
    }

    /// Whether the graph has no chains.
    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}

impl fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, chain) in self.chains.iter().enumerate() {
            if i > 0 {
                write!(f, ";")?;
            }
            write!(f, "{}", chain)?;
        }
        Ok(())
    }
}

/// The assembled graph plus everything the encoder needs besides file paths.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraphPlan {
    pub graph: FilterGraph,
    pub video_output: StreamLabel,
    pub audio_output: AudioMap,
    /// Output length in seconds (`-t`)
    pub duration: f64,
}

impl FilterGraphPlan {
    /// `-filter_complex` text.
    pub fn filter_complex(&self) -> String {
        self.graph.to_string()
    }
}
