//! Compositing assembler.
//!
//! Appends the fixed overlay template to whatever background stream the
//! strategy produced: scale the overlay against the background, key out the
//! green, and overlay it centered from `delay_start` on.

use crate::graph::{
    Filter, FilterChain, FilterGraph, FilterGraphPlan, StreamLabel, LABEL_BACKGROUND,
    LABEL_VIDEO_OUT,
};
use crate::strategy::StrategyOutput;
use crate::timeline::TimelinePlan;

/// Overlay height relative to the background height.
pub const OVERLAY_HEIGHT_RATIO: f64 = 0.85;
/// Chroma key colour (pure green).
pub const KEY_COLOR: u32 = 0x00FF00;
/// Colour similarity tolerance for the key.
pub const KEY_SIMILARITY: f64 = 0.3;
/// Edge blend for the key.
pub const KEY_BLEND: f64 = 0.05;

/// Parameters of the fixed compositing template.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayTemplate {
    pub height_ratio: f64,
    pub key_color: u32,
    pub similarity: f64,
    pub blend: f64,
}

impl Default for OverlayTemplate {
    fn default() -> Self {
        Self {
            height_ratio: OVERLAY_HEIGHT_RATIO,
            key_color: KEY_COLOR,
            similarity: KEY_SIMILARITY,
            blend: KEY_BLEND,
        }
    }
}

/// Assemble the full graph plan from a strategy's fragments.
///
/// Chain order: background rewrite, audio chains, then the overlay template.
pub fn assemble(plan: &TimelinePlan, strategy: &StrategyOutput, template: &OverlayTemplate) -> FilterGraphPlan {
    let mut graph = FilterGraph::default();

    let background = match &strategy.video {
        Some(chain) => {
            graph.push(chain.clone());
            StreamLabel::named(LABEL_BACKGROUND)
        }
        None => StreamLabel::video(0),
    };

    for chain in &strategy.audio {
        graph.push(chain.clone());
    }

    graph.push(
        FilterChain::new()
            .input(StreamLabel::video(1))
            .input(background)
            .filter(Filter::Scale2RefHeight {
                ratio: template.height_ratio,
            })
            .output(StreamLabel::named("ovr_scaled"))
            .output(StreamLabel::named("bg_ref")),
    );
    graph.push(
        FilterChain::new()
            .input(StreamLabel::named("ovr_scaled"))
            .filter(Filter::ColorKey {
                color: template.key_color,
                similarity: template.similarity,
                blend: template.blend,
            })
            .output(StreamLabel::named("ovr_keyed")),
    );
    graph.push(
        FilterChain::new()
            .input(StreamLabel::named("bg_ref"))
            .input(StreamLabel::named("ovr_keyed"))
            .filter(Filter::OverlayCentered {
                enable_from: Some(plan.delay_start),
            })
            .output(StreamLabel::named(LABEL_VIDEO_OUT)),
    );

    FilterGraphPlan {
        graph,
        video_output: StreamLabel::named(LABEL_VIDEO_OUT),
        audio_output: strategy.audio_output.clone(),
        duration: strategy.duration,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::AudioMap;
    use crate::timeline::Strategy;

    fn plan(delay: f64) -> TimelinePlan {
        TimelinePlan {
            effective_duration: 20.0,
            target_duration: 20.0,
            target_explicit: false,
            delay_start: delay,
            frame_rate: 25.0,
            strategy: Strategy::PassThrough,
        }
    }

    #[test]
    fn test_pass_through_uses_raw_background() {
        let strategy = StrategyOutput::pass_through(20.0);
        let graph = assemble(&plan(2.5), &strategy, &OverlayTemplate::default());

        assert_eq!(
            graph.filter_complex(),
            "[1:v][0:v]scale2ref=h=ih*0.85:w=-1[ovr_scaled][bg_ref];\
             [ovr_scaled]colorkey=0x00FF00:0.3:0.05[ovr_keyed];\
             [bg_ref][ovr_keyed]overlay=(W-w)/2:(H-h)/2:enable='gte(t,2.5)'[out]"
        );
        assert_eq!(graph.video_output.to_string(), "[out]");
        assert_eq!(graph.audio_output, AudioMap::Source);
        assert_eq!(graph.duration, 20.0);
    }

    #[test]
    fn test_custom_template() {
        let template = OverlayTemplate {
            height_ratio: 0.5,
            key_color: 0x0000FF,
            ..Default::default()
        };
        let graph = assemble(&plan(0.0), &StrategyOutput::pass_through(20.0), &template);
        let text = graph.filter_complex();
        assert!(text.contains("scale2ref=h=ih*0.5:w=-1"));
        assert!(text.contains("colorkey=0x0000FF:0.3:0.05"));
        assert!(text.contains("enable='gte(t,0)'"));
    }
}
