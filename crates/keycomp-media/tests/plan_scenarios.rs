//! End-to-end planning scenarios: probe values and parameters in, FFmpeg
//! graph and command out. No FFmpeg binary is needed.

use keycomp_media::{
    build_compose_command, plan_composition, AudioMap, MediaError, OverlayTemplate, Strategy,
    MAX_LOOP_SEGMENTS,
};
use keycomp_models::{EncodingConfig, MediaProbe, TimelineParameters};

fn probe() -> MediaProbe {
    MediaProbe {
        duration: 30.0,
        fps: 30.0,
    }
}

#[test]
fn freeze_scenario_renders_expected_graph() {
    let params = TimelineParameters {
        start_cut: 3.0,
        delay_start: 4.0,
        freeze_background: true,
        ..Default::default()
    };

    let plan = plan_composition(&probe(), &params, &OverlayTemplate::default()).unwrap();

    assert_eq!(plan.timeline.effective_duration, 27.0);
    assert_eq!(plan.timeline.strategy, Strategy::Freeze);
    assert_eq!(
        plan.graph.filter_complex(),
        "[0:v]trim=duration=4,tpad=stop_mode=clone:stop_duration=28[bg_processed];\
         [0:a]atrim=duration=4[outa];\
         [1:v][bg_processed]scale2ref=h=ih*0.85:w=-1[ovr_scaled][bg_ref];\
         [ovr_scaled]colorkey=0x00FF00:0.3:0.05[ovr_keyed];\
         [bg_ref][ovr_keyed]overlay=(W-w)/2:(H-h)/2:enable='gte(t,4)'[out]"
    );
    assert_eq!(plan.graph.audio_output.map_arg(), "[outa]");
    assert_eq!(plan.graph.duration, 27.0);
}

#[test]
fn intermittent_scenario_shifts_pause_points() {
    let params = TimelineParameters {
        start_cut: 3.0,
        delay_start: 4.0,
        intermittent_pause: true,
        pause_interval: 2.0,
        play_interval: 2.0,
        ..Default::default()
    };

    let plan = plan_composition(&probe(), &params, &OverlayTemplate::default()).unwrap();

    assert_eq!(plan.timeline.schedule_end(), 27.0);
    let first = plan.loops[0];
    assert_eq!(first.loop_frame_count, 60);
    assert_eq!(first.original_frame_index, 120);
    assert_eq!(first.accumulated_frames_before, 0);

    let second = plan.loops[1];
    assert_eq!(second.start_time, 6.0);
    assert_eq!(second.original_frame_index, 180);
    assert_eq!(second.accumulated_frames_before, 60);

    // 4, 6, ..., 26
    assert_eq!(plan.loops.len(), 12);
    assert!(!plan.truncated);

    let text = plan.graph.filter_complex();
    assert!(text.starts_with(
        "[0:v]loop=loop=60:size=1:start=120,loop=loop=60:size=1:start=240,"
    ));
    assert!(text.contains("[0:a]atrim=start=0:end=4,asetpts=PTS-STARTPTS[a_start]"));
    assert!(text.contains("aevalsrc=0:d=2:s=44100[silence_1]"));
    assert!(text.contains("concat=n=25:v=0:a=1[outa]"));
    assert_eq!(
        plan.graph.audio_output,
        AudioMap::Filtered(keycomp_media::StreamLabel::named("outa"))
    );

    // 27s of source plus 12 pauses of 2s each
    assert!((plan.graph.duration - 51.0).abs() < 1e-9);
}

#[test]
fn accumulated_frames_are_running_sum_of_loop_counts() {
    let params = TimelineParameters {
        delay_start: 1.5,
        intermittent_pause: true,
        pause_interval: 0.7,
        play_interval: 1.3,
        ..Default::default()
    };
    let probe = MediaProbe {
        duration: 60.0,
        fps: 23.976,
    };

    let plan = plan_composition(&probe, &params, &OverlayTemplate::default()).unwrap();

    let mut expected = 0;
    for segment in &plan.loops {
        assert_eq!(segment.accumulated_frames_before, expected);
        assert_eq!(
            segment.target_frame_index(),
            segment.original_frame_index + expected
        );
        expected += segment.loop_frame_count;
    }
    assert!(!plan.loops.is_empty());
}

#[test]
fn cut_equal_to_source_length_is_invalid_trim() {
    let params = TimelineParameters {
        start_cut: 30.0,
        ..Default::default()
    };
    let err = plan_composition(&probe(), &params, &OverlayTemplate::default()).unwrap_err();
    assert!(matches!(err, MediaError::InvalidTrim { .. }));
    assert!(err.is_client_error());
}

#[test]
fn schedule_is_capped_for_long_targets() {
    let params = TimelineParameters {
        intermittent_pause: true,
        pause_interval: 0.1,
        play_interval: 0.1,
        output_duration_minutes: 600.0,
        ..Default::default()
    };
    let probe = MediaProbe {
        duration: 7200.0,
        fps: 25.0,
    };

    let plan = plan_composition(&probe, &params, &OverlayTemplate::default()).unwrap();

    assert_eq!(plan.loops.len(), MAX_LOOP_SEGMENTS);
    assert!(plan.truncated);
    assert_eq!(plan.graph.duration, 36000.0);
}

#[test]
fn planning_is_deterministic() {
    let params = TimelineParameters {
        start_cut: 2.0,
        delay_start: 3.0,
        intermittent_pause: true,
        output_duration_minutes: 0.5,
        ..Default::default()
    };
    let template = OverlayTemplate::default();

    let a = plan_composition(&probe(), &params, &template).unwrap();
    let b = plan_composition(&probe(), &params, &template).unwrap();
    assert_eq!(a, b);

    let encoding = EncodingConfig::default();
    let cmd_a = build_compose_command("ffmpeg", "bg.mp4", "ov.mp4", "out.mp4", 2.0, &a.graph, &encoding);
    let cmd_b = build_compose_command("ffmpeg", "bg.mp4", "ov.mp4", "out.mp4", 2.0, &b.graph, &encoding);
    assert_eq!(cmd_a.build_args(), cmd_b.build_args());
}
