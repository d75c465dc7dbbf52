use super::*;
use crate::animation::point::InterpolationType;
use crate::effects::negate::Negate;
use crate::foundation::core::{ChannelLayout, Rgba8Premul};
use crate::reader::ReaderInfo;
use crate::reader::dummy::DummyReader;

const RED: [u8; 4] = [200, 100, 50, 255];

fn fps() -> Fraction {
    Fraction::new(30, 1)
}

fn target() -> TimelineInfo {
    TimelineInfo::new(4, 3, fps(), 48_000, ChannelLayout::Stereo)
}

fn dummy(duration: f64) -> DummyReader {
    let info = ReaderInfo::new(4, 3, fps(), 48_000, ChannelLayout::Stereo, duration);
    DummyReader::new(info, Rgba8Premul::opaque(200, 100, 50))
}

fn open_clip(reader: DummyReader) -> Clip {
    let clip = Clip::new(Box::new(reader)).unwrap();
    clip.open().unwrap();
    clip
}

fn pixels(frame: &Frame) -> Vec<[u8; 4]> {
    frame
        .image()
        .unwrap()
        .chunks_exact(4)
        .map(|p| [p[0], p[1], p[2], p[3]])
        .collect()
}

#[test]
fn gravity_anchors() {
    assert_eq!(Gravity::TopLeft.anchor(), (0.0, 0.0));
    assert_eq!(Gravity::Center.anchor(), (0.5, 0.5));
    assert_eq!(Gravity::BottomRight.anchor(), (1.0, 1.0));
    assert_eq!(Gravity::default(), Gravity::Center);
    assert_eq!(
        serde_json::to_value(Gravity::BottomLeft).unwrap(),
        serde_json::json!("bottom_left")
    );
}

#[test]
fn new_clip_spans_whole_reader() {
    let clip = Clip::new(Box::new(dummy(2.0))).unwrap();
    assert_eq!(clip.props.start, 0.0);
    assert_eq!(clip.props.end, 2.0);
    assert_eq!(clip.duration(), 2.0);
    assert_eq!(clip.frame_span(fps()), Some((1, 60)));
    assert!(!clip.is_open());
}

#[test]
fn span_and_clip_frame_follow_position_and_trim() {
    let clip = Clip::new(Box::new(dummy(2.0)))
        .unwrap()
        .placed(1.0, 0)
        .trimmed(0.5, 2.0);
    assert_eq!(clip.frame_span(fps()), Some((31, 75)));
    assert!(!clip.covers(30, fps()));
    assert!(clip.covers(31, fps()));
    assert!(clip.covers(75, fps()));
    assert!(!clip.covers(76, fps()));
    assert_eq!(clip.clip_frame_number(31, fps()), 16);
    assert_eq!(clip.clip_frame_number(32, fps()), 17);
}

#[test]
fn end_is_clamped_to_reader_duration() {
    let clip = Clip::new(Box::new(dummy(1.0))).unwrap().trimmed(0.0, 5.0);
    assert_eq!(clip.effective_end(), 1.0);
    assert_eq!(clip.frame_span(fps()), Some((1, 30)));
}

#[test]
fn empty_trim_contributes_nothing() {
    let clip = open_clip(dummy(2.0)).trimmed(0.0, 0.0);
    for n in [1, 2, 30] {
        let f = clip.get_frame(&target(), n).unwrap();
        assert_eq!(f.number, n);
        assert!(pixels(&f).iter().all(|p| *p == [0; 4]));
        let audio = f.audio().unwrap();
        assert_eq!(audio.sample_count(), 1600);
        assert!(audio.channels.iter().flatten().all(|s| *s == 0.0));
    }
}

#[test]
fn same_size_source_fills_canvas() {
    let clip = open_clip(dummy(2.0));
    let f = clip.get_frame(&target(), 5).unwrap();
    assert_eq!((f.width(), f.height()), (4, 3));
    assert!(pixels(&f).iter().all(|p| *p == RED));
    assert_eq!(f.audio().unwrap().sample_count(), 1600);
}

#[test]
fn frames_outside_span_are_transparent() {
    let clip = open_clip(dummy(1.0)).placed(1.0, 0);
    let before = clip.get_frame(&target(), 30).unwrap();
    assert!(pixels(&before).iter().all(|p| *p == [0; 4]));
    let inside = clip.get_frame(&target(), 31).unwrap();
    assert!(pixels(&inside).iter().all(|p| *p == RED));
    let after = clip.get_frame(&target(), 61).unwrap();
    assert!(pixels(&after).iter().all(|p| *p == [0; 4]));
}

#[test]
fn closed_reader_error_propagates() {
    let clip = Clip::new(Box::new(dummy(1.0))).unwrap();
    assert!(matches!(
        clip.get_frame(&target(), 1),
        Err(MontageError::ReaderClosed(_))
    ));
    assert!(clip.get_frame(&target(), 31).is_ok());
}

#[test]
fn location_offsets_by_canvas_fraction() {
    let mut clip = open_clip(dummy(1.0));
    clip.keyframes.location_x = Keyframe::with_value(0.5);
    let f = clip.get_frame(&target(), 1).unwrap();
    for y in 0..3 {
        assert_eq!(f.pixel(1, y), Some([0; 4]));
        assert_eq!(f.pixel(2, y), Some(RED));
        assert_eq!(f.pixel(3, y), Some(RED));
    }
}

#[test]
fn crop_masks_source_area() {
    let mut clip = open_clip(dummy(1.0));
    clip.keyframes.crop_width = Keyframe::with_value(0.5);
    let f = clip.get_frame(&target(), 1).unwrap();
    assert_eq!(f.pixel(1, 1), Some(RED));
    assert_eq!(f.pixel(2, 1), Some([0; 4]));
}

#[test]
fn natural_perspective_corners_change_nothing() {
    let plain = open_clip(dummy(1.0)).get_frame(&target(), 1).unwrap();
    let mut clip = open_clip(dummy(1.0));
    let kf = &mut clip.keyframes;
    kf.perspective_c1_x = Keyframe::with_value(0.0);
    kf.perspective_c1_y = Keyframe::with_value(0.0);
    kf.perspective_c4_x = Keyframe::with_value(1.0);
    kf.perspective_c4_y = Keyframe::with_value(1.0);
    let warped = clip.get_frame(&target(), 1).unwrap();
    assert_eq!(warped.fingerprint(), plain.fingerprint());
}

#[test]
fn perspective_pinch_clears_a_corner() {
    let mut clip = open_clip(dummy(1.0));
    clip.keyframes.perspective_c2_x = Keyframe::with_value(0.5);
    clip.keyframes.perspective_c2_y = Keyframe::with_value(0.0);
    let f = clip.get_frame(&target(), 1).unwrap();
    assert_eq!(f.pixel(3, 0), Some([0; 4]));
    assert_eq!(f.pixel(0, 2), Some(RED));
}

#[test]
fn alpha_and_visibility_keyframes() {
    let mut clip = open_clip(dummy(1.0));
    clip.keyframes.alpha = Keyframe::with_value(0.0);
    let f = clip.get_frame(&target(), 1).unwrap();
    assert!(pixels(&f).iter().all(|p| *p == [0; 4]));

    let mut hidden = open_clip(dummy(1.0));
    hidden.keyframes.has_video = Keyframe::with_value(0.0);
    let f = hidden.get_frame(&target(), 1).unwrap();
    assert!(pixels(&f).iter().all(|p| *p == [0; 4]));
    assert_eq!(f.audio().unwrap().sample_count(), 1600);
}

#[test]
fn volume_and_mute_shape_audio() {
    let loud = open_clip(dummy(1.0).with_tone(440.0));
    let reference = loud.get_frame(&target(), 3).unwrap();
    let reference = &reference.audio().unwrap().channels[0];
    assert!(reference.iter().any(|s| s.abs() > 0.1));

    let mut half = open_clip(dummy(1.0).with_tone(440.0));
    half.keyframes.volume = Keyframe::with_value(0.5);
    let f = half.get_frame(&target(), 3).unwrap();
    for (a, b) in f.audio().unwrap().channels[0].iter().zip(reference) {
        assert!((a - b * 0.5).abs() < 1e-6);
    }

    let mut muted = open_clip(dummy(1.0).with_tone(440.0));
    muted.keyframes.has_audio = Keyframe::with_value(0.0);
    assert!(!muted.is_audible_at(3));
    let f = muted.get_frame(&target(), 3).unwrap();
    assert!(f.audio().unwrap().channels.iter().flatten().all(|s| *s == 0.0));
}

#[test]
fn decreasing_time_curve_plays_audio_backwards() {
    let forward = open_clip(dummy(1.0).with_tone(440.0));
    let source = forward.get_frame(&target(), 30).unwrap();

    let mut remapped = open_clip(dummy(1.0).with_tone(440.0));
    let mut time = Keyframe::new();
    time.add_xy(1.0, 30.0, InterpolationType::Linear);
    time.add_xy(30.0, 1.0, InterpolationType::Linear);
    remapped.keyframes.time = time;
    let f = remapped.get_frame(&target(), 1).unwrap();
    assert_eq!(f.number, 1);

    let mut expected = source.audio().unwrap().clone();
    expected.reverse();
    assert_eq!(f.audio().unwrap(), &expected);
}

#[test]
fn waveform_replaces_image() {
    let mut clip = open_clip(dummy(1.0));
    clip.props.waveform = true;
    let f = clip.get_frame(&target(), 1).unwrap();
    for x in 0..4 {
        assert_eq!(f.pixel(x, 0), Some([0; 4]));
        assert_eq!(f.pixel(x, 1), Some([0, 123, 255, 255]));
        assert_eq!(f.pixel(x, 2), Some([0; 4]));
    }
}

#[test]
fn effects_run_in_order_and_can_be_removed() {
    let mut clip = open_clip(dummy(1.0));
    let mut first = Negate::new();
    first.base_mut().id = "a".into();
    first.base_mut().order = 1;
    let mut second = Negate::new();
    second.base_mut().id = "b".into();
    clip.add_effect(Box::new(first));
    clip.add_effect(Box::new(second));
    let ids: Vec<_> = clip.effects().map(|e| e.base().id.clone()).collect();
    assert_eq!(ids, ["b", "a"]);

    let twice = clip.get_frame(&target(), 1).unwrap();
    assert_eq!(twice.pixel(0, 0), Some(RED));

    assert!(clip.remove_effect("a").is_some());
    assert!(clip.remove_effect("a").is_none());
    assert!(clip.effect("b").is_some());
    clip.clear_cache().unwrap();
    let once = clip.get_frame(&target(), 1).unwrap();
    assert_eq!(once.pixel(0, 0), Some([55, 155, 205, 255]));
}

#[test]
fn repeated_requests_share_cached_frame() {
    let clip = open_clip(dummy(1.0));
    let a = clip.get_frame(&target(), 4).unwrap();
    let b = clip.get_frame(&target(), 4).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn json_round_trip_preserves_output() {
    let readers = ReaderRegistry::with_builtins();
    let effects = EffectRegistry::with_builtins();

    let mut clip = Clip::new(Box::new(dummy(2.0).with_tone(220.0)))
        .unwrap()
        .with_id("c1")
        .placed(0.5, 2)
        .trimmed(0.25, 1.5);
    clip.props.gravity = Gravity::TopLeft;
    clip.props.scale = ScaleMode::None;
    clip.props.mixing = VolumeMix::Average;
    clip.keyframes.scale_x = Keyframe::with_value(0.5);
    let mut alpha = Keyframe::new();
    alpha.add_xy(1.0, 1.0, InterpolationType::Linear);
    alpha.add_xy(40.0, 0.25, InterpolationType::Linear);
    clip.keyframes.alpha = alpha;
    clip.add_effect(Box::new(Negate::new()));

    let doc = clip.to_json_value();
    assert_eq!(doc["gravity"], "top_left");
    assert_eq!(doc["duration"], 1.25);
    assert_eq!(doc["reader"]["type"], "DummyReader");
    assert_eq!(doc["effects"][0]["type"], "Negate");

    let restored = Clip::from_json_value(&doc, &readers, &effects).unwrap();
    assert_eq!(restored.props, clip.props);
    assert_eq!(restored.keyframes, clip.keyframes);
    clip.open().unwrap();
    restored.open().unwrap();
    for n in [15, 16, 30, 52] {
        let a = clip.get_frame(&target(), n).unwrap();
        let b = restored.get_frame(&target(), n).unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint(), "frame {n}");
    }
}

#[test]
fn strict_load_requires_reader() {
    let err = Clip::from_json_value(
        &serde_json::json!({"layer": 1}),
        &ReaderRegistry::with_builtins(),
        &EffectRegistry::with_builtins(),
    )
    .unwrap_err();
    match err {
        MontageError::InvalidJson { context, .. } => assert_eq!(context, "Clip::from_json"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn partial_apply_keeps_absent_keys() {
    let readers = ReaderRegistry::with_builtins();
    let effects = EffectRegistry::with_builtins();
    let mut clip = Clip::new(Box::new(dummy(2.0))).unwrap().placed(1.0, 4);
    clip.apply_json_value(
        &serde_json::json!({"layer": 7, "alpha": {"Points": [{"co": {"X": 1.0, "Y": 0.5}}]}}),
        &readers,
        &effects,
    )
    .unwrap();
    assert_eq!(clip.props.layer, 7);
    assert_eq!(clip.props.position, 1.0);
    assert_eq!(clip.keyframes.alpha.value_or(1.0, 1.0), 0.5);
    assert_eq!(clip.keyframes.scale_x.value_or(1.0, 0.0), 1.0);

    let bad = clip.apply_json_value(&serde_json::json!({"layer": "top"}), &readers, &effects);
    assert!(matches!(bad, Err(MontageError::InvalidJson { .. })));
    assert_eq!(clip.props.layer, 7);

    let bad = clip.apply_json_value(
        &serde_json::json!({"layer": 9, "effects": [{"type": "Sparkle"}]}),
        &readers,
        &effects,
    );
    assert!(bad.is_err());
    assert_eq!(clip.props.layer, 7);
}

#[test]
fn cached_frames_follow_a_canvas_resize() {
    let clip = open_clip(dummy(1.0));
    let small = clip.get_frame(&target(), 3).unwrap();
    assert_eq!((small.width(), small.height()), (4, 3));
    assert!(Arc::ptr_eq(&small, &clip.get_frame(&target(), 3).unwrap()));

    let large = TimelineInfo::new(8, 6, fps(), 48_000, ChannelLayout::Stereo);
    let resized = clip.get_frame(&large, 3).unwrap();
    assert_eq!((resized.width(), resized.height()), (8, 6));
    assert_eq!(resized.pixel(4, 3), Some(RED));
}
