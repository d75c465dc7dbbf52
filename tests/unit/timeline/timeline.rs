use std::sync::atomic::AtomicUsize;

use super::*;
use crate::animation::point::InterpolationType;
use crate::clip::AnchorMode;
use crate::effects::EffectBase;
use crate::effects::negate::Negate;
use crate::foundation::core::Rgba8Premul;
use crate::reader::dummy::DummyReader;
use crate::writer::Writer;
use crate::writer::memory::InMemoryWriter;

fn fps() -> Fraction {
    Fraction::new(30, 1)
}

fn info() -> TimelineInfo {
    TimelineInfo::new(4, 4, fps(), 48_000, ChannelLayout::Stereo)
}

fn dummy(color: Rgba8Premul, duration: f64) -> DummyReader {
    let info = ReaderInfo::new(4, 4, fps(), 48_000, ChannelLayout::Stereo, duration);
    DummyReader::new(info, color)
}

fn clip(id: &str, color: Rgba8Premul, layer: i32) -> Clip {
    Clip::new(Box::new(dummy(color, 2.0)))
        .unwrap()
        .with_id(id)
        .placed(0.0, layer)
}

fn timeline() -> Timeline {
    Timeline::new(info(), Settings::default()).unwrap()
}

#[derive(Debug)]
struct CountingReader {
    inner: DummyReader,
    reads: Arc<AtomicUsize>,
}

impl Reader for CountingReader {
    fn info(&self) -> &ReaderInfo {
        self.inner.info()
    }
    fn open(&self) -> MontageResult<()> {
        self.inner.open()
    }
    fn close(&self) {
        self.inner.close();
    }
    fn is_open(&self) -> bool {
        self.inner.is_open()
    }
    fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(5));
        self.inner.get_frame(number)
    }
    fn json_value(&self) -> serde_json::Value {
        self.inner.json_value()
    }
}

#[test]
fn info_validation() {
    assert!(info().validate().is_ok());
    let mut bad = info();
    bad.width = 0;
    assert!(matches!(bad.validate(), Err(MontageError::Validation(_))));
    let mut bad = info();
    bad.channels = 6;
    assert!(matches!(bad.validate(), Err(MontageError::Validation(_))));
    assert!(Timeline::new(bad, Settings::default()).is_err());
    assert_eq!(info().samples_per_frame(1), 1600);
}

#[test]
fn closed_timeline_refuses_frames() {
    let t = timeline();
    assert!(matches!(t.get_frame(1), Err(MontageError::ReaderClosed(_))));
    t.open().unwrap();
    t.open().unwrap();
    assert!(t.get_frame(1).is_ok());
    t.close();
    t.close();
    assert!(!t.is_open());
    assert!(matches!(t.get_frame(1), Err(MontageError::ReaderClosed(_))));
}

#[test]
fn empty_timeline_is_transparent_and_silent() {
    let t = timeline();
    t.open().unwrap();
    let f = t.get_frame(7).unwrap();
    assert_eq!(f.number, 7);
    assert_eq!((f.width(), f.height()), (4, 4));
    assert!(f.image().unwrap().iter().all(|b| *b == 0));
    let audio = f.audio().unwrap();
    assert_eq!(audio.channel_count(), 2);
    assert_eq!(audio.sample_count(), 1600);
    assert!(audio.channels.iter().flatten().all(|s| *s == 0.0));
    assert_eq!(t.max_frame(), 0);
}

#[test]
fn top_layer_wins_where_opaque() {
    let mut t = timeline();
    t.add_clip(clip("top", Rgba8Premul::opaque(0, 0, 255), 2)).unwrap();
    t.add_clip(clip("bottom", Rgba8Premul::opaque(255, 0, 0), 0)).unwrap();
    t.add_clip(clip("middle", Rgba8Premul::opaque(0, 255, 0), 1)).unwrap();
    t.open().unwrap();

    let order: Vec<_> = t
        .find_intersecting_clips(1)
        .iter()
        .map(|c| c.props.id.clone())
        .collect();
    assert_eq!(order, ["bottom", "middle", "top"]);

    let f = t.get_frame(1).unwrap();
    for y in 0..4 {
        for x in 0..4 {
            assert_eq!(f.pixel(x, y), Some([0, 0, 255, 255]));
        }
    }
}

#[test]
fn equal_layers_order_by_position() {
    let mut t = timeline();
    t.add_clip(clip("late", Rgba8Premul::opaque(0, 0, 255), 0).placed(0.5, 0))
        .unwrap();
    t.add_clip(clip("early", Rgba8Premul::opaque(255, 0, 0), 0)).unwrap();
    let order: Vec<_> = t
        .find_intersecting_clips(20)
        .iter()
        .map(|c| c.props.id.clone())
        .collect();
    assert_eq!(order, ["early", "late"]);
    assert_eq!(t.find_intersecting_clips(10).len(), 1);
    assert_eq!(t.max_frame(), 75);
}

#[test]
fn lower_layer_shows_around_smaller_clip() {
    let mut t = timeline();
    t.add_clip(clip("bg", Rgba8Premul::opaque(255, 0, 0), 0)).unwrap();
    let mut small = clip("fg", Rgba8Premul::opaque(0, 0, 255), 1);
    small.keyframes.scale_x = Keyframe::with_value(0.5);
    small.keyframes.scale_y = Keyframe::with_value(0.5);
    t.add_clip(small).unwrap();
    t.open().unwrap();
    let f = t.get_frame(1).unwrap();
    assert_eq!(f.pixel(0, 0), Some([255, 0, 0, 255]));
    assert_eq!(f.pixel(1, 1), Some([0, 0, 255, 255]));
    assert_eq!(f.pixel(2, 2), Some([0, 0, 255, 255]));
    assert_eq!(f.pixel(3, 3), Some([255, 0, 0, 255]));
}

#[test]
fn translucent_layer_blends_over() {
    let mut t = timeline();
    t.add_clip(clip("bg", Rgba8Premul::opaque(0, 0, 200), 0)).unwrap();
    t.add_clip(clip(
        "fg",
        Rgba8Premul::from_straight_rgba(200, 0, 0, 128),
        1,
    ))
    .unwrap();
    t.open().unwrap();
    let px = t.get_frame(1).unwrap().pixel(0, 0).unwrap();
    assert_eq!(px[3], 255);
    assert!((99..=101).contains(&px[0]), "{px:?}");
    assert!((98..=100).contains(&px[2]), "{px:?}");
}

fn tone_clip(id: &str, mixing: VolumeMix) -> Clip {
    let mut c = Clip::new(Box::new(
        dummy(Rgba8Premul::opaque(1, 1, 1), 2.0).with_tone(330.0),
    ))
    .unwrap()
    .with_id(id);
    c.props.mixing = mixing;
    c
}

fn mixed_channel(mixing: VolumeMix, clips: usize) -> Vec<f32> {
    let mut t = timeline();
    for i in 0..clips {
        t.add_clip(tone_clip(&format!("c{i}"), mixing)).unwrap();
    }
    t.open().unwrap();
    t.get_frame(4).unwrap().audio().unwrap().channels[0].clone()
}

#[test]
fn audio_mixing_policies() {
    let single = mixed_channel(VolumeMix::None, 1);
    assert!(single.iter().any(|s| s.abs() > 0.1));

    let summed = mixed_channel(VolumeMix::None, 2);
    let averaged = mixed_channel(VolumeMix::Average, 2);
    let reduced = mixed_channel(VolumeMix::Reduce, 2);
    let reduced_alone = mixed_channel(VolumeMix::Reduce, 1);
    for i in 0..single.len() {
        assert!((summed[i] - 2.0 * single[i]).abs() < 1e-6);
        assert!((averaged[i] - single[i]).abs() < 1e-6);
        assert!((reduced[i] - 2.0 * 0.77 * single[i]).abs() < 1e-5);
        assert!((reduced_alone[i] - single[i]).abs() < 1e-6);
    }
}

#[test]
fn muted_clips_do_not_count_for_average() {
    let mut t = timeline();
    t.add_clip(tone_clip("a", VolumeMix::Average)).unwrap();
    let mut muted = tone_clip("b", VolumeMix::Average);
    muted.keyframes.has_audio = Keyframe::with_value(0.0);
    t.add_clip(muted).unwrap();
    t.open().unwrap();
    let mixed = t.get_frame(4).unwrap().audio().unwrap().channels[0].clone();
    assert_eq!(mixed, mixed_channel(VolumeMix::None, 1));
}

#[test]
fn timeline_effects_apply_within_their_span() {
    let mut t = timeline();
    t.add_clip(clip("c", Rgba8Premul::opaque(200, 100, 50), 0)).unwrap();
    t.add_effect(Box::new(Negate::with_base(EffectBase::covering(
        "neg", 0, 0.0, 1.0,
    ))));
    t.open().unwrap();
    assert_eq!(t.get_frame(30).unwrap().pixel(0, 0), Some([55, 155, 205, 255]));
    assert_eq!(t.get_frame(31).unwrap().pixel(0, 0), Some([200, 100, 50, 255]));
    assert!(t.effect("neg").is_some());
    assert!(t.remove_effect("neg").is_some());
    assert_eq!(t.effects().count(), 0);
}

#[test]
fn cached_frames_are_shared_until_cleared() {
    let mut t = timeline();
    t.add_clip(clip("c", Rgba8Premul::opaque(9, 8, 7), 0)).unwrap();
    t.open().unwrap();
    let a = t.get_frame(3).unwrap();
    let b = t.get_frame(3).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(t.cache().count(), 1);

    t.clear_cache().unwrap();
    assert_eq!(t.cache().count(), 0);
    let c = t.get_frame(3).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(a.fingerprint(), c.fingerprint());
}

#[test]
fn edits_need_explicit_cache_clear() {
    let mut t = timeline();
    t.add_clip(clip("c", Rgba8Premul::opaque(9, 8, 7), 0)).unwrap();
    t.open().unwrap();
    let before = t.get_frame(2).unwrap();
    t.clip_mut("c").unwrap().keyframes.alpha = Keyframe::with_value(0.0);
    assert!(Arc::ptr_eq(&before, &t.get_frame(2).unwrap()));
    t.clear_cache().unwrap();
    assert!(t.get_frame(2).unwrap().image().unwrap().iter().all(|b| *b == 0));
}

#[test]
fn added_clips_open_with_timeline() {
    let mut t = timeline();
    t.open().unwrap();
    t.add_clip(clip("c", Rgba8Premul::opaque(1, 2, 3), 0)).unwrap();
    assert!(t.clip("c").unwrap().is_open());
    t.close();
    assert!(!t.clip("c").unwrap().is_open());
    assert!(t.remove_clip("c").is_some());
    assert!(t.clip("c").is_none());
}

#[test]
fn reconfigure_only_while_closed() {
    let mut t = timeline();
    t.open().unwrap();
    let wide = TimelineInfo::new(8, 4, fps(), 44_100, ChannelLayout::Mono);
    assert!(matches!(t.reconfigure(wide), Err(MontageError::Validation(_))));
    t.close();
    t.reconfigure(wide).unwrap();
    t.open().unwrap();
    let f = t.get_frame(1).unwrap();
    assert_eq!((f.width(), f.height()), (8, 4));
    assert_eq!(f.audio().unwrap().sample_count(), 1470);
}

#[test]
fn viewport_moves_canvas_anchored_clips_only() {
    let mut small = clip("c", Rgba8Premul::opaque(0, 0, 255), 0);
    small.keyframes.scale_x = Keyframe::with_value(0.5);
    small.keyframes.scale_y = Keyframe::with_value(0.5);

    let mut t = timeline();
    t.add_clip(small).unwrap();
    t.set_viewport(
        Keyframe::with_value(2.0),
        Keyframe::with_value(0.0),
        Keyframe::with_value(0.0),
    );
    t.open().unwrap();
    assert_eq!(t.get_frame(1).unwrap().pixel(0, 0), Some([0, 0, 255, 255]));

    t.clip_mut("c").unwrap().props.anchor = AnchorMode::Viewport;
    t.clear_cache().unwrap();
    assert_eq!(t.get_frame(1).unwrap().pixel(0, 0), Some([0; 4]));
}

#[test]
fn acts_as_reader_for_writers() {
    let mut t = timeline();
    t.add_clip(clip("c", Rgba8Premul::opaque(1, 2, 3), 0)).unwrap();
    assert_eq!(Reader::info(&t).video_length, 60);
    assert_eq!(Reader::info(&t).duration, 2.0);
    Reader::open(&t).unwrap();

    let mut w = InMemoryWriter::new();
    w.open(crate::writer::WriterConfig::from_reader(&t)).unwrap();
    w.write_reader_range(&t, 1, 5).unwrap();
    assert_eq!(w.numbers(), vec![1, 2, 3, 4, 5]);
    assert_eq!(t.json_value()["type"], "Timeline");
}

#[test]
fn json_round_trip_renders_identically() {
    let readers = ReaderRegistry::with_builtins();
    let effects = EffectRegistry::with_builtins();

    let mut t = timeline();
    let mut a = clip("a", Rgba8Premul::opaque(255, 0, 0), 0);
    let mut x = Keyframe::new();
    x.add_xy(1.0, -0.5, InterpolationType::Linear);
    x.add_xy(30.0, 0.5, InterpolationType::Bezier);
    a.keyframes.location_x = x;
    t.add_clip(a).unwrap();
    t.add_clip(tone_clip("b", VolumeMix::Average).placed(0.5, 1)).unwrap();
    t.add_effect(Box::new(Negate::with_base(EffectBase::covering(
        "neg", 0, 1.0, 0.5,
    ))));

    let doc = t.to_json_value().to_string();
    let restored = Timeline::from_json_str(&doc, Settings::default(), &readers, &effects).unwrap();
    assert_eq!(restored.clips().count(), 2);
    assert_eq!(restored.max_frame(), t.max_frame());

    t.open().unwrap();
    restored.open().unwrap();
    for n in [1, 10, 16, 31, 40, 60] {
        assert_eq!(
            t.get_frame(n).unwrap().fingerprint(),
            restored.get_frame(n).unwrap().fingerprint(),
            "frame {n}"
        );
    }
}

#[test]
fn malformed_documents_name_the_operation() {
    let readers = ReaderRegistry::with_builtins();
    let effects = EffectRegistry::with_builtins();
    for doc in ["{", r#"{"width": 4}"#] {
        match Timeline::from_json_str(doc, Settings::default(), &readers, &effects) {
            Err(MontageError::InvalidJson { context, .. }) => {
                assert_eq!(context, "Timeline::from_json")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
    let mut t = timeline();
    let bad = t.apply_json_value(&serde_json::json!({"clips": 3}), &readers, &effects);
    assert!(matches!(bad, Err(MontageError::InvalidJson { .. })));
}

#[test]
fn concurrent_requests_compute_each_frame_once() {
    let reads = Arc::new(AtomicUsize::new(0));
    let reader = CountingReader {
        inner: dummy(Rgba8Premul::opaque(5, 6, 7), 2.0),
        reads: Arc::clone(&reads),
    };
    let mut t = timeline();
    t.add_clip(Clip::new(Box::new(reader)).unwrap()).unwrap();
    t.open().unwrap();

    let frames: Vec<Arc<Frame>> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| t.get_frame(5).unwrap())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert!(frames.iter().all(|f| Arc::ptr_eq(f, &frames[0])));
}

#[test]
fn parallel_requests_match_sequential() {
    let build = || {
        let mut t = timeline();
        t.add_clip(clip("a", Rgba8Premul::opaque(255, 0, 0), 0)).unwrap();
        t.add_clip(tone_clip("b", VolumeMix::Reduce).placed(0.2, 1)).unwrap();
        t.open().unwrap();
        t
    };
    let sequential = build();
    let expected: Vec<u64> = (1..=40)
        .map(|n| sequential.get_frame(n).unwrap().fingerprint())
        .collect();

    let shared = build();
    let got: Vec<u64> = std::thread::scope(|s| {
        let handles: Vec<_> = (1..=40u64)
            .rev()
            .map(|n| {
                let t = &shared;
                s.spawn(move || (n, t.get_frame(n).unwrap().fingerprint()))
            })
            .collect();
        let mut out: Vec<(u64, u64)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        out.sort();
        out.into_iter().map(|(_, fp)| fp).collect()
    });
    assert_eq!(got, expected);
}
