use super::*;
use crate::foundation::core::Rgba8Premul;

fn white_frame() -> Arc<Frame> {
    Arc::new(Frame::solid(1, 10, 10, Rgba8Premul::opaque(255, 255, 255)))
}

#[test]
fn default_bars_letterbox_in_black() {
    let out = Bars::default().get_frame(white_frame(), 1).unwrap();
    assert_eq!(out.pixel(5, 0), Some([0, 0, 0, 255]));
    assert_eq!(out.pixel(5, 9), Some([0, 0, 0, 255]));
    assert_eq!(out.pixel(0, 5), Some([255, 255, 255, 255]));
    assert_eq!(out.pixel(9, 5), Some([255, 255, 255, 255]));
}

#[test]
fn translucent_colour_is_premultiplied() {
    let bars = Bars::new(
        ColorKeyframe::new(255, 0, 0, 128),
        Keyframe::with_value(0.2),
        Keyframe::with_value(0.0),
        Keyframe::with_value(0.0),
        Keyframe::with_value(0.0),
    );
    let out = bars.get_frame(white_frame(), 1).unwrap();
    assert_eq!(out.pixel(1, 4), Some([128, 0, 0, 128]));
    assert_eq!(out.pixel(2, 4), Some([255, 255, 255, 255]));
}

#[test]
fn json_round_trip_preserves_output() {
    let mut bars = Bars::new(
        ColorKeyframe::new(10, 20, 30, 255),
        Keyframe::with_value(0.1),
        Keyframe::with_value(0.2),
        Keyframe::with_value(0.3),
        Keyframe::with_value(0.0),
    );
    bars.base_mut().id = "bars-1".to_owned();

    let mut reloaded = Bars::default();
    reloaded.apply_json_value(&bars.json_value()).unwrap();
    assert_eq!(reloaded.params, bars.params);
    assert_eq!(reloaded.base(), bars.base());

    let a = bars.get_frame(white_frame(), 1).unwrap();
    let b = reloaded.get_frame(white_frame(), 1).unwrap();
    assert_eq!(a.fingerprint(), b.fingerprint());
}
