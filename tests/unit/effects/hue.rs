use super::*;
use crate::foundation::core::Rgba8Premul;

fn solid(r: u8, g: u8, b: u8) -> Arc<Frame> {
    Arc::new(Frame::solid(1, 2, 2, Rgba8Premul::opaque(r, g, b)))
}

#[test]
fn whole_turns_return_the_input() {
    for turns in [0.0, 1.0, -2.0] {
        let frame = solid(200, 10, 10);
        let out = Hue::new(Keyframe::with_value(turns))
            .get_frame(Arc::clone(&frame), 1)
            .unwrap();
        assert!(Arc::ptr_eq(&frame, &out), "{turns}");
    }
}

#[test]
fn a_third_of_a_turn_cycles_the_primaries() {
    let effect = Hue::new(Keyframe::with_value(1.0 / 3.0));
    let red = effect.get_frame(solid(255, 0, 0), 1).unwrap();
    assert_eq!(red.pixel(0, 0), Some([0, 255, 0, 255]));
    let green = effect.get_frame(solid(0, 255, 0), 1).unwrap();
    assert_eq!(green.pixel(0, 0), Some([0, 0, 255, 255]));
}

#[test]
fn grey_survives_any_rotation() {
    let out = Hue::new(Keyframe::with_value(0.37))
        .get_frame(solid(120, 120, 120), 1)
        .unwrap();
    for c in &out.pixel(1, 1).unwrap()[..3] {
        assert!((i32::from(*c) - 120).abs() <= 1, "{c}");
    }
}

#[test]
fn rotation_rows_sum_to_one() {
    let m = rotation(0.2);
    for row in m {
        assert!((row.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }
}
