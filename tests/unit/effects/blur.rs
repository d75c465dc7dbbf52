use super::*;
use crate::foundation::core::Rgba8Premul;

fn blur(h: f64, v: f64, sigma: f64, iterations: f64) -> Blur {
    Blur::new(
        Keyframe::with_value(h),
        Keyframe::with_value(v),
        Keyframe::with_value(sigma),
        Keyframe::with_value(iterations),
    )
}

fn dot_frame(w: u32, h: u32) -> Arc<Frame> {
    let mut data = vec![0u8; (w * h * 4) as usize];
    let center = (((h / 2) * w + w / 2) * 4) as usize;
    data[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);
    Arc::new(Frame::with_image(1, w, h, data).unwrap())
}

#[test]
fn kernel_sums_to_one_in_q16() {
    for (radius, sigma) in [(1, 0.5), (3, 2.0), (6, 3.0), (10, 1.0)] {
        let k = gaussian_kernel_q16(radius, sigma).unwrap();
        assert_eq!(k.len(), (2 * radius + 1) as usize);
        assert_eq!(k.iter().map(|&w| u64::from(w)).sum::<u64>(), 65536);
    }
}

#[test]
fn zero_radius_returns_the_input() {
    let frame = dot_frame(5, 5);
    let out = blur(0.0, 0.0, 1.0, 3.0).get_frame(Arc::clone(&frame), 1).unwrap();
    assert!(Arc::ptr_eq(&frame, &out));
}

#[test]
fn zero_iterations_returns_the_input() {
    let frame = dot_frame(5, 5);
    let out = blur(2.0, 2.0, 1.0, 0.0).get_frame(Arc::clone(&frame), 1).unwrap();
    assert!(Arc::ptr_eq(&frame, &out));
}

#[test]
fn constant_image_is_unchanged() {
    let frame = Arc::new(Frame::solid(1, 6, 4, Rgba8Premul::opaque(10, 20, 30)));
    let out = Blur::default().get_frame(Arc::clone(&frame), 1).unwrap();
    assert_eq!(out.image(), frame.image());
}

#[test]
fn single_pixel_spreads_its_energy() {
    let out = blur(2.0, 2.0, 1.2, 1.0).get_frame(dot_frame(5, 5), 1).unwrap();
    let img = out.image().unwrap();
    let nonzero = img.chunks_exact(4).filter(|px| px[3] != 0).count();
    assert!(nonzero > 1);
    let sum_a: u32 = img.chunks_exact(4).map(|px| u32::from(px[3])).sum();
    assert!((sum_a as i32 - 255).abs() <= 4);
}

#[test]
fn horizontal_only_blur_stays_on_its_row() {
    let out = blur(2.0, 0.0, 1.0, 1.0).get_frame(dot_frame(5, 5), 1).unwrap();
    for y in 0..5 {
        for x in 0..5 {
            let a = out.pixel(x, y).unwrap()[3];
            if y != 2 {
                assert_eq!(a, 0, "pixel ({x}, {y}) should be untouched");
            }
        }
    }
    assert!(out.pixel(1, 2).unwrap()[3] > 0);
}

#[test]
fn non_positive_sigma_is_rejected() {
    let err = blur(2.0, 2.0, 0.0, 1.0).get_frame(dot_frame(5, 5), 1).unwrap_err();
    assert!(matches!(err, MontageError::Validation(_)));
}

#[test]
fn input_frame_is_not_mutated() {
    let frame = dot_frame(5, 5);
    let _ = Blur::default().get_frame(Arc::clone(&frame), 1).unwrap();
    assert_eq!(frame.pixel(2, 2), Some([255, 255, 255, 255]));
    assert_eq!(frame.pixel(1, 2), Some([0, 0, 0, 0]));
}

#[test]
fn animated_radius_is_resolved_per_frame() {
    let mut radius = Keyframe::new();
    radius.add_xy(1.0, 0.0, crate::animation::point::InterpolationType::Linear);
    radius.add_xy(11.0, 2.0, crate::animation::point::InterpolationType::Linear);
    let effect = Blur::new(
        radius.clone(),
        radius,
        Keyframe::with_value(1.0),
        Keyframe::with_value(1.0),
    );

    let frame = dot_frame(5, 5);
    let still = effect.get_frame(Arc::clone(&frame), 1).unwrap();
    assert!(Arc::ptr_eq(&frame, &still));
    let spread = effect.get_frame(frame, 11).unwrap();
    assert!(spread.pixel(2, 1).unwrap()[3] > 0);
    assert!(spread.pixel(2, 2).unwrap()[3] < 255);
}
