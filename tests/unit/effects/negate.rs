use super::*;
use crate::foundation::core::{ChannelLayout, Rgba8Premul};

#[test]
fn inverts_colour_and_keeps_alpha() {
    let frame = Arc::new(Frame::solid(1, 2, 2, Rgba8Premul::opaque(200, 100, 0)));
    let out = Negate::new().get_frame(frame, 1).unwrap();
    assert_eq!(out.pixel(1, 1), Some([55, 155, 255, 255]));
}

#[test]
fn stays_premultiplied_for_translucent_pixels() {
    let frame = Arc::new(Frame::with_image(1, 1, 1, vec![100, 50, 0, 128]).unwrap());
    let out = Negate::new().get_frame(frame, 1).unwrap();
    assert_eq!(out.pixel(0, 0), Some([28, 78, 128, 128]));
}

#[test]
fn shared_input_is_left_untouched() {
    let frame = Arc::new(Frame::solid(1, 2, 2, Rgba8Premul::opaque(10, 10, 10)));
    let out = Negate::new().get_frame(Arc::clone(&frame), 1).unwrap();
    assert_eq!(frame.pixel(0, 0), Some([10, 10, 10, 255]));
    assert_eq!(out.pixel(0, 0), Some([245, 245, 245, 255]));
}

#[test]
fn frames_without_image_pass_through() {
    let mut frame = Frame::metadata_only(1, 4, 4);
    frame.set_audio(Some(crate::frame::audio::AudioBuffer::silent(
        48_000,
        ChannelLayout::Stereo,
        10,
    )));
    let frame = Arc::new(frame);
    let out = Negate::new().get_frame(Arc::clone(&frame), 1).unwrap();
    assert!(Arc::ptr_eq(&frame, &out));
}
