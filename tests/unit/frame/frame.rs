use super::*;
use crate::foundation::core::ChannelLayout;
use std::sync::Arc;

#[test]
fn metadata_only_frames_have_no_payload() {
    let f = Frame::metadata_only(3, 4, 2);
    assert!(!f.has_image_data());
    assert!(!f.has_audio_data());
    assert_eq!(f.bytes(), 0);
    assert_eq!(f.pixel(0, 0), None);
}

#[test]
fn image_mut_materializes_transparent_buffer() {
    let mut f = Frame::metadata_only(1, 2, 2);
    f.image_mut()[0] = 9;
    assert!(f.has_image_data());
    assert_eq!(f.pixel(0, 0), Some([9, 0, 0, 0]));
    assert_eq!(f.pixel(1, 1), Some([0, 0, 0, 0]));
    assert_eq!(f.pixel(2, 0), None);
}

#[test]
fn bytes_count_image_and_audio() {
    let mut f = Frame::solid(1, 4, 4, Rgba8Premul::opaque(1, 2, 3));
    f.set_audio(Some(AudioBuffer::silent(48_000, ChannelLayout::Stereo, 100)));
    assert_eq!(f.bytes(), 4 * 4 * 4 + 100 * 2 * 4);
}

#[test]
fn set_image_validates_length() {
    let mut f = Frame::metadata_only(1, 2, 2);
    assert!(f.set_image(2, 2, vec![0; 15]).is_err());
    assert!(Frame::with_image(1, 1, 1, vec![1, 2, 3, 4]).is_ok());
}

#[test]
fn fingerprint_ignores_number_but_sees_payload() {
    let a = Frame::solid(1, 3, 3, Rgba8Premul::opaque(10, 20, 30));
    let b = a.clone().with_number(99);
    assert_eq!(a.fingerprint(), b.fingerprint());

    let mut c = a.clone();
    c.image_mut()[5] = 0;
    assert_ne!(a.fingerprint(), c.fingerprint());

    let mut d = a.clone();
    d.set_audio(Some(AudioBuffer::silent(48_000, ChannelLayout::Mono, 4)));
    assert_ne!(a.fingerprint(), d.fingerprint());
}

#[test]
fn shared_frames_are_copied_before_mutation() {
    let shared = Arc::new(Frame::solid(1, 1, 1, Rgba8Premul::opaque(5, 5, 5)));
    let keep = Arc::clone(&shared);

    let mut owned = Arc::unwrap_or_clone(shared);
    owned.image_mut()[0] = 200;

    assert_eq!(keep.pixel(0, 0), Some([5, 5, 5, 255]));
    assert_eq!(owned.pixel(0, 0), Some([200, 5, 5, 255]));
}

#[test]
fn blank_with_audio_is_transparent_and_silent() {
    let f = Frame::blank_with_audio(4, 2, 2, 44_100, ChannelLayout::Surround, 10);
    assert_eq!(f.pixel(1, 1), Some([0, 0, 0, 0]));
    let audio = f.audio().unwrap();
    assert_eq!(audio.channel_count(), 3);
    assert_eq!(audio.sample_count(), 10);
    assert!(audio.channels.iter().flatten().all(|s| *s == 0.0));
}

#[test]
fn straight_alpha_export() {
    let f = Frame::with_image(1, 1, 1, vec![100, 50, 0, 128]).unwrap();
    assert_eq!(f.to_straight_rgba(), Some(vec![199, 100, 0, 128]));
    assert_eq!(Frame::metadata_only(1, 1, 1).to_straight_rgba(), None);
}
