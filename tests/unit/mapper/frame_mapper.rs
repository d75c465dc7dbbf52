use super::*;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::foundation::core::{ChannelLayout, Fraction, Rgba8Premul};
use crate::frame::audio::first_sample_of_frame;
use crate::mapper::PulldownMode;

/// Frame `n` is filled with grey level `n`; audio sample `i` of the stream has value `i`.
#[derive(Debug)]
struct NumberedReader {
    info: ReaderInfo,
    open: AtomicBool,
}

impl NumberedReader {
    fn new(fps: i32, frames: u64) -> Self {
        let fps = Fraction::new(fps, 1);
        let mut info = ReaderInfo::new(2, 4, fps, 48_000, ChannelLayout::Stereo, 0.0);
        info.video_length = frames;
        info.duration = frames as f64 / fps.to_f64();
        Self {
            info,
            open: AtomicBool::new(true),
        }
    }
}

impl Reader for NumberedReader {
    fn info(&self) -> &ReaderInfo {
        &self.info
    }
    fn open(&self) -> MontageResult<()> {
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }
    fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }
    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
    fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>> {
        crate::reader::ensure_open(self, "NumberedReader")?;
        self.info.check_frame(number)?;
        let i = &self.info;
        let shade = number as u8;
        let mut frame = Frame::solid(number, i.width, i.height, Rgba8Premul::opaque(shade, shade, shade));
        let first = first_sample_of_frame(number, i.fps, i.sample_rate, i.channels);
        let count = samples_per_frame(number, i.fps, i.sample_rate, i.channels);
        let ramp: Vec<f32> = (0..count as u64).map(|k| (first + k) as f32).collect();
        frame.set_audio(Some(
            AudioBuffer::from_channels(i.sample_rate, i.channel_layout, vec![ramp.clone(), ramp])
                .unwrap(),
        ));
        Ok(Arc::new(frame))
    }
    fn json_value(&self) -> serde_json::Value {
        serde_json::json!({"type": "NumberedReader"})
    }
}

fn target(fps: i32, mode: PulldownMode) -> MapperTarget {
    MapperTarget::new(Fraction::new(fps, 1), mode, 48_000, ChannelLayout::Stereo)
}

#[test]
fn identical_formats_pass_frames_through() {
    let reader = NumberedReader::new(30, 10);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    assert_eq!(mapper.len(), 10);
    let mapped = mapper.get_frame(&reader, 7).unwrap();
    let direct = reader.get_frame(7).unwrap();
    assert_eq!(mapped.fingerprint(), direct.fingerprint());
    assert_eq!(mapped.number, 7);
}

#[test]
fn first_and_last_frames_are_the_bounds() {
    let reader = NumberedReader::new(24, 100);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    assert!(mapper.get_mapped_frame(1).is_ok());
    assert!(mapper.get_mapped_frame(125).is_ok());
    assert!(matches!(
        mapper.get_mapped_frame(0),
        Err(MontageError::OutOfBoundsFrame { requested: 0, max: 125 })
    ));
    assert!(matches!(
        mapper.get_mapped_frame(126),
        Err(MontageError::OutOfBoundsFrame { requested: 126, max: 125 })
    ));
    assert!(mapper.get_frame(&reader, 0).is_err());
}

#[test]
fn mixed_field_frames_are_interlaced() {
    let reader = NumberedReader::new(24, 100);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    let m = mapper.get_mapped_frame(3).unwrap();
    assert_eq!((m.odd.frame, m.even.frame), (2, 3));

    let f = mapper.get_frame(&reader, 3).unwrap();
    assert_eq!(f.number, 3);
    assert_eq!(f.pixel(0, 0), Some([2, 2, 2, 255]));
    assert_eq!(f.pixel(1, 1), Some([3, 3, 3, 255]));
    assert_eq!(f.pixel(0, 2), Some([2, 2, 2, 255]));
    assert_eq!(f.pixel(0, 3), Some([3, 3, 3, 255]));
}

#[test]
fn audio_is_redistributed_across_source_frames() {
    let reader = NumberedReader::new(24, 100);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    let f = mapper.get_frame(&reader, 2).unwrap();
    let audio = f.audio().unwrap();
    assert_eq!(audio.sample_count(), 1600);
    let left = &audio.channels[0];
    assert!(left.iter().enumerate().all(|(k, s)| *s == (1600 + k) as f32));
}

#[test]
fn audio_is_resampled_and_remixed_to_the_target() {
    let reader = NumberedReader::new(30, 10);
    let t = MapperTarget::new(Fraction::new(30, 1), PulldownMode::None, 24_000, ChannelLayout::Mono);
    let mapper = FrameMapper::new(reader.info.clone(), t).unwrap();
    let f = mapper.get_frame(&reader, 1).unwrap();
    let audio = f.audio().unwrap();
    assert_eq!(audio.sample_rate, 24_000);
    assert_eq!(audio.layout, ChannelLayout::Mono);
    assert_eq!(audio.sample_count(), 800);
    assert_eq!(audio.channels[0][0], 0.0);
    assert_eq!(audio.channels[0][1], 2.0);
    assert_eq!(audio.channels[0][10], 20.0);
}

#[test]
fn change_mapping_rebuilds_on_next_query() {
    let reader = NumberedReader::new(24, 100);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    assert_eq!(mapper.len(), 125);
    mapper.get_frame(&reader, 5).unwrap();

    mapper.change_mapping(target(24, PulldownMode::None)).unwrap();
    assert_eq!(mapper.target().fps, Fraction::new(24, 1));
    assert_eq!(mapper.len(), 100);
    let f = mapper.get_frame(&reader, 5).unwrap();
    assert_eq!(f.pixel(0, 0), Some([5, 5, 5, 255]));
    assert!(mapper.get_mapped_frame(101).is_err());
}

#[test]
fn invalid_targets_are_rejected() {
    let reader = NumberedReader::new(24, 10);
    let mut t = target(30, PulldownMode::Classic);
    t.fps = Fraction::new(30, 0);
    assert!(FrameMapper::new(reader.info.clone(), t).is_err());
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    t.fps = Fraction::new(30, 1);
    t.channels = 5;
    assert!(mapper.change_mapping(t).is_err());
    assert_eq!(mapper.target().channels, 2);
}

#[test]
fn reader_errors_propagate() {
    let reader = NumberedReader::new(30, 10);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    reader.close();
    assert!(matches!(
        mapper.get_frame(&reader, 1),
        Err(MontageError::ReaderClosed(_))
    ));
}

#[test]
fn mapping_lines_describe_every_frame() {
    let reader = NumberedReader::new(24, 4);
    let mapper = FrameMapper::new(reader.info.clone(), target(30, PulldownMode::Classic)).unwrap();
    let lines = mapper.mapping_lines();
    assert_eq!(lines.len() as u64, mapper.len());
    assert!(lines[2].contains("odd     2 even     3"), "{}", lines[2]);
}
