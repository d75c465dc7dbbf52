//! Frame sources consumed by clips, the frame mapper and writers.
//!
//! A [`Reader`] is a capability interface: clips and the timeline only ever call through it, so
//! new source kinds plug in by implementing the trait and registering a factory with
//! [`ReaderRegistry`].

use std::sync::Arc;

use crate::foundation::core::{ChannelLayout, Fraction};
use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::frame::Frame;

/// Solid-colour test source with an optional sine tone.
pub mod dummy;
/// `type` name to factory registry.
pub mod registry;
/// Still-image source decoded with the `image` crate.
pub mod still;

/// Read-only stream descriptor published by every reader.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ReaderInfo {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Native frame rate.
    pub fps: Fraction,
    /// Audio sample rate in Hz.
    pub sample_rate: u32,
    /// Audio channel count.
    pub channels: u16,
    /// Audio channel layout.
    pub channel_layout: ChannelLayout,
    /// Stream duration in seconds.
    pub duration: f64,
    /// Number of frames (`1..=video_length` are valid).
    pub video_length: u64,
    /// Stream carries images.
    pub has_video: bool,
    /// Stream carries audio.
    pub has_audio: bool,
    /// Every frame repeats the same still image.
    pub has_single_image: bool,
}

impl Default for ReaderInfo {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            fps: Fraction::new(30, 1),
            sample_rate: 48_000,
            channels: 2,
            channel_layout: ChannelLayout::Stereo,
            duration: 0.0,
            video_length: 0,
            has_video: false,
            has_audio: false,
            has_single_image: false,
        }
    }
}

impl ReaderInfo {
    /// Video-and-audio descriptor; `video_length` is derived from `duration * fps`.
    pub fn new(
        width: u32,
        height: u32,
        fps: Fraction,
        sample_rate: u32,
        channel_layout: ChannelLayout,
        duration: f64,
    ) -> Self {
        Self {
            width,
            height,
            fps,
            sample_rate,
            channels: channel_layout.channel_count(),
            channel_layout,
            duration,
            video_length: frames_in(duration, fps),
            has_video: true,
            has_audio: true,
            has_single_image: false,
        }
    }

    /// Derive `video_length` from `duration * fps` when a descriptor left it out.
    pub fn fill_video_length(&mut self) {
        if self.video_length == 0 {
            self.video_length = frames_in(self.duration, self.fps);
        }
    }

    /// Check `number` against `1..=video_length`.
    pub fn check_frame(&self, number: u64) -> MontageResult<()> {
        if number < 1 || number > self.video_length {
            return Err(MontageError::out_of_bounds_frame(number, self.video_length));
        }
        Ok(())
    }

    /// Reject descriptors that cannot drive frame or sample arithmetic.
    pub fn validate(&self) -> MontageResult<()> {
        self.fps.validate_rate("reader fps")?;
        if self.has_audio {
            if self.sample_rate == 0 {
                return Err(MontageError::validation("reader sample_rate must be > 0"));
            }
            if self.channels != self.channel_layout.channel_count() {
                return Err(MontageError::validation(format!(
                    "reader declares {} channels but layout {:?} has {}",
                    self.channels,
                    self.channel_layout,
                    self.channel_layout.channel_count()
                )));
            }
        }
        Ok(())
    }
}

/// Whole frames covered by `duration` seconds at `fps` (rounded).
pub(crate) fn frames_in(duration: f64, fps: Fraction) -> u64 {
    let frames = (duration * fps.to_f64()).round();
    if frames.is_finite() && frames > 0.0 {
        frames as u64
    } else {
        0
    }
}

/// Source of frames addressed by 1-based frame number.
///
/// `open`/`close` take `&self` so a reader can be shared between worker threads; implementations
/// track their state with atomics or locks. `get_frame` on a closed reader fails with
/// [`MontageError::ReaderClosed`]; it never opens implicitly.
pub trait Reader: Send + Sync + std::fmt::Debug {
    /// Stream descriptor.
    fn info(&self) -> &ReaderInfo;
    /// Acquire the backing resource.
    fn open(&self) -> MontageResult<()>;
    /// Release the backing resource; idempotent.
    fn close(&self);
    /// `true` between `open` and `close`.
    fn is_open(&self) -> bool;
    /// Produce frame `number` (`1..=info().video_length`).
    fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>>;

    /// `false` when concurrent `get_frame` calls must be serialised by the caller.
    fn supports_concurrent_reads(&self) -> bool {
        true
    }

    /// Descriptor that [`ReaderRegistry::create`](registry::ReaderRegistry::create) can rebuild
    /// the reader from. Must carry a `"type"` key.
    fn json_value(&self) -> serde_json::Value;
}

pub(crate) fn ensure_open(reader: &dyn Reader, what: &str) -> MontageResult<()> {
    if reader.is_open() {
        Ok(())
    } else {
        Err(MontageError::reader_closed(format!(
            "{what} must be opened before requesting frames"
        )))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reader/info.rs"]
mod tests;
