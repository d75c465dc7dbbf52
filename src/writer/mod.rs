//! Frame consumers.
//!
//! Writers receive frames in the order they are pushed; the core never inspects what a writer
//! does with them. Encoding parameters in [`WriterConfig`] are advisory for writers that do not
//! encode.

use std::sync::Arc;

use crate::foundation::core::{ChannelLayout, Fraction};
use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::frame::Frame;
use crate::reader::Reader;

/// Collects frames in memory.
pub mod memory;
/// Writes one PNG per frame.
pub mod sequence;

/// Output target descriptor handed to [`Writer::open`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Output frame rate.
    pub fps: Fraction,
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Output channel count.
    pub channels: u16,
    /// Output channel layout.
    pub channel_layout: ChannelLayout,
    /// Video bit rate in bits per second (`0` = writer default).
    pub video_bit_rate: u64,
    /// Audio bit rate in bits per second (`0` = writer default).
    pub audio_bit_rate: u64,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: Fraction::new(30, 1),
            sample_rate: 48_000,
            channels: 2,
            channel_layout: ChannelLayout::Stereo,
            video_bit_rate: 0,
            audio_bit_rate: 0,
        }
    }
}

impl WriterConfig {
    /// Output descriptor matching a reader's stream.
    pub fn from_reader(reader: &dyn Reader) -> Self {
        let info = reader.info();
        Self {
            width: info.width,
            height: info.height,
            fps: info.fps,
            sample_rate: info.sample_rate,
            channels: info.channels,
            channel_layout: info.channel_layout,
            ..Self::default()
        }
    }

    /// Reject configurations no writer can honour.
    pub fn validate(&self) -> MontageResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(MontageError::validation("writer width/height must be non-zero"));
        }
        self.fps.validate_rate("writer fps")
    }
}

/// Sink contract for consuming frames.
///
/// Ordering contract: frames arrive in the order `write_frame` is called; range helpers push
/// them in ascending frame number.
pub trait Writer: Send + std::fmt::Debug {
    /// Prepare the output target.
    fn open(&mut self, config: WriterConfig) -> MontageResult<()>;
    /// `true` between `open` and `close`.
    fn is_open(&self) -> bool;
    /// Consume one frame.
    fn write_frame(&mut self, frame: &Arc<Frame>) -> MontageResult<()>;
    /// Flush and release the output target; idempotent.
    fn close(&mut self) -> MontageResult<()>;

    /// Pull frames `start..=end` from `reader` and write them in order.
    fn write_reader_range(
        &mut self,
        reader: &dyn Reader,
        start: u64,
        end: u64,
    ) -> MontageResult<()> {
        if start > end {
            return Err(MontageError::validation(format!(
                "write range {start}..={end} is empty"
            )));
        }
        for n in start..=end {
            let frame = reader.get_frame(n)?;
            self.write_frame(&frame)?;
        }
        Ok(())
    }
}

pub(crate) fn ensure_writer_open(open: bool, what: &str) -> MontageResult<()> {
    if open {
        Ok(())
    } else {
        Err(MontageError::validation(format!(
            "{what} must be opened before writing frames"
        )))
    }
}
