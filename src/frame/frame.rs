use xxhash_rust::xxh3::Xxh3;

use crate::foundation::core::{ChannelLayout, Rgba8Premul};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::unpremultiply;
use crate::frame::audio::AudioBuffer;

const FINGERPRINT_SEED: u64 = 0x6d6f_6e74_6167_6531;

/// One image-plus-audio unit flowing through readers, clips, effects and the timeline.
///
/// `number` is the frame's position in its producer's stream, not necessarily the timeline
/// position. Images are premultiplied RGBA8, row-major, `width * height * 4` bytes. Either
/// payload may be absent (metadata-only frames).
///
/// A `Frame` value is owned exclusively; frames are shared as `Arc<Frame>` and mutated only
/// after `Arc::unwrap_or_clone`, which copies when another owner still holds the frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Position in the producing stream (1-based).
    pub number: u64,
    width: u32,
    height: u32,
    image: Option<Vec<u8>>,
    audio: Option<AudioBuffer>,
}

impl Frame {
    /// Frame with dimensions but no image or audio payload.
    pub fn metadata_only(number: u64, width: u32, height: u32) -> Self {
        Self {
            number,
            width,
            height,
            image: None,
            audio: None,
        }
    }

    /// Fully transparent image, no audio.
    pub fn transparent(number: u64, width: u32, height: u32) -> Self {
        Self::solid(number, width, height, Rgba8Premul::transparent())
    }

    /// Image filled with one color, no audio.
    pub fn solid(number: u64, width: u32, height: u32, color: Rgba8Premul) -> Self {
        let px = color.to_array();
        let mut frame = Self::metadata_only(number, width, height);
        frame.image = Some(px.repeat(pixel_count(width, height)));
        frame
    }

    /// Transparent image plus `samples` samples of silence per channel.
    pub fn blank_with_audio(
        number: u64,
        width: u32,
        height: u32,
        sample_rate: u32,
        layout: ChannelLayout,
        samples: usize,
    ) -> Self {
        let mut frame = Self::transparent(number, width, height);
        frame.audio = Some(AudioBuffer::silent(sample_rate, layout, samples));
        frame
    }

    /// Frame from an existing premultiplied RGBA8 buffer.
    pub fn with_image(number: u64, width: u32, height: u32, data: Vec<u8>) -> MontageResult<Self> {
        let mut frame = Self::metadata_only(number, width, height);
        frame.set_image(width, height, data)?;
        Ok(frame)
    }

    /// Frame dimensions.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame dimensions.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// `true` once an image buffer is attached.
    pub fn has_image_data(&self) -> bool {
        self.image.is_some()
    }

    /// `true` once an audio buffer is attached.
    pub fn has_audio_data(&self) -> bool {
        self.audio.is_some()
    }

    /// Image bytes, if materialized.
    pub fn image(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Mutable image bytes, materializing a transparent buffer first when absent.
    pub fn image_mut(&mut self) -> &mut [u8] {
        let len = pixel_count(self.width, self.height) * 4;
        self.image.get_or_insert_with(|| vec![0u8; len])
    }

    /// Replace the image (and dimensions).
    pub fn set_image(&mut self, width: u32, height: u32, data: Vec<u8>) -> MontageResult<()> {
        if data.len() != pixel_count(width, height) * 4 {
            return Err(MontageError::validation(format!(
                "image buffer of {} bytes does not match {width}x{height} rgba8",
                data.len()
            )));
        }
        self.width = width;
        self.height = height;
        self.image = Some(data);
        Ok(())
    }

    /// Drop the image payload.
    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Audio payload, if materialized.
    pub fn audio(&self) -> Option<&AudioBuffer> {
        self.audio.as_ref()
    }

    /// Mutable audio payload.
    pub fn audio_mut(&mut self) -> Option<&mut AudioBuffer> {
        self.audio.as_mut()
    }

    /// Attach or drop the audio payload.
    pub fn set_audio(&mut self, audio: Option<AudioBuffer>) {
        self.audio = audio;
    }

    /// Detach the audio payload.
    pub fn take_audio(&mut self) -> Option<AudioBuffer> {
        self.audio.take()
    }

    /// Pixel at `(x, y)`; `None` outside the frame or without an image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let img = self.image.as_ref()?;
        Some([img[idx], img[idx + 1], img[idx + 2], img[idx + 3]])
    }

    /// Approximate memory footprint used for cache budgets.
    pub fn bytes(&self) -> u64 {
        let image = self.image.as_ref().map_or(0, |v| v.len() as u64);
        let audio = self.audio.as_ref().map_or(0, AudioBuffer::byte_len);
        image + audio
    }

    /// Image converted to straight (non-premultiplied) RGBA8, e.g. for PNG export.
    pub fn to_straight_rgba(&self) -> Option<Vec<u8>> {
        self.image.as_deref().map(unpremultiply)
    }

    /// Same payload under a different frame number.
    pub fn with_number(mut self, number: u64) -> Self {
        self.number = number;
        self
    }

    /// Stable digest of dimensions and payloads (the frame number is not hashed).
    pub fn fingerprint(&self) -> u64 {
        let mut h = Xxh3::with_seed(FINGERPRINT_SEED);
        h.update(&self.width.to_le_bytes());
        h.update(&self.height.to_le_bytes());
        match &self.image {
            Some(img) => {
                h.update(&[1]);
                h.update(img);
            }
            None => h.update(&[0]),
        }
        match &self.audio {
            Some(audio) => {
                h.update(&[1]);
                h.update(&audio.sample_rate.to_le_bytes());
                h.update(&[audio.layout.to_u8()]);
                for ch in &audio.channels {
                    for s in ch {
                        h.update(&s.to_bits().to_le_bytes());
                    }
                }
            }
            None => h.update(&[0]),
        }
        h.digest()
    }
}

pub(crate) fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

#[cfg(test)]
#[path = "../../tests/unit/frame/frame.rs"]
mod tests;
