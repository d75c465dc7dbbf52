use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::foundation::core::{ChannelLayout, Fraction};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::premultiply_in_place;
use crate::frame::frame::Frame;
use crate::reader::{Reader, ReaderInfo, ensure_open, frames_in};

/// Default still duration in seconds when a descriptor does not give one.
pub const DEFAULT_STILL_SECONDS: f64 = 3600.0;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct StillDescriptor {
    path: PathBuf,
    #[serde(default = "default_fps")]
    fps: Fraction,
    #[serde(default = "default_duration")]
    duration: f64,
}

fn default_fps() -> Fraction {
    Fraction::new(30, 1)
}

fn default_duration() -> f64 {
    DEFAULT_STILL_SECONDS
}

/// Reader that repeats one decoded still image for every frame.
///
/// Dimensions are probed at construction; pixels are decoded on `open` and released on `close`.
#[derive(Debug)]
pub struct ImageReader {
    path: PathBuf,
    info: ReaderInfo,
    pixels: RwLock<Option<Arc<Vec<u8>>>>,
}

impl ImageReader {
    /// Probe `path` and describe it as a still of `duration` seconds at `fps`.
    pub fn new(path: impl Into<PathBuf>, fps: Fraction, duration: f64) -> MontageResult<Self> {
        let path = path.into();
        fps.validate_rate("image reader fps")?;
        let (width, height) = image::image_dimensions(&path).map_err(|e| {
            MontageError::invalid_file(format!("image '{}': {e}", path.display()))
        })?;
        let info = ReaderInfo {
            width,
            height,
            fps,
            sample_rate: 48_000,
            channels: 2,
            channel_layout: ChannelLayout::Stereo,
            duration,
            video_length: frames_in(duration, fps),
            has_video: true,
            has_audio: false,
            has_single_image: true,
        };
        Ok(Self {
            path,
            info,
            pixels: RwLock::new(None),
        })
    }

    /// Rebuild from a `{"type": "ImageReader", "path": .., "fps": .., "duration": ..}` document.
    pub fn from_json_value(value: &serde_json::Value) -> MontageResult<Self> {
        let d: StillDescriptor = serde_json::from_value(value.clone())
            .map_err(|e| MontageError::invalid_json("ImageReader::from_json", e.to_string()))?;
        Self::new(d.path, d.fps, d.duration)
    }

    /// Source path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self) -> MontageResult<Vec<u8>> {
        let img = image::open(&self.path).map_err(|e| {
            MontageError::invalid_file(format!("image '{}': {e}", self.path.display()))
        })?;
        let mut rgba = img.to_rgba8();
        if rgba.dimensions() != (self.info.width, self.info.height) {
            return Err(MontageError::invalid_file(format!(
                "image '{}' changed size since it was probed",
                self.path.display()
            )));
        }
        premultiply_in_place(&mut rgba);
        Ok(rgba.into_raw())
    }
}

impl Reader for ImageReader {
    fn info(&self) -> &ReaderInfo {
        &self.info
    }

    fn open(&self) -> MontageResult<()> {
        if self.pixels.read().is_some() {
            return Ok(());
        }
        let data = self.decode()?;
        tracing::debug!(path = %self.path.display(), "decoded still image");
        *self.pixels.write() = Some(Arc::new(data));
        Ok(())
    }

    fn close(&self) {
        *self.pixels.write() = None;
    }

    fn is_open(&self) -> bool {
        self.pixels.read().is_some()
    }

    fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>> {
        ensure_open(self, "ImageReader")?;
        self.info.check_frame(number)?;
        let pixels = self
            .pixels
            .read()
            .clone()
            .ok_or_else(|| MontageError::reader_closed("ImageReader closed during read"))?;
        let frame = Frame::with_image(
            number,
            self.info.width,
            self.info.height,
            Vec::clone(&pixels),
        )?;
        Ok(Arc::new(frame))
    }

    fn json_value(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "ImageReader",
            "path": self.path,
            "fps": self.info.fps,
            "duration": self.info.duration,
        })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reader/still.rs"]
mod tests;
