use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Deserialize as _;

use crate::foundation::core::Rgba8Premul;
use crate::foundation::error::{MontageError, MontageResult};
use crate::frame::audio::{AudioBuffer, first_sample_of_frame, samples_per_frame};
use crate::frame::frame::Frame;
use crate::reader::{Reader, ReaderInfo, ensure_open};

const TONE_AMPLITUDE: f64 = 0.5;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
struct DummyDescriptor {
    info: ReaderInfo,
    #[serde(default = "default_color")]
    color: Rgba8Premul,
    #[serde(default)]
    tone_hz: Option<f64>,
}

fn default_color() -> Rgba8Premul {
    Rgba8Premul::opaque(0, 0, 0)
}

/// Synthetic reader: every frame is one solid colour, audio is silence or a sine tone.
///
/// The tone phase is continuous across frames because each frame starts at the absolute sample
/// index of its first sample.
#[derive(Debug)]
pub struct DummyReader {
    info: ReaderInfo,
    color: Rgba8Premul,
    tone_hz: Option<f64>,
    open: AtomicBool,
}

impl DummyReader {
    /// Reader producing `color` frames with silent audio.
    pub fn new(info: ReaderInfo, color: Rgba8Premul) -> Self {
        Self {
            info,
            color,
            tone_hz: None,
            open: AtomicBool::new(false),
        }
    }

    /// Add a sine tone at `hz` to every channel.
    pub fn with_tone(mut self, hz: f64) -> Self {
        self.tone_hz = Some(hz);
        self
    }

    /// Rebuild from a `{"type": "DummyReader", "info": .., "color": .., "tone_hz": ..}` document.
    pub fn from_json_value(value: &serde_json::Value) -> MontageResult<Self> {
        let mut d = DummyDescriptor::deserialize(value)
            .map_err(|e| MontageError::invalid_json("DummyReader::from_json", e.to_string()))?;
        d.info.fill_video_length();
        d.info
            .validate()
            .map_err(|e| MontageError::invalid_json("DummyReader::from_json", e.to_string()))?;
        Ok(Self {
            info: d.info,
            color: d.color,
            tone_hz: d.tone_hz,
            open: AtomicBool::new(false),
        })
    }

    fn audio_for(&self, number: u64) -> AudioBuffer {
        let info = &self.info;
        let count = samples_per_frame(number, info.fps, info.sample_rate, info.channels);
        let mut audio = AudioBuffer::silent(info.sample_rate, info.channel_layout, count);
        if let Some(hz) = self.tone_hz {
            let first = first_sample_of_frame(number, info.fps, info.sample_rate, info.channels);
            let rate = f64::from(info.sample_rate.max(1));
            let tone: Vec<f32> = (0..count as u64)
                .map(|i| {
                    let t = (first + i) as f64 / rate;
                    (TONE_AMPLITUDE * (std::f64::consts::TAU * hz * t).sin()) as f32
                })
                .collect();
            for ch in &mut audio.channels {
                ch.copy_from_slice(&tone);
            }
        }
        audio
    }
}

impl Reader for DummyReader {
    fn info(&self) -> &ReaderInfo {
        &self.info
    }

    fn open(&self) -> MontageResult<()> {
        self.open.store(true, Ordering::Release);
        Ok(())
    }

    fn close(&self) {
        self.open.store(false, Ordering::Release);
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn get_frame(&self, number: u64) -> MontageResult<Arc<Frame>> {
        ensure_open(self, "DummyReader")?;
        self.info.check_frame(number)?;

        let mut frame = if self.info.has_video {
            Frame::solid(number, self.info.width, self.info.height, self.color)
        } else {
            Frame::metadata_only(number, self.info.width, self.info.height)
        };
        if self.info.has_audio {
            frame.set_audio(Some(self.audio_for(number)));
        }
        Ok(Arc::new(frame))
    }

    fn json_value(&self) -> serde_json::Value {
        let d = DummyDescriptor {
            info: self.info.clone(),
            color: self.color,
            tone_hz: self.tone_hz,
        };
        let mut value = serde_json::to_value(d).unwrap_or_default();
        if let Some(obj) = value.as_object_mut() {
            obj.insert("type".to_string(), serde_json::json!("DummyReader"));
        }
        value
    }
}

#[cfg(test)]
#[path = "../../tests/unit/reader/dummy.rs"]
mod tests;
