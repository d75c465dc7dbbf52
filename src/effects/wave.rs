use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Animated shape of the [`Wave`] distortion.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WaveParams {
    /// Phase advance per row, in radians.
    pub wavelength: Keyframe,
    /// Height of the wave.
    pub amplitude: Keyframe,
    /// Scales the amplitude.
    pub multiplier: Keyframe,
    /// Constant added to the waveform before scaling; moves every row sideways.
    pub shift_x: Keyframe,
    /// Phase advance per frame, in radians.
    pub speed_y: Keyframe,
}

impl Default for WaveParams {
    fn default() -> Self {
        Self {
            wavelength: Keyframe::with_value(0.06),
            amplitude: Keyframe::with_value(0.3),
            multiplier: Keyframe::with_value(0.2),
            shift_x: Keyframe::with_value(0.0),
            speed_y: Keyframe::with_value(0.2),
        }
    }
}

/// Displaces each row sideways along a sine wave that travels with the frame number.
#[derive(Clone, Debug, Default)]
pub struct Wave {
    base: EffectBase,
    /// Animated parameters.
    pub params: WaveParams,
}

impl Wave {
    /// Wave with the given shape.
    pub fn new(
        wavelength: Keyframe,
        amplitude: Keyframe,
        multiplier: Keyframe,
        shift_x: Keyframe,
        speed_y: Keyframe,
    ) -> Self {
        Self {
            base: EffectBase::default(),
            params: WaveParams {
                wavelength,
                amplitude,
                multiplier,
                shift_x,
                speed_y,
            },
        }
    }
}

impl Effect for Wave {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Wave",
            name: "Wave",
            description: "Distort the frame's image into a wave pattern.",
            has_video: true,
            has_audio: false,
        }
    }

    fn base(&self) -> &EffectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EffectBase {
        &mut self.base
    }

    fn get_frame(&self, frame: Arc<Frame>, number: u64) -> MontageResult<Arc<Frame>> {
        let Some(source) = frame.image().map(<[u8]>::to_vec) else {
            return Ok(frame);
        };
        let w = frame.width() as usize;
        let last = (source.len() / 4).saturating_sub(1);
        if w == 0 || source.is_empty() {
            return Ok(frame);
        }

        let x = number as f64;
        let p = &self.params;
        let wavelength = p.wavelength.value_or(x, 0.06);
        let amplitude = p.amplitude.value_or(x, 0.3);
        let multiplier = p.multiplier.value_or(x, 0.2);
        let shift_x = p.shift_x.value_or(x, 0.0);
        let speed_y = p.speed_y.value_or(x, 0.2);

        let mut out = Arc::unwrap_or_clone(frame);
        for (y, row) in out.image_mut().chunks_exact_mut(w * 4).enumerate() {
            let row_y = y as f64;
            let height = (100.0 + row_y * 0.001) * multiplier * amplitude;
            let offset = ((row_y * wavelength + x * speed_y).sin() + shift_x) * height;
            for (col, dst) in row.chunks_exact_mut(4).enumerate() {
                // Offsets run through the flat buffer, so they carry into neighbouring rows.
                let from = ((y * w + col) as f64 + offset).round();
                let from = if from > 0.0 { (from as usize).min(last) } else { 0 };
                dst.copy_from_slice(&source[from * 4..from * 4 + 4]);
            }
        }
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Wave::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/wave.rs"]
mod tests;
