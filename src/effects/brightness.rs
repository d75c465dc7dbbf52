use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo, adjust_straight_rgb};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Animated levels for [`Brightness`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BrightnessParams {
    /// Offset added to every channel, as a fraction of full scale (`-1..=1`).
    pub brightness: Keyframe,
    /// Contrast in `-255..=255` around mid grey.
    pub contrast: Keyframe,
}

impl Default for BrightnessParams {
    fn default() -> Self {
        Self {
            brightness: Keyframe::with_value(0.0),
            contrast: Keyframe::with_value(3.0),
        }
    }
}

/// Contrast stretch around mid grey followed by a brightness offset.
#[derive(Clone, Debug, Default)]
pub struct Brightness {
    base: EffectBase,
    /// Animated parameters.
    pub params: BrightnessParams,
}

impl Brightness {
    /// Brightness with the given curves.
    pub fn new(brightness: Keyframe, contrast: Keyframe) -> Self {
        Self {
            base: EffectBase::default(),
            params: BrightnessParams {
                brightness,
                contrast,
            },
        }
    }
}

/// Classic contrast correction factor; `1.0` at zero contrast.
fn contrast_factor(contrast: f32) -> f32 {
    (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast))
}

impl Effect for Brightness {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Brightness",
            name: "Brightness & Contrast",
            description: "Adjust the brightness and contrast of the frame's image.",
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
        if !frame.has_image_data() {
            return Ok(frame);
        }
        let x = number as f64;
        let offset = 255.0 * self.params.brightness.value_or(x, 0.0) as f32;
        let factor = contrast_factor(self.params.contrast.value_or(x, 0.0) as f32);

        let mut out = Arc::unwrap_or_clone(frame);
        adjust_straight_rgb(out.image_mut(), |rgb| {
            rgb.map(|c| (factor * (c - 128.0) + 128.0).clamp(0.0, 255.0) + offset)
        });
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Brightness::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/brightness.rs"]
mod tests;
