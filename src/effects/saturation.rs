use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo, adjust_straight_rgb};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

const LUMA_R: f32 = 0.299;
const LUMA_G: f32 = 0.587;
const LUMA_B: f32 = 0.114;

/// Animated level for [`Saturation`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SaturationParams {
    /// `0` is greyscale, `1` leaves the image alone, larger values boost colour.
    pub saturation: Keyframe,
}

impl Default for SaturationParams {
    fn default() -> Self {
        Self {
            saturation: Keyframe::with_value(1.0),
        }
    }
}

/// Pushes every pixel towards or away from its perceived grey level.
#[derive(Clone, Debug, Default)]
pub struct Saturation {
    base: EffectBase,
    /// Animated parameters.
    pub params: SaturationParams,
}

impl Saturation {
    /// Saturation following `saturation`.
    pub fn new(saturation: Keyframe) -> Self {
        Self {
            base: EffectBase::default(),
            params: SaturationParams { saturation },
        }
    }
}

impl Effect for Saturation {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Saturation",
            name: "Color Saturation",
            description: "Adjust the color saturation.",
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
        let amount = self.params.saturation.value_or(number as f64, 1.0) as f32;
        let mut out = Arc::unwrap_or_clone(frame);
        adjust_straight_rgb(out.image_mut(), |[r, g, b]| {
            let grey = (r * r * LUMA_R + g * g * LUMA_G + b * b * LUMA_B).sqrt();
            [r, g, b].map(|c| grey + (c - grey) * amount)
        });
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Saturation::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/saturation.rs"]
mod tests;
