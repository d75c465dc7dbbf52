use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo, adjust_straight_rgb};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Animated rotation for [`Hue`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HueParams {
    /// Hue rotation in turns (`1.0` = 360 degrees).
    pub hue: Keyframe,
}

impl Default for HueParams {
    fn default() -> Self {
        Self {
            hue: Keyframe::with_value(0.0),
        }
    }
}

/// Rotates colours around the grey axis of RGB space.
#[derive(Clone, Debug, Default)]
pub struct Hue {
    base: EffectBase,
    /// Animated parameters.
    pub params: HueParams,
}

impl Hue {
    /// Hue rotation following `hue`.
    pub fn new(hue: Keyframe) -> Self {
        Self {
            base: EffectBase::default(),
            params: HueParams { hue },
        }
    }
}

/// Rotation matrix about the `(1, 1, 1)` axis by `turns` of a full circle.
fn rotation(turns: f64) -> [[f32; 3]; 3] {
    let (sin, cos) = (turns * std::f64::consts::TAU).sin_cos();
    let (sin, cos) = (sin as f32, cos as f32);
    let third = (1.0 - cos) / 3.0;
    let s = (1.0f32 / 3.0).sqrt() * sin;
    let diag = cos + third;
    [
        [diag, third - s, third + s],
        [third + s, diag, third - s],
        [third - s, third + s, diag],
    ]
}

impl Effect for Hue {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Hue",
            name: "Hue",
            description: "Adjust the hue / color of the frame's image.",
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
        let turns = self.params.hue.value_or(number as f64, 0.0);
        if turns.fract() == 0.0 {
            return Ok(frame);
        }
        let m = rotation(turns);
        let mut out = Arc::unwrap_or_clone(frame);
        adjust_straight_rgb(out.image_mut(), |[r, g, b]| {
            m.map(|row| r * row[0] + g * row[1] + b * row[2])
        });
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Hue::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/hue.rs"]
mod tests;
