use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Animated offsets for [`Shift`], as fractions of the frame size.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ShiftParams {
    /// Positive moves right.
    pub x: Keyframe,
    /// Positive moves down.
    pub y: Keyframe,
}

impl Default for ShiftParams {
    fn default() -> Self {
        Self {
            x: Keyframe::with_value(0.0),
            y: Keyframe::with_value(0.0),
        }
    }
}

/// Moves the image with wrap-around, so pixels leaving one edge re-enter at the opposite one.
#[derive(Clone, Debug, Default)]
pub struct Shift {
    base: EffectBase,
    /// Animated parameters.
    pub params: ShiftParams,
}

impl Shift {
    /// Shift following `x` and `y`.
    pub fn new(x: Keyframe, y: Keyframe) -> Self {
        Self {
            base: EffectBase::default(),
            params: ShiftParams { x, y },
        }
    }
}

/// Whole-pixel offset in `0..extent` for a shift of `fraction` of `extent`.
fn wrapped(fraction: f64, extent: u32) -> usize {
    let px = (fraction * f64::from(extent)).round();
    if extent == 0 || !px.is_finite() {
        return 0;
    }
    px.rem_euclid(f64::from(extent)) as usize
}

impl Effect for Shift {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Shift",
            name: "Shift",
            description: "Shift the image up, down, left, and right (with infinite wrapping).",
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
        let dx = wrapped(self.params.x.value_or(x, 0.0), frame.width());
        let dy = wrapped(self.params.y.value_or(x, 0.0), frame.height());
        if dx == 0 && dy == 0 {
            return Ok(frame);
        }

        let mut out = Arc::unwrap_or_clone(frame);
        let row_bytes = out.width() as usize * 4;
        let image = out.image_mut();
        if dx > 0 {
            for row in image.chunks_exact_mut(row_bytes) {
                row.rotate_right(dx * 4);
            }
        }
        image.rotate_right(dy * row_bytes);
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Shift::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/shift.rs"]
mod tests;
