use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo, Margins};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Margins, as fractions of the frame size, that [`Crop`] clears.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CropParams {
    /// Left margin (fraction of width).
    pub left: Keyframe,
    /// Top margin (fraction of height).
    pub top: Keyframe,
    /// Right margin (fraction of width).
    pub right: Keyframe,
    /// Bottom margin (fraction of height).
    pub bottom: Keyframe,
}

impl Default for CropParams {
    fn default() -> Self {
        Self {
            left: Keyframe::with_value(0.1),
            top: Keyframe::with_value(0.1),
            right: Keyframe::with_value(0.1),
            bottom: Keyframe::with_value(0.1),
        }
    }
}

/// Makes the margins of the image transparent.
#[derive(Clone, Debug, Default)]
pub struct Crop {
    base: EffectBase,
    /// Animated margins.
    pub params: CropParams,
}

impl Crop {
    /// Crop with the given margins.
    pub fn new(left: Keyframe, top: Keyframe, right: Keyframe, bottom: Keyframe) -> Self {
        Self {
            base: EffectBase::default(),
            params: CropParams {
                left,
                top,
                right,
                bottom,
            },
        }
    }

    pub(crate) fn margins_at(&self, width: u32, height: u32, number: u64) -> Margins {
        let x = number as f64;
        let p = &self.params;
        Margins::from_fractions(
            width,
            height,
            p.left.value_or(x, 0.0),
            p.top.value_or(x, 0.0),
            p.right.value_or(x, 0.0),
            p.bottom.value_or(x, 0.0),
        )
    }
}

impl Effect for Crop {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Crop",
            name: "Crop",
            description: "Crop out any part of your video.",
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
        let margins = self.margins_at(frame.width(), frame.height(), number);
        let mut out = Arc::unwrap_or_clone(frame);
        let width = out.width();
        margins.fill(out.image_mut(), width, [0, 0, 0, 0]);
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Crop::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/crop.rs"]
mod tests;
