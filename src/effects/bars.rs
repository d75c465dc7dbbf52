use std::sync::Arc;

use crate::animation::color::ColorKeyframe;
use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo, Margins};
use crate::foundation::error::MontageResult;
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Bar colour and margins, as fractions of the frame size, for [`Bars`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BarsParams {
    /// Bar colour.
    pub color: ColorKeyframe,
    /// Left bar (fraction of width).
    pub left: Keyframe,
    /// Top bar (fraction of height).
    pub top: Keyframe,
    /// Right bar (fraction of width).
    pub right: Keyframe,
    /// Bottom bar (fraction of height).
    pub bottom: Keyframe,
}

impl Default for BarsParams {
    fn default() -> Self {
        Self {
            color: ColorKeyframe::new(0, 0, 0, 255),
            left: Keyframe::with_value(0.0),
            top: Keyframe::with_value(0.1),
            right: Keyframe::with_value(0.0),
            bottom: Keyframe::with_value(0.1),
        }
    }
}

/// Paints coloured bars over the margins of the image (letterbox / pillarbox).
#[derive(Clone, Debug, Default)]
pub struct Bars {
    base: EffectBase,
    /// Animated colour and margins.
    pub params: BarsParams,
}

impl Bars {
    /// Bars of `color` with the given margins.
    pub fn new(
        color: ColorKeyframe,
        left: Keyframe,
        top: Keyframe,
        right: Keyframe,
        bottom: Keyframe,
    ) -> Self {
        Self {
            base: EffectBase::default(),
            params: BarsParams {
                color,
                left,
                top,
                right,
                bottom,
            },
        }
    }
}

impl Effect for Bars {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Bars",
            name: "Bars",
            description: "Add colored bars around your video.",
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
        let p = &self.params;
        let margins = Margins::from_fractions(
            frame.width(),
            frame.height(),
            p.left.value_or(x, 0.0),
            p.top.value_or(x, 0.0),
            p.right.value_or(x, 0.0),
            p.bottom.value_or(x, 0.0),
        );
        let color = p.color.rgba_at(x).to_array();
        let mut out = Arc::unwrap_or_clone(frame);
        let width = out.width();
        margins.fill(out.image_mut(), width, color);
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Bars::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/bars.rs"]
mod tests;
