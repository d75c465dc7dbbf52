use std::sync::Arc;

use crate::effects::{Effect, EffectBase, EffectInfo};
use crate::foundation::error::MontageResult;
use crate::frame::frame::Frame;

/// Inverts the colour channels, leaving alpha untouched.
#[derive(Clone, Debug, Default)]
pub struct Negate {
    base: EffectBase,
}

impl Negate {
    /// Negate with default scheduling fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Negate with the given scheduling fields.
    pub fn with_base(base: EffectBase) -> Self {
        Self { base }
    }
}

impl Effect for Negate {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Negate",
            name: "Negative",
            description: "Negates the colors, producing a negative of the image.",
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

    fn get_frame(&self, frame: Arc<Frame>, _number: u64) -> MontageResult<Arc<Frame>> {
        if !frame.has_image_data() {
            return Ok(frame);
        }
        let mut out = Arc::unwrap_or_clone(frame);
        for px in out.image_mut().chunks_exact_mut(4) {
            let a = px[3];
            for c in &mut px[..3] {
                *c = a.saturating_sub(*c);
            }
        }
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::json!({})
    }

    fn apply_properties_json(&mut self, _value: &serde_json::Value) -> MontageResult<()> {
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/negate.rs"]
mod tests;
