use std::sync::Arc;

use image::RgbaImage;
use image::imageops::{self, FilterType};

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo, Margins};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Block size and the margins (fractions of the frame) [`Pixelate`] leaves untouched.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PixelateParams {
    /// `0` keeps full resolution; values towards `1` give larger blocks.
    pub pixelization: Keyframe,
    /// Left margin (fraction of width).
    pub left: Keyframe,
    /// Top margin (fraction of height).
    pub top: Keyframe,
    /// Right margin (fraction of width).
    pub right: Keyframe,
    /// Bottom margin (fraction of height).
    pub bottom: Keyframe,
}

impl Default for PixelateParams {
    fn default() -> Self {
        Self {
            pixelization: Keyframe::with_value(0.7),
            left: Keyframe::with_value(0.0),
            top: Keyframe::with_value(0.0),
            right: Keyframe::with_value(0.0),
            bottom: Keyframe::with_value(0.0),
        }
    }
}

/// Downsamples the image and scales it back up with nearest-neighbour sampling.
#[derive(Clone, Debug, Default)]
pub struct Pixelate {
    base: EffectBase,
    /// Animated parameters.
    pub params: PixelateParams,
}

impl Pixelate {
    /// Pixelate with the given block size and margins.
    pub fn new(
        pixelization: Keyframe,
        left: Keyframe,
        top: Keyframe,
        right: Keyframe,
        bottom: Keyframe,
    ) -> Self {
        Self {
            base: EffectBase::default(),
            params: PixelateParams {
                pixelization,
                left,
                top,
                right,
                bottom,
            },
        }
    }

    /// Width the image is reduced to at `x`, or `None` when no reduction happens.
    fn reduced_width(&self, width: u32, x: f64) -> Option<u32> {
        let keep = 1.0 - self.params.pixelization.value_or(x, 0.0).abs().min(1.0);
        if keep.is_nan() || keep <= 0.0 {
            return None;
        }
        let reduced = ((f64::from(width) * keep) as u32).max(2);
        (reduced < width).then_some(reduced)
    }
}

impl Effect for Pixelate {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Pixelate",
            name: "Pixelate",
            description: "Pixelate (increase or decrease) the number of visible pixels.",
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
        let (width, height) = (frame.width(), frame.height());
        if height == 0 {
            return Ok(frame);
        }
        let x = number as f64;
        let (Some(data), Some(small_w)) = (frame.image(), self.reduced_width(width, x)) else {
            return Ok(frame);
        };
        let small_h = ((f64::from(height) * f64::from(small_w) / f64::from(width)).round() as u32)
            .max(1);

        let source = RgbaImage::from_raw(width, height, data.to_vec())
            .ok_or_else(|| MontageError::validation("pixelate: image does not match frame size"))?;
        let small = imageops::resize(&source, small_w, small_h, FilterType::Triangle);
        let blocks = imageops::resize(&small, width, height, FilterType::Nearest);

        let p = &self.params;
        let margins = Margins::from_fractions(
            width,
            height,
            p.left.value_or(x, 0.0),
            p.top.value_or(x, 0.0),
            p.right.value_or(x, 0.0),
            p.bottom.value_or(x, 0.0),
        );
        let (w, h) = (width as usize, height as usize);
        let mut out = Arc::unwrap_or_clone(frame);
        let pixels = out
            .image_mut()
            .chunks_exact_mut(4)
            .zip(blocks.as_raw().chunks_exact(4))
            .enumerate();
        for (i, (dst, src)) in pixels {
            if !margins.covers(i % w, i / w, w, h) {
                dst.copy_from_slice(src);
            }
        }
        tracing::trace!(number, small_w, small_h, "pixelated");
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Pixelate::set_json")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/pixelate.rs"]
mod tests;
