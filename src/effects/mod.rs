//! Frame effects: the [`Effect`] interface, shared scheduling fields and the built-in variants.
//!
//! An effect receives a shared frame plus the frame number its keyframes are evaluated at and
//! returns a new shared frame. Effects never mutate a frame another owner can see: they take a
//! private copy with `Arc::unwrap_or_clone` first.

use std::sync::Arc;

use crate::foundation::core::Fraction;
use crate::foundation::error::MontageResult;
use crate::foundation::json::{apply_partial, merge_object};
use crate::foundation::math::{frame_span, seconds_to_frames};
use crate::frame::frame::Frame;

pub mod bars;
pub mod blur;
pub mod brightness;
pub(crate) mod composite;
pub mod crop;
pub mod hue;
pub mod negate;
pub mod pixelate;
pub mod registry;
pub mod saturation;
pub mod shift;
pub mod wave;

/// Static description of an effect variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub struct EffectInfo {
    /// Registry key, e.g. `"Blur"`.
    pub class_name: &'static str,
    /// Display name.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// Acts on the image payload.
    pub has_video: bool,
    /// Acts on the audio payload.
    pub has_audio: bool,
}

/// Scheduling fields shared by every effect.
///
/// `position` places a timeline-level effect on the timeline (seconds); `start`/`end` trim it
/// (seconds); `layer` and `order` decide where it runs relative to other effects.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EffectBase {
    /// Caller-assigned identifier.
    pub id: String,
    /// Timeline position in seconds.
    pub position: f64,
    /// Layer the effect is scheduled on.
    pub layer: i32,
    /// Trim-in point in seconds.
    pub start: f64,
    /// Trim-out point in seconds.
    pub end: f64,
    /// Order among effects sharing a layer (ascending).
    pub order: i32,
}

impl EffectBase {
    /// Base with `id`, spanning `duration` seconds from timeline `position` on `layer`.
    pub fn covering(id: impl Into<String>, layer: i32, position: f64, duration: f64) -> Self {
        Self {
            id: id.into(),
            position,
            layer,
            start: 0.0,
            end: duration.max(0.0),
            order: 0,
        }
    }

    /// Active length in seconds.
    pub fn duration(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    /// Inclusive timeline frame span at `fps`; `None` when the effect covers no frame.
    pub fn frame_span(&self, fps: Fraction) -> Option<(u64, u64)> {
        frame_span(self.position, self.duration(), fps)
    }

    /// `true` when timeline frame `number` falls inside [`EffectBase::frame_span`].
    pub fn covers(&self, number: u64, fps: Fraction) -> bool {
        self.frame_span(fps)
            .is_some_and(|(first, last)| (first..=last).contains(&number))
    }

    /// Frame number the effect's keyframes see for timeline frame `number`.
    pub fn local_frame(&self, number: u64, fps: Fraction) -> u64 {
        let first = seconds_to_frames(self.position, fps) + 1;
        number.saturating_sub(first) + 1 + seconds_to_frames(self.start, fps)
    }

    /// `{"id", "position", "layer", "start", "end", "duration", "order"}`.
    pub fn json_value(&self) -> serde_json::Value {
        let mut root = serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}));
        merge_object(&mut root, serde_json::json!({ "duration": self.duration() }));
        root
    }

    /// Apply the keys present in `value`, keeping the rest.
    pub fn apply_json_value(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        *self = apply_partial(self, value, "EffectBase::set_json")?;
        Ok(())
    }
}

/// Capability interface every effect variant implements.
///
/// `get_frame` must be pure with respect to the effect's own state: the same input frame and
/// number always produce the same output.
pub trait Effect: Send + Sync + std::fmt::Debug {
    /// Static description.
    fn info(&self) -> EffectInfo;
    /// Scheduling fields.
    fn base(&self) -> &EffectBase;
    /// Mutable scheduling fields.
    fn base_mut(&mut self) -> &mut EffectBase;
    /// Apply the effect to `frame`, evaluating keyframes at `number`.
    fn get_frame(&self, frame: Arc<Frame>, number: u64) -> MontageResult<Arc<Frame>>;
    /// Effect-specific properties as a JSON object.
    fn properties_json(&self) -> serde_json::Value;
    /// Apply the effect-specific keys present in `value`.
    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()>;

    /// Full document: base fields, info fields, `"type"` and properties.
    fn json_value(&self) -> serde_json::Value {
        let info = self.info();
        let mut root = self.base().json_value();
        merge_object(
            &mut root,
            serde_json::json!({
                "type": info.class_name,
                "class_name": info.class_name,
                "name": info.name,
                "description": info.description,
                "has_video": info.has_video,
                "has_audio": info.has_audio,
            }),
        );
        merge_object(&mut root, self.properties_json());
        root
    }

    /// Partial apply of a full document.
    fn apply_json_value(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.base_mut().apply_json_value(value)?;
        self.apply_properties_json(value)
    }
}

/// Order clip effects by `order`, keeping insertion order for ties.
pub fn sort_effects(effects: &mut [Box<dyn Effect>]) {
    effects.sort_by_key(|e| e.base().order);
}

/// Order timeline effects by `layer`, then `order`, keeping insertion order for ties.
pub fn sort_timeline_effects(effects: &mut [Box<dyn Effect>]) {
    effects.sort_by_key(|e| (e.base().layer, e.base().order));
}

/// Pixel extents of the four margins described by fractions of the frame size.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Margins {
    pub(crate) left: usize,
    pub(crate) top: usize,
    pub(crate) right: usize,
    pub(crate) bottom: usize,
}

impl Margins {
    /// Margins from fractions; each extent is truncated and clamped to the frame.
    pub(crate) fn from_fractions(
        width: u32,
        height: u32,
        left: f64,
        top: f64,
        right: f64,
        bottom: f64,
    ) -> Self {
        let px = |fraction: f64, extent: u32| {
            let v = (fraction * f64::from(extent)).trunc();
            if v.is_finite() && v > 0.0 {
                (v as usize).min(extent as usize)
            } else {
                0
            }
        };
        Self {
            left: px(left, width),
            top: px(top, height),
            right: px(right, width),
            bottom: px(bottom, height),
        }
    }

    /// Whether pixel `(x, y)` of a `width x height` frame lies inside the margins.
    pub(crate) fn covers(&self, x: usize, y: usize, width: usize, height: usize) -> bool {
        y < self.top
            || (self.bottom > 0 && y + self.bottom >= height)
            || x < self.left
            || (self.right > 0 && x + self.right >= width)
    }

    /// Fill every pixel inside the margins of a `width`-wide RGBA8 buffer with `px`.
    pub(crate) fn fill(&self, image: &mut [u8], width: u32, px: [u8; 4]) {
        let w = width as usize;
        if w == 0 {
            return;
        }
        let rows = image.len() / (w * 4);
        for (y, row) in image.chunks_exact_mut(w * 4).enumerate() {
            for (x, dst) in row.chunks_exact_mut(4).enumerate() {
                if self.covers(x, y, w, rows) {
                    dst.copy_from_slice(&px);
                }
            }
        }
    }
}

/// Run `adjust` on the straight-alpha colour (`0..=255` per channel) of every visible pixel of a
/// premultiplied RGBA8 buffer. Alpha is kept and results are clamped before premultiplying.
pub(crate) fn adjust_straight_rgb(image: &mut [u8], adjust: impl Fn([f32; 3]) -> [f32; 3]) {
    for px in image.chunks_exact_mut(4) {
        if px[3] == 0 {
            continue;
        }
        let alpha = f32::from(px[3]) / 255.0;
        let rgb = adjust([0, 1, 2].map(|i| f32::from(px[i]) / alpha));
        for (c, v) in px[..3].iter_mut().zip(rgb) {
            *c = (v.clamp(0.0, 255.0) * alpha).round() as u8;
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/base.rs"]
mod tests;
