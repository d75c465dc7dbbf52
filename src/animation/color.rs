use crate::animation::keyframe::Keyframe;
use crate::foundation::core::Rgba8Premul;

/// Animated straight-alpha color made of four 0..=255 channel curves.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ColorKeyframe {
    /// Red channel.
    pub red: Keyframe,
    /// Green channel.
    pub green: Keyframe,
    /// Blue channel.
    pub blue: Keyframe,
    /// Alpha channel.
    pub alpha: Keyframe,
}

impl Default for ColorKeyframe {
    fn default() -> Self {
        Self::new(0, 0, 0, 255)
    }
}

impl ColorKeyframe {
    /// Constant color.
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            red: Keyframe::with_value(f64::from(r)),
            green: Keyframe::with_value(f64::from(g)),
            blue: Keyframe::with_value(f64::from(b)),
            alpha: Keyframe::with_value(f64::from(a)),
        }
    }

    /// Premultiplied color at `x`; channels without points read as 0 (alpha as 255).
    pub fn rgba_at(&self, x: f64) -> Rgba8Premul {
        let channel =
            |kf: &Keyframe, default: f64| kf.value_or(x, default).round().clamp(0.0, 255.0) as u8;
        Rgba8Premul::from_straight_rgba(
            channel(&self.red, 0.0),
            channel(&self.green, 0.0),
            channel(&self.blue, 0.0),
            channel(&self.alpha, 255.0),
        )
    }
}

#[cfg(test)]
#[path = "../../tests/unit/animation/color.rs"]
mod tests;
