use std::sync::Arc;

use crate::animation::keyframe::Keyframe;
use crate::effects::{Effect, EffectBase, EffectInfo};
use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::json::apply_partial;
use crate::frame::frame::Frame;

/// Radii, spread and pass count for [`Blur`].
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlurParams {
    /// Horizontal kernel radius in pixels.
    pub horizontal_radius: Keyframe,
    /// Vertical kernel radius in pixels.
    pub vertical_radius: Keyframe,
    /// Gaussian standard deviation in pixels.
    pub sigma: Keyframe,
    /// Number of horizontal + vertical pass pairs.
    pub iterations: Keyframe,
}

impl Default for BlurParams {
    fn default() -> Self {
        Self {
            horizontal_radius: Keyframe::with_value(6.0),
            vertical_radius: Keyframe::with_value(6.0),
            sigma: Keyframe::with_value(3.0),
            iterations: Keyframe::with_value(3.0),
        }
    }
}

/// Separable Gaussian blur in Q16 fixed point.
#[derive(Clone, Debug, Default)]
pub struct Blur {
    base: EffectBase,
    /// Animated parameters.
    pub params: BlurParams,
}

impl Blur {
    /// Blur with the given parameters.
    pub fn new(
        horizontal_radius: Keyframe,
        vertical_radius: Keyframe,
        sigma: Keyframe,
        iterations: Keyframe,
    ) -> Self {
        Self {
            base: EffectBase::default(),
            params: BlurParams {
                horizontal_radius,
                vertical_radius,
                sigma,
                iterations,
            },
        }
    }
}

fn whole(kf: &Keyframe, x: f64, default: f64) -> u32 {
    let v = kf.value_or(x, default).round();
    if v.is_finite() && v > 0.0 {
        v.min(f64::from(u16::MAX)) as u32
    } else {
        0
    }
}

impl Effect for Blur {
    fn info(&self) -> EffectInfo {
        EffectInfo {
            class_name: "Blur",
            name: "Blur",
            description: "Adjust the blur of the frame's image.",
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
        let Some(plan) = BlurPlan::at(&self.params, number as f64)? else {
            return Ok(frame);
        };
        let mut out = Arc::unwrap_or_clone(frame);
        let (width, height) = (out.width(), out.height());
        plan.apply(out.image_mut(), width, height);
        Ok(Arc::new(out))
    }

    fn properties_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_else(|_| serde_json::json!({}))
    }

    fn apply_properties_json(&mut self, value: &serde_json::Value) -> MontageResult<()> {
        self.params = apply_partial(&self.params, value, "Blur::set_json")?;
        Ok(())
    }
}

/// Kernels and pass count resolved from the keyframes at one frame.
#[derive(Debug)]
struct BlurPlan {
    horizontal: Option<Vec<u32>>,
    vertical: Option<Vec<u32>>,
    iterations: u32,
}

impl BlurPlan {
    /// `None` when the parameters at `x` leave the image unchanged.
    fn at(params: &BlurParams, x: f64) -> MontageResult<Option<Self>> {
        let h_radius = whole(&params.horizontal_radius, x, 0.0);
        let v_radius = whole(&params.vertical_radius, x, 0.0);
        let iterations = whole(&params.iterations, x, 1.0);
        if iterations == 0 || (h_radius == 0 && v_radius == 0) {
            return Ok(None);
        }
        let sigma = params.sigma.value_or(x, 3.0);
        let kernel = |radius: u32| {
            (radius > 0)
                .then(|| gaussian_kernel_q16(radius, sigma))
                .transpose()
        };
        Ok(Some(Self {
            horizontal: kernel(h_radius)?,
            vertical: kernel(v_radius)?,
            iterations,
        }))
    }

    fn apply(&self, image: &mut [u8], width: u32, height: u32) {
        let mut scratch = vec![0u8; image.len()];
        for _ in 0..self.iterations {
            for (kernel, axis) in [(&self.horizontal, Axis::Rows), (&self.vertical, Axis::Columns)] {
                if let Some(kernel) = kernel {
                    convolve(image, &mut scratch, width, height, kernel, axis);
                    image.copy_from_slice(&scratch);
                }
            }
        }
    }
}

/// Normalised Gaussian weights of `2 * radius + 1` taps summing to exactly `1 << 16`.
pub(crate) fn gaussian_kernel_q16(radius: u32, sigma: f64) -> MontageResult<Vec<u32>> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(MontageError::validation("blur sigma must be > 0"));
    }
    let r = i64::from(radius);
    let denom = 2.0 * sigma * sigma;
    let weights: Vec<f64> = (-r..=r)
        .map(|i| (-((i * i) as f64) / denom).exp())
        .collect();
    let total: f64 = weights.iter().sum();

    // Quantising the running sum keeps the total exact without a correction tap.
    let mut running = 0.0;
    let mut previous = 0u32;
    Ok(weights
        .iter()
        .map(|w| {
            running += w;
            let q = ((running / total) * 65536.0).round() as u32;
            let tap = q - previous;
            previous = q;
            tap
        })
        .collect())
}

#[derive(Clone, Copy, Debug)]
enum Axis {
    Rows,
    Columns,
}

/// One separable pass of `kernel` along `axis` with clamped edges; `src` and `dst` are
/// premultiplied RGBA8 buffers of `width x height`.
fn convolve(src: &[u8], dst: &mut [u8], width: u32, height: u32, kernel: &[u32], axis: Axis) {
    let (w, h) = (width as usize, height as usize);
    let (lines, len, line_stride, step) = match axis {
        Axis::Rows => (h, w, w * 4, 4),
        Axis::Columns => (w, h, 4, w * 4),
    };
    let radius = kernel.len() / 2;
    for line in 0..lines {
        let base = line * line_stride;
        for i in 0..len {
            let mut acc = [0u64; 4];
            for (k, &weight) in kernel.iter().enumerate() {
                let at = base + (i + k).saturating_sub(radius).min(len - 1) * step;
                for (a, &c) in acc.iter_mut().zip(&src[at..at + 4]) {
                    *a += u64::from(weight) * u64::from(c);
                }
            }
            let out = base + i * step;
            for (d, a) in dst[out..out + 4].iter_mut().zip(acc) {
                *d = ((a + 32768) >> 16).min(255) as u8;
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/blur.rs"]
mod tests;
