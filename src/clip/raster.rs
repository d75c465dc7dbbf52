use kurbo::{Affine, Point, Rect, Vec2};

use crate::clip::{Gravity, ScaleMode};
use crate::frame::audio::AudioBuffer;

/// Transform keyframes resolved at one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Placement {
    pub(crate) location_x: f64,
    pub(crate) location_y: f64,
    pub(crate) scale_x: f64,
    pub(crate) scale_y: f64,
    pub(crate) rotation: f64,
    pub(crate) shear_x: f64,
    pub(crate) shear_y: f64,
    pub(crate) origin_x: f64,
    pub(crate) origin_y: f64,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            location_x: 0.0,
            location_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            rotation: 0.0,
            shear_x: 0.0,
            shear_y: 0.0,
            origin_x: 0.5,
            origin_y: 0.5,
        }
    }
}

/// Source-pixel to canvas-pixel transform for a `src`-sized image placed on a `canvas`.
///
/// The source is sized by `scale`, multiplied by the scale keyframes, snapped to `gravity`,
/// offset by `location` (fractions of the canvas) and finally rotated and sheared about its
/// origin point.
pub(crate) fn placement_affine(
    src: (u32, u32),
    canvas: (u32, u32),
    scale: ScaleMode,
    gravity: Gravity,
    p: &Placement,
) -> Affine {
    let (sw, sh) = (f64::from(src.0), f64::from(src.1));
    let (cw, ch) = (f64::from(canvas.0), f64::from(canvas.1));
    if sw <= 0.0 || sh <= 0.0 {
        return Affine::scale(0.0);
    }
    let (fit_w, fit_h) = match scale {
        ScaleMode::Fit => {
            let r = (cw / sw).min(ch / sh);
            (sw * r, sh * r)
        }
        ScaleMode::Crop => {
            let r = (cw / sw).max(ch / sh);
            (sw * r, sh * r)
        }
        ScaleMode::Stretch => (cw, ch),
        ScaleMode::None => (sw, sh),
    };
    let (w, h) = (fit_w * p.scale_x, fit_h * p.scale_y);
    let (ax, ay) = gravity.anchor();
    let x = ax * (cw - w) + p.location_x * cw;
    let y = ay * (ch - h) + p.location_y * ch;

    let mut affine = Affine::scale_non_uniform(w / sw, h / sh);
    if p.rotation != 0.0 || p.shear_x != 0.0 || p.shear_y != 0.0 {
        let origin = Vec2::new(w * p.origin_x, h * p.origin_y);
        affine = Affine::translate(origin)
            * Affine::rotate(p.rotation.to_radians())
            * Affine::skew(p.shear_x, p.shear_y)
            * Affine::translate(-origin)
            * affine;
    }
    Affine::translate((x, y)) * affine
}

/// Viewport transform: zoom by `scale` about the canvas centre, then pan by fractions of it.
pub(crate) fn viewport_affine(canvas: (u32, u32), scale: f64, x: f64, y: f64) -> Affine {
    let (cw, ch) = (f64::from(canvas.0), f64::from(canvas.1));
    let center = Vec2::new(cw / 2.0, ch / 2.0);
    Affine::translate(center + Vec2::new(x * cw, y * ch))
        * Affine::scale(scale)
        * Affine::translate(-center)
}

/// Projective map from the unit square onto a quadrilateral.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Homography {
    m: [[f64; 3]; 3],
}

impl Homography {
    /// Map `(0,0), (1,0), (1,1), (0,1)` onto `quad` (same order).
    pub(crate) fn square_to_quad(quad: [Point; 4]) -> Option<Self> {
        let [p0, p1, p2, p3] = quad;
        let dx1 = p1.x - p2.x;
        let dx2 = p3.x - p2.x;
        let dx3 = p0.x - p1.x + p2.x - p3.x;
        let dy1 = p1.y - p2.y;
        let dy2 = p3.y - p2.y;
        let dy3 = p0.y - p1.y + p2.y - p3.y;

        let (g, h) = if dx3.abs() < 1e-12 && dy3.abs() < 1e-12 {
            (0.0, 0.0)
        } else {
            let det = dx1 * dy2 - dx2 * dy1;
            if det.abs() < 1e-12 {
                return None;
            }
            (
                (dx3 * dy2 - dx2 * dy3) / det,
                (dx1 * dy3 - dx3 * dy1) / det,
            )
        };
        Some(Self {
            m: [
                [p1.x - p0.x + g * p1.x, p3.x - p0.x + h * p3.x, p0.x],
                [p1.y - p0.y + g * p1.y, p3.y - p0.y + h * p3.y, p0.y],
                [g, h, 1.0],
            ],
        })
    }

    pub(crate) fn apply(&self, p: Point) -> Option<Point> {
        let m = &self.m;
        let w = m[2][0] * p.x + m[2][1] * p.y + m[2][2];
        if w.abs() < 1e-12 {
            return None;
        }
        Some(Point::new(
            (m[0][0] * p.x + m[0][1] * p.y + m[0][2]) / w,
            (m[1][0] * p.x + m[1][1] * p.y + m[1][2]) / w,
        ))
    }

    pub(crate) fn inverse(&self) -> Option<Self> {
        let m = &self.m;
        let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
            m[r0][c0] * m[r1][c1] - m[r0][c1] * m[r1][c0]
        };
        let adj = [
            [cof(1, 2, 1, 2), -cof(0, 2, 1, 2), cof(0, 1, 1, 2)],
            [-cof(1, 2, 0, 2), cof(0, 2, 0, 2), -cof(0, 1, 0, 2)],
            [cof(1, 2, 0, 1), -cof(0, 2, 0, 1), cof(0, 1, 0, 1)],
        ];
        let det = m[0][0] * adj[0][0] + m[0][1] * adj[1][0] + m[0][2] * adj[2][0];
        if det.abs() < 1e-12 || !det.is_finite() {
            return None;
        }
        let mut inv = [[0.0; 3]; 3];
        for (r, row) in adj.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                inv[r][c] = v / det;
            }
        }
        Some(Self { m: inv })
    }
}

/// Everything needed to resample a source image onto the canvas.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Warp {
    /// Source (after perspective) to canvas.
    pub(crate) affine: Affine,
    /// Unit square to the perspective quad in source pixels.
    pub(crate) perspective: Option<Homography>,
    /// Visible source rectangle in source pixels.
    pub(crate) crop: Option<Rect>,
}

/// Resample premultiplied `src` through `warp` into `dst` (bilinear, transparent outside).
///
/// Returns `false` without touching `dst` when the transform is degenerate.
pub(crate) fn warp_into(
    dst: &mut [u8],
    dst_size: (u32, u32),
    src: &[u8],
    src_size: (u32, u32),
    warp: &Warp,
) -> bool {
    let det = warp.affine.determinant();
    if !det.is_finite() || det.abs() < 1e-12 || src_size.0 == 0 || src_size.1 == 0 {
        return false;
    }
    let inverse = warp.affine.inverse();
    let unproject = match warp.perspective {
        Some(h) => match h.inverse() {
            Some(inv) => Some(inv),
            None => return false,
        },
        None => None,
    };
    let (sw, sh) = (f64::from(src_size.0), f64::from(src_size.1));
    let dw = dst_size.0 as usize;
    if dw == 0 {
        return true;
    }

    for (y, row) in dst.chunks_exact_mut(dw * 4).enumerate() {
        for (x, px) in row.chunks_exact_mut(4).enumerate() {
            let canvas = Point::new(x as f64 + 0.5, y as f64 + 0.5);
            let mut s = inverse * canvas;
            if let Some(inv) = &unproject {
                match inv.apply(s) {
                    Some(unit) => s = Point::new(unit.x * sw, unit.y * sh),
                    None => {
                        px.fill(0);
                        continue;
                    }
                }
            }
            let inside = s.x >= 0.0 && s.y >= 0.0 && s.x < sw && s.y < sh;
            let visible = warp.crop.is_none_or(|r| r.contains(s));
            if inside && visible {
                px.copy_from_slice(&sample_bilinear(src, src_size, s));
            } else {
                px.fill(0);
            }
        }
    }
    true
}

fn sample_bilinear(src: &[u8], size: (u32, u32), p: Point) -> [u8; 4] {
    let (w, h) = (i64::from(size.0), i64::from(size.1));
    let fx = p.x - 0.5;
    let fy = p.y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let texel = |x: i64, y: i64| {
        let idx = ((y.clamp(0, h - 1) * w + x.clamp(0, w - 1)) as usize) * 4;
        [src[idx], src[idx + 1], src[idx + 2], src[idx + 3]]
    };
    let taps = [
        (texel(x0, y0), (1.0 - tx) * (1.0 - ty)),
        (texel(x0 + 1, y0), tx * (1.0 - ty)),
        (texel(x0, y0 + 1), (1.0 - tx) * ty),
        (texel(x0 + 1, y0 + 1), tx * ty),
    ];
    let mut out = [0u8; 4];
    for (c, slot) in out.iter_mut().enumerate() {
        let v: f64 = taps.iter().map(|(t, wgt)| f64::from(t[c]) * wgt).sum();
        *slot = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Peak waveform of `audio` drawn in `color` on a transparent `width x height` image.
pub(crate) fn render_waveform(audio: &AudioBuffer, width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    let (w, h) = (width as usize, height as usize);
    let mut image = vec![0u8; w * h * 4];
    if w == 0 || h == 0 {
        return image;
    }
    let samples = audio.sample_count();
    let mid = (h as f64 - 1.0) / 2.0;
    for x in 0..w {
        let from = x * samples / w;
        let to = ((x + 1) * samples / w).max(from + 1).min(samples);
        let peak = audio
            .channels
            .iter()
            .flat_map(|ch| ch.get(from..to).unwrap_or(&[]))
            .fold(0.0f32, |acc, s| acc.max(s.abs()))
            .min(1.0);
        let reach = f64::from(peak) * mid;
        let top = (mid - reach).floor().max(0.0) as usize;
        let bottom = ((mid + reach).ceil() as usize).min(h - 1);
        for y in top..=bottom {
            let idx = (y * w + x) * 4;
            image[idx..idx + 4].copy_from_slice(&color);
        }
    }
    image
}

#[cfg(test)]
#[path = "../../tests/unit/clip/raster.rs"]
mod tests;
