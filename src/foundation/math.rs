use crate::foundation::core::Fraction;

pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Convert a straight-alpha RGBA8 buffer to premultiplied alpha in place.
pub(crate) fn premultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = mul_div255_u8(u16::from(*c), a);
        }
    }
}

/// Convert a premultiplied RGBA8 buffer back to straight alpha.
pub(crate) fn unpremultiply(rgba: &[u8]) -> Vec<u8> {
    let mut out = rgba.to_vec();
    for px in out.chunks_exact_mut(4) {
        let a = u32::from(px[3]);
        if a == 0 {
            px[..3].fill(0);
            continue;
        }
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u32::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
    out
}

/// Inclusive 1-based frame span covered by `duration` seconds starting at `position` seconds.
///
/// `None` when the span holds no frame.
pub(crate) fn frame_span(position: f64, duration: f64, fps: Fraction) -> Option<(u64, u64)> {
    let rate = fps.to_f64();
    let first = (position * rate).round().max(0.0) as u64 + 1;
    let last = ((position + duration.max(0.0)) * rate).round().max(0.0) as u64;
    (last >= first).then_some((first, last))
}

/// Whole frames in `seconds` at `fps`, rounded.
pub(crate) fn seconds_to_frames(seconds: f64, fps: Fraction) -> u64 {
    (seconds * fps.to_f64()).round().max(0.0) as u64
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
