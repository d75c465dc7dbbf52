use crate::foundation::error::{MontageError, MontageResult};
use crate::foundation::math::mul_div255_u8;

/// Source-over of premultiplied `src` onto `dst`, pixel by pixel. Layer opacity is expected to be
/// folded into `src` beforehand with [`scale_alpha_in_place`].
pub(crate) fn over_in_place(dst: &mut [u8], src: &[u8]) -> MontageResult<()> {
    if dst.len() != src.len() || !dst.len().is_multiple_of(4) {
        return Err(MontageError::validation(
            "over_in_place expects equal-length rgba8 buffers",
        ));
    }
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        blend_pixel(d, s);
    }
    Ok(())
}

fn blend_pixel(dst: &mut [u8], src: &[u8]) {
    match src[3] {
        0 => {}
        255 => dst.copy_from_slice(src),
        alpha => {
            let keep = 255 - u16::from(alpha);
            for (d, &s) in dst.iter_mut().zip(src) {
                *d = s.saturating_add(mul_div255_u8(u16::from(*d), keep));
            }
        }
    }
}

/// Scale every channel of a premultiplied buffer by `alpha` in `0..=1`.
pub(crate) fn scale_alpha_in_place(image: &mut [u8], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha >= 1.0 {
        return;
    }
    let op = (alpha * 255.0).round() as u16;
    for c in image.iter_mut() {
        *c = mul_div255_u8(u16::from(*c), op);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/effects/composite.rs"]
mod tests;
