//! Scale pyramid over `image` buffers.

use image::imageops::{resize, FilterType};
use image::GrayImage as LumaImage;
use pcb_inspect_core::GrayImage;

/// One pyramid level.
#[derive(Clone, Debug)]
pub(crate) struct Level {
    pub image: LumaImage,
    /// Multiply level coordinates by this to get full-resolution coordinates.
    pub scale: f32,
}

/// Copy a core gray image into an `image` buffer; `None` if the buffer
/// length disagrees with the dimensions.
pub(crate) fn to_luma(img: &GrayImage) -> Option<LumaImage> {
    LumaImage::from_raw(img.width as u32, img.height as u32, img.data.clone())
}

/// Largest level count whose last level still has both sides `>= min_side`.
pub(crate) fn reachable_levels(width: u32, height: u32, scale_factor: f32, min_side: u32) -> usize {
    let side = width.min(height) as f32;
    let min_side = min_side.max(1) as f32;
    if side < min_side || scale_factor <= 1.0 {
        return 1;
    }
    1 + ((side / min_side).ln() / scale_factor.ln()).floor() as usize
}

/// Build up to `n_levels` images, each `scale_factor` smaller than the
/// previous, resampled from `base` with a triangle filter.
///
/// Construction stops early once a level would be smaller than `min_side`.
pub(crate) fn build_pyramid(
    base: &LumaImage,
    n_levels: usize,
    scale_factor: f32,
    min_side: u32,
) -> Vec<Level> {
    let (bw, bh) = base.dimensions();
    let n_levels = n_levels
        .min(reachable_levels(bw, bh, scale_factor, min_side))
        .max(1);
    let mut levels = Vec::with_capacity(n_levels);
    levels.push(Level {
        image: base.clone(),
        scale: 1.0,
    });
    for i in 1..n_levels {
        let scale = scale_factor.powi(i as i32);
        let w = (bw as f32 / scale).round() as u32;
        let h = (bh as f32 / scale).round() as u32;
        if w < min_side || h < min_side {
            break;
        }
        levels.push(Level {
            image: resize(base, w, h, FilterType::Triangle),
            scale,
        });
    }
    levels
}
