//! FAST-9 corner detection with non-maximum suppression and Harris ranking.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::corners::{corners_fast9, Corner};
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use imageproc::suppress::local_maxima;

type Gradient = ImageBuffer<Luma<i16>, Vec<i16>>;

/// Detect FAST-9 corners at least `border` pixels away from every edge and
/// suppress non-maxima in a 3×3 neighbourhood.
///
/// Among equal scores the first in raster order survives. Output is in
/// raster order.
pub(crate) fn detect(img: &GrayImage, threshold: u8, border: u32) -> Vec<Corner> {
    let (w, h) = img.dimensions();
    let border = border.max(3);
    if w <= 2 * border || h <= 2 * border {
        return Vec::new();
    }
    let inside: Vec<Corner> = corners_fast9(img, threshold)
        .into_iter()
        .filter(|c| c.x >= border && c.y >= border && c.x < w - border && c.y < h - border)
        .collect();
    local_maxima(&inside, 1)
}

/// Sobel gradients of one level, for Harris responses at many points.
pub(crate) struct HarrisMap {
    gx: Gradient,
    gy: Gradient,
}

impl HarrisMap {
    pub fn new(img: &GrayImage) -> Self {
        Self {
            gx: horizontal_sobel(img),
            gy: vertical_sobel(img),
        }
    }

    /// Harris corner response over a `block × block` window centred on
    /// `(x, y)`.
    ///
    /// The caller guarantees the window lies inside the image.
    pub fn response(&self, x: u32, y: u32, block: u32, k: f32) -> f32 {
        let r = block / 2;
        let (mut a, mut b, mut c) = (0.0f64, 0.0f64, 0.0f64);
        for yy in y - r..=y + r {
            for xx in x - r..=x + r {
                let gx = self.gx.get_pixel(xx, yy)[0] as f64;
                let gy = self.gy.get_pixel(xx, yy)[0] as f64;
                a += gx * gx;
                b += gy * gy;
                c += gx * gy;
            }
        }
        let det = a * b - c * c;
        let trace = a + b;
        (det - k as f64 * trace * trace) as f32
    }
}
