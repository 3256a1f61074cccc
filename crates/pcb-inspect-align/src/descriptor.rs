//! Intensity-centroid orientation and steered binary descriptors.

use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::OnceLock;

pub const DESCRIPTOR_BYTES: usize = 32;
const N_PAIRS: usize = DESCRIPTOR_BYTES * 8;
const PATTERN_RADIUS: i8 = 13;
const PATTERN_SEED: u64 = 0x0b5e_55ed_da7a_b175;

/// 256-bit binary descriptor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Descriptor(pub [u8; DESCRIPTOR_BYTES]);

impl Descriptor {
    /// Number of differing bits.
    #[inline]
    pub fn hamming(&self, other: &Descriptor) -> u32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a ^ b).count_ones())
            .sum()
    }

    pub fn as_bytes(&self) -> &[u8; DESCRIPTOR_BYTES] {
        &self.0
    }
}

/// Point pairs `(x1, y1, x2, y2)` compared by each descriptor bit.
fn pattern() -> &'static [[i8; 4]; N_PAIRS] {
    static PATTERN: OnceLock<[[i8; 4]; N_PAIRS]> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let mut rng = StdRng::seed_from_u64(PATTERN_SEED);
        let mut pairs = [[0i8; 4]; N_PAIRS];
        for pair in pairs.iter_mut() {
            loop {
                let p: [i8; 4] =
                    std::array::from_fn(|_| rng.gen_range(-PATTERN_RADIUS..=PATTERN_RADIUS));
                if p[0] != p[2] || p[1] != p[3] {
                    *pair = p;
                    break;
                }
            }
        }
        pairs
    })
}

/// Orientation (radians) of the intensity centroid inside a disc of `radius`
/// centred at `(x, y)`.
///
/// The caller guarantees the disc lies inside the image.
pub(crate) fn orientation(img: &GrayImage, x: u32, y: u32, radius: u32) -> f32 {
    let r = radius as i64;
    let r2 = r * r;
    let (mut m01, mut m10) = (0i64, 0i64);
    for dy in -r..=r {
        let yy = (y as i64 + dy) as u32;
        for dx in -r..=r {
            if dx * dx + dy * dy > r2 {
                continue;
            }
            let v = img.get_pixel((x as i64 + dx) as u32, yy)[0] as i64;
            m10 += dx * v;
            m01 += dy * v;
        }
    }
    (m01 as f32).atan2(m10 as f32)
}

/// Describe the keypoint at `(x, y)` by comparing rotated point pairs on the
/// smoothed level image. Samples outside the image clamp to the border.
pub(crate) fn describe(smoothed: &GrayImage, x: u32, y: u32, angle: f32) -> Descriptor {
    let (sin, cos) = angle.sin_cos();
    let (w, h) = (smoothed.width() as i64, smoothed.height() as i64);
    let sample = |px: i8, py: i8| -> u8 {
        let (px, py) = (px as f32, py as f32);
        let rx = (cos * px - sin * py).round() as i64;
        let ry = (sin * px + cos * py).round() as i64;
        let sx = (x as i64 + rx).clamp(0, w - 1) as u32;
        let sy = (y as i64 + ry).clamp(0, h - 1) as u32;
        smoothed.get_pixel(sx, sy)[0]
    };

    let mut bytes = [0u8; DESCRIPTOR_BYTES];
    for (bit, p) in pattern().iter().enumerate() {
        if sample(p[0], p[1]) < sample(p[2], p[3]) {
            bytes[bit / 8] |= 1 << (bit % 8);
        }
    }
    Descriptor(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn hamming_counts_bits() {
        let a = Descriptor([0u8; 32]);
        let mut b = a;
        b.0[0] = 0b1011;
        b.0[31] = 0xff;
        assert_eq!(a.hamming(&b), 11);
        assert_eq!(b.hamming(&b), 0);
    }

    #[test]
    fn pattern_is_stable_and_in_range() {
        let p = pattern();
        assert!(std::ptr::eq(p, pattern()));
        for pair in p.iter() {
            assert!(pair.iter().all(|v| (-13..=13).contains(v)));
            assert!(pair[0] != pair[2] || pair[1] != pair[3]);
        }
    }

    #[test]
    fn orientation_points_towards_bright_side() {
        let right = GrayImage::from_fn(41, 41, |x, _| Luma([if x > 20 { 200 } else { 0 }]));
        approx::assert_abs_diff_eq!(orientation(&right, 20, 20, 15), 0.0, epsilon = 1e-4);

        let below = GrayImage::from_fn(41, 41, |_, y| Luma([if y > 20 { 200 } else { 0 }]));
        approx::assert_abs_diff_eq!(
            orientation(&below, 20, 20, 15),
            std::f32::consts::FRAC_PI_2,
            epsilon = 1e-4
        );
    }

    #[test]
    fn uniform_patch_has_empty_descriptor() {
        let img = GrayImage::from_pixel(40, 40, Luma([90]));
        assert_eq!(describe(&img, 20, 20, 0.7), Descriptor([0; 32]));
    }
}
