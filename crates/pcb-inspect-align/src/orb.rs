//! Oriented FAST + rotated BRIEF keypoints over a scale pyramid.

use crate::descriptor::{describe, orientation, Descriptor};
use crate::fast;
use crate::pyramid::{build_pyramid, to_luma};
use crate::OrbParams;
use imageproc::corners::Corner;
use imageproc::filter::gaussian_blur_f32;
use nalgebra::Point2;
use pcb_inspect_core::GrayImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

const HARRIS_BLOCK: u32 = 7;
const BLUR_SIGMA: f32 = 2.0;
const MAX_BORDER: usize = 1 << 20;

/// A detected feature in full-resolution image coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct Keypoint {
    pub position: Point2<f32>,
    /// Dominant orientation in radians.
    pub angle: f32,
    /// Pyramid level the keypoint was found on.
    pub octave: usize,
    /// Harris response used for ranking.
    pub response: f32,
    pub descriptor: Descriptor,
}

/// ORB-style detector/descriptor.
#[derive(Clone, Debug, Default)]
pub struct OrbDetector {
    params: OrbParams,
}

impl OrbDetector {
    pub fn new(params: OrbParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &OrbParams {
        &self.params
    }

    /// Detect and describe up to `max_features` keypoints.
    ///
    /// The feature budget is split across levels geometrically, so coarse
    /// levels get proportionally fewer keypoints. Images without texture
    /// yield an empty list.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "debug", skip(self, img), fields(w = img.width, h = img.height))
    )]
    pub fn detect(&self, img: &GrayImage) -> Vec<Keypoint> {
        let p = &self.params;
        if p.max_features == 0 || p.n_levels == 0 {
            return Vec::new();
        }
        let Some(base) = to_luma(img) else {
            log::warn!(
                "orb: {}x{} image with {} bytes, skipping",
                img.width,
                img.height,
                img.data.len()
            );
            return Vec::new();
        };
        let border = p
            .edge_threshold
            .max(p.patch_size / 2 + 1)
            .max(HARRIS_BLOCK as usize / 2 + 2)
            .min(MAX_BORDER) as u32;
        let scale_factor = p.scale_factor.max(1.0001);
        let levels = build_pyramid(&base, p.n_levels, scale_factor, 2 * border + 1);
        let budget = features_per_level(p.max_features, scale_factor, levels.len());
        let radius = (p.patch_size / 2) as u32;

        let mut out = Vec::new();
        for (octave, (level, &n_wanted)) in levels.iter().zip(&budget).enumerate() {
            if n_wanted == 0 {
                continue;
            }
            let corners = fast::detect(&level.image, p.fast_threshold, border);
            if corners.is_empty() {
                continue;
            }

            let harris = fast::HarrisMap::new(&level.image);
            let mut ranked: Vec<(f32, Corner)> = corners
                .into_iter()
                .map(|c| (harris.response(c.x, c.y, HARRIS_BLOCK, p.harris_k), c))
                .collect();
            ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
            ranked.truncate(n_wanted);

            let smoothed = gaussian_blur_f32(&level.image, BLUR_SIGMA);
            for (response, c) in ranked {
                let angle = orientation(&level.image, c.x, c.y, radius);
                let descriptor = describe(&smoothed, c.x, c.y, angle);
                out.push(Keypoint {
                    position: Point2::new(c.x as f32 * level.scale, c.y as f32 * level.scale),
                    angle,
                    octave,
                    response,
                    descriptor,
                });
            }
        }

        log::debug!(
            "orb: {} keypoints over {} levels ({}x{})",
            out.len(),
            levels.len(),
            img.width,
            img.height
        );
        out
    }
}

/// Split `total` features over `n_levels` so each level gets `1/scale` of
/// the previous one; the last level takes the remainder.
fn features_per_level(total: usize, scale_factor: f32, n_levels: usize) -> Vec<usize> {
    if n_levels == 0 {
        return Vec::new();
    }
    let factor = 1.0 / scale_factor as f64;
    let mut desired = if (1.0 - factor).abs() < 1e-9 {
        total as f64 / n_levels as f64
    } else {
        total as f64 * (1.0 - factor) / (1.0 - factor.powi(n_levels as i32))
    };

    let mut out = Vec::with_capacity(n_levels);
    let mut sum = 0usize;
    for _ in 0..n_levels - 1 {
        let n = (desired.round() as usize).min(total - sum);
        out.push(n);
        sum += n;
        desired *= factor;
    }
    out.push(total - sum);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn blocky_texture(w: usize, h: usize, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut img = GrayImage::new(w, h);
        for _ in 0..120 {
            let bw = rng.gen_range(6..30);
            let bh = rng.gen_range(6..30);
            let x0 = rng.gen_range(0..w - bw);
            let y0 = rng.gen_range(0..h - bh);
            let v: u8 = rng.gen_range(0..=255);
            for y in y0..y0 + bh {
                for x in x0..x0 + bw {
                    img.data[y * w + x] = v;
                }
            }
        }
        img
    }

    #[test]
    fn budget_sums_to_total_and_decreases() {
        let b = features_per_level(5000, 1.2, 8);
        assert_eq!(b.len(), 8);
        assert_eq!(b.iter().sum::<usize>(), 5000);
        assert!(b.windows(2).take(6).all(|w| w[0] >= w[1]));
        assert_eq!(features_per_level(10, 1.2, 1), vec![10]);
    }

    #[test]
    fn textureless_image_yields_no_keypoints() {
        let img = GrayImage {
            width: 200,
            height: 200,
            data: vec![200; 40_000],
        };
        assert!(OrbDetector::default().detect(&img).is_empty());
    }

    #[test]
    fn detection_is_deterministic_and_bounded() {
        let img = blocky_texture(320, 240, 7);
        let params = OrbParams {
            max_features: 300,
            ..OrbParams::default()
        };
        let det = OrbDetector::new(params);
        let a = det.detect(&img);
        let b = det.detect(&img);
        assert!(!a.is_empty());
        assert!(a.len() <= 300);
        assert_eq!(a, b);
        for kp in &a {
            assert!(kp.position.x >= 0.0 && kp.position.x < 320.0);
            assert!(kp.position.y >= 0.0 && kp.position.y < 240.0);
        }
    }

    #[test]
    fn oversized_config_values_do_not_panic() {
        let img = blocky_texture(160, 120, 5);
        let det = OrbDetector::new(OrbParams {
            n_levels: usize::MAX,
            ..OrbParams::default()
        });
        assert!(!det.detect(&img).is_empty());

        let det = OrbDetector::new(OrbParams {
            edge_threshold: usize::MAX,
            ..OrbParams::default()
        });
        assert!(det.detect(&img).is_empty());
    }

    #[test]
    fn translated_image_reproduces_level_zero_descriptors() {
        let big = blocky_texture(300, 300, 11);
        let crop = |ox: usize, oy: usize| {
            let mut img = GrayImage::new(220, 220);
            for y in 0..220 {
                for x in 0..220 {
                    img.data[y * 220 + x] = big.get(x + ox, y + oy);
                }
            }
            img
        };
        let det = OrbDetector::default();
        let a = det.detect(&crop(0, 0));
        let b = det.detect(&crop(10, 6));

        let shared = a
            .iter()
            .filter(|k| k.octave == 0)
            .filter(|ka| {
                b.iter().any(|kb| {
                    kb.octave == 0
                        && kb.descriptor == ka.descriptor
                        && (kb.position.x + 10.0 - ka.position.x).abs() < 0.5
                        && (kb.position.y + 6.0 - ka.position.y).abs() < 0.5
                })
            })
            .count();
        assert!(shared >= 10, "only {shared} identical level-0 features");
    }
}
