//! Outlier-robust homography fitting.
//!
//! Minimal four-point samples are drawn from a seeded generator so a given
//! correspondence set always yields the same model. The best consensus set is
//! refit with the least-squares DLT.

use crate::{estimate_homography, homography_from_4pt, Homography};
use nalgebra::Point2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const SAMPLE_SIZE: usize = 4;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HomographyError {
    #[error("too few correspondences: need {needed}, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("source and destination lengths differ ({src} vs {dst})")]
    LengthMismatch { src: usize, dst: usize },
    #[error("no non-degenerate homography fits {correspondences} correspondences")]
    Degenerate { correspondences: usize },
}

/// RANSAC settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RansacParams {
    /// Hard cap on sampling iterations.
    pub max_iters: usize,
    /// Maximum reprojection error (pixels) for a correspondence to count as inlier.
    pub reproj_threshold: f64,
    /// Desired probability of drawing at least one all-inlier sample; drives
    /// early termination.
    pub confidence: f64,
    /// Seed for the sampling generator.
    pub seed: u64,
}

impl Default for RansacParams {
    fn default() -> Self {
        Self {
            max_iters: 2000,
            reproj_threshold: 3.0,
            confidence: 0.995,
            seed: 0,
        }
    }
}

/// Result of a RANSAC fit.
#[derive(Clone, Debug)]
pub struct RansacHomography {
    pub homography: Homography,
    /// `true` for correspondences consistent with `homography`.
    pub inlier_mask: Vec<bool>,
    pub num_inliers: usize,
    pub iterations: usize,
}

/// Fit `dst ~ H * src` robustly.
pub fn find_homography_ransac(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Result<RansacHomography, HomographyError> {
    if src.len() != dst.len() {
        return Err(HomographyError::LengthMismatch {
            src: src.len(),
            dst: dst.len(),
        });
    }
    let n = src.len();
    if n < SAMPLE_SIZE {
        return Err(HomographyError::TooFewPoints {
            needed: SAMPLE_SIZE,
            got: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let thr2 = params.reproj_threshold * params.reproj_threshold;

    let mut best: Option<(Homography, Vec<bool>, usize)> = None;
    let mut needed = params.max_iters.max(1);
    let mut iter = 0usize;

    while iter < needed {
        iter += 1;

        let idx = sample_indices(&mut rng, n, SAMPLE_SIZE);
        let s4 = [src[idx[0]], src[idx[1]], src[idx[2]], src[idx[3]]];
        let d4 = [dst[idx[0]], dst[idx[1]], dst[idx[2]], dst[idx[3]]];
        let Some(h) = homography_from_4pt(&s4, &d4) else {
            continue;
        };

        let (mask, count) = consensus(&h, src, dst, thr2);
        let improves = best.as_ref().is_none_or(|(_, _, c)| count > *c);
        if improves {
            needed = required_iterations(params.confidence, count as f64 / n as f64, needed);
            best = Some((h, mask, count));
        }
    }

    let Some((best_h, best_mask, best_count)) = best else {
        return Err(HomographyError::Degenerate { correspondences: n });
    };
    if best_count < SAMPLE_SIZE {
        return Err(HomographyError::Degenerate { correspondences: n });
    }

    let inlier_src: Vec<Point2<f32>> = (0..n).filter(|&i| best_mask[i]).map(|i| src[i]).collect();
    let inlier_dst: Vec<Point2<f32>> = (0..n).filter(|&i| best_mask[i]).map(|i| dst[i]).collect();

    // The refit may not improve on the minimal model; keep whichever explains more.
    let mut homography = best_h;
    let mut inlier_mask = best_mask;
    let mut num_inliers = best_count;
    if let Some(refit) = estimate_homography(&inlier_src, &inlier_dst).filter(|h| h.is_usable())
    {
        let (mask, count) = consensus(&refit, src, dst, thr2);
        if count >= num_inliers {
            homography = refit;
            inlier_mask = mask;
            num_inliers = count;
        }
    }

    if !homography.is_usable() {
        return Err(HomographyError::Degenerate { correspondences: n });
    }

    log::trace!(
        "ransac: {}/{} inliers after {} iterations",
        num_inliers,
        n,
        iter
    );

    Ok(RansacHomography {
        homography,
        inlier_mask,
        num_inliers,
        iterations: iter,
    })
}

fn consensus(
    h: &Homography,
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    thr2: f64,
) -> (Vec<bool>, usize) {
    let mut count = 0usize;
    let mask = src
        .iter()
        .zip(dst)
        .map(|(s, d)| {
            let (u, v) = h.apply_f64(s.x as f64, s.y as f64);
            let du = u - d.x as f64;
            let dv = v - d.y as f64;
            let ok = du * du + dv * dv <= thr2;
            count += ok as usize;
            ok
        })
        .collect();
    (mask, count)
}

/// Iterations needed to reach `confidence` for the given inlier ratio, never
/// exceeding `current`.
fn required_iterations(confidence: f64, inlier_ratio: f64, current: usize) -> usize {
    let good_sample = inlier_ratio.powi(SAMPLE_SIZE as i32);
    if good_sample >= 1.0 {
        return 1;
    }
    let denom = (1.0 - good_sample).ln();
    let num = (1.0 - confidence.clamp(0.0, 1.0 - 1e-12)).ln();
    if denom >= 0.0 || !denom.is_finite() {
        return current;
    }
    let k = (num / denom).ceil();
    if k.is_finite() && k >= 0.0 && (k as usize) < current {
        (k as usize).max(1)
    } else {
        current
    }
}

/// Sample `k` distinct indices from `0..n` using a partial Fisher–Yates shuffle.
fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    debug_assert!(k <= n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}
