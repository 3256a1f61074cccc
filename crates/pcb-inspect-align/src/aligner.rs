//! Feature-based registration of a test image onto a reference frame.

use crate::matcher::{match_cross_checked, retain_best_fraction};
use crate::{AlignError, AlignParams, Descriptor, Keypoint, OrbDetector};
use nalgebra::Point2;
use pcb_inspect_core::{
    find_homography_ransac, warp_perspective, HomographyError, RansacHomography, RansacParams,
    RasterImage,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Fewest correspondences a homography can be estimated from.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Diagnostics of one alignment call.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentSummary {
    pub test_keypoints: usize,
    pub reference_keypoints: usize,
    /// Mutual-best matches before the distance cut.
    pub cross_checked_matches: usize,
    /// Matches handed to the robust estimator.
    pub retained_matches: usize,
    /// RANSAC consensus size; `None` when no homography was estimated.
    pub inliers: Option<usize>,
    /// Test-to-reference transform, row-major.
    pub homography: Option<[[f64; 3]; 3]>,
    /// `false` when too few correspondences were found and the test image
    /// was passed through unchanged.
    pub warped: bool,
}

/// Result of [`FeatureAligner::align_with_report`].
#[derive(Clone, Debug)]
pub struct Alignment {
    pub image: RasterImage,
    pub summary: AlignmentSummary,
}

/// Aligns test images onto reference images with ORB features and a
/// RANSAC homography.
#[derive(Clone, Debug, Default)]
pub struct FeatureAligner {
    params: AlignParams,
    detector: OrbDetector,
}

impl FeatureAligner {
    pub fn new(params: AlignParams) -> Self {
        let detector = OrbDetector::new(params.orb.clone());
        Self { params, detector }
    }

    pub fn params(&self) -> &AlignParams {
        &self.params
    }

    /// Warp `test` into the pixel frame of `reference`.
    ///
    /// With fewer than [`MIN_CORRESPONDENCES`] retained matches the result is
    /// an unmodified copy of `test`.
    pub fn align(
        &self,
        test: &RasterImage,
        reference: &RasterImage,
    ) -> Result<RasterImage, AlignError> {
        self.align_with_report(test, reference).map(|a| a.image)
    }

    /// Same as [`FeatureAligner::align`], also returning match and RANSAC
    /// statistics.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, test, reference), fields(
            test_w = test.width(), test_h = test.height(),
            ref_w = reference.width(), ref_h = reference.height()
        ))
    )]
    pub fn align_with_report(
        &self,
        test: &RasterImage,
        reference: &RasterImage,
    ) -> Result<Alignment, AlignError> {
        let test_kps = self.detector.detect(&test.to_gray());
        let ref_kps = self.detector.detect(&reference.to_gray());

        let matches = match_cross_checked(&descriptors(&test_kps), &descriptors(&ref_kps));
        let cross_checked = matches.len();
        let retained = retain_best_fraction(matches, self.params.keep_ratio);

        let mut summary = AlignmentSummary {
            test_keypoints: test_kps.len(),
            reference_keypoints: ref_kps.len(),
            cross_checked_matches: cross_checked,
            retained_matches: retained.len(),
            ..AlignmentSummary::default()
        };
        log::debug!(
            "align: keypoints test={} ref={}, matches cross-checked={} retained={}",
            summary.test_keypoints,
            summary.reference_keypoints,
            cross_checked,
            retained.len()
        );

        if retained.len() < MIN_CORRESPONDENCES {
            log::debug!(
                "align: {} correspondences (< {}), passing test image through",
                retained.len(),
                MIN_CORRESPONDENCES
            );
            return Ok(Alignment {
                image: test.clone(),
                summary,
            });
        }

        let src: Vec<Point2<f32>> = retained.iter().map(|m| test_kps[m.query].position).collect();
        let dst: Vec<Point2<f32>> = retained.iter().map(|m| ref_kps[m.train].position).collect();
        let fit = fit_correspondences(&src, &dst, &self.params.ransac)?;

        let image = warp_perspective(test, &fit.homography, reference.width(), reference.height())
            .ok_or(AlignError::DegenerateGeometry {
                correspondences: src.len(),
            })?;

        log::debug!(
            "align: {}/{} inliers after {} iterations",
            fit.num_inliers,
            src.len(),
            fit.iterations
        );
        summary.inliers = Some(fit.num_inliers);
        summary.homography = Some(fit.homography.to_array());
        summary.warped = true;
        Ok(Alignment { image, summary })
    }
}

fn descriptors(kps: &[Keypoint]) -> Vec<Descriptor> {
    kps.iter().map(|k| k.descriptor).collect()
}

fn fit_correspondences(
    src: &[Point2<f32>],
    dst: &[Point2<f32>],
    params: &RansacParams,
) -> Result<RansacHomography, AlignError> {
    find_homography_ransac(src, dst, params).map_err(|e| {
        log::debug!("align: homography estimation failed: {e}");
        match e {
            HomographyError::TooFewPoints { got, .. } => AlignError::DegenerateGeometry {
                correspondences: got,
            },
            HomographyError::LengthMismatch { src, .. } => AlignError::DegenerateGeometry {
                correspondences: src,
            },
            HomographyError::Degenerate { correspondences } => {
                AlignError::DegenerateGeometry { correspondences }
            }
        }
    })
}
