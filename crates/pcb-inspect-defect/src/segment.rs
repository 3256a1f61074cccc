//! Difference mask and candidate region extraction.

use crate::error::check_same_size;
use crate::{ContourApprox, DefectError, SegmenterParams};
use image::Luma;
use imageproc::contours::{find_contours, BorderType};
use imageproc::distance_transform::Norm;
use imageproc::morphology;
use nalgebra::{Point2, Vector2};
use pcb_inspect_core::{GrayImage, RasterImage};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Outer boundary of one connected foreground region, in pixel coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Contour {
    pub points: Vec<Point2<i32>>,
}

impl Contour {
    /// Polygon area enclosed by the boundary (shoelace formula over pixel
    /// centres), so a `k × k` solid square has area `(k - 1)²`.
    pub fn area(&self) -> f64 {
        let n = self.points.len();
        if n < 3 {
            return 0.0;
        }
        let mut twice = 0i64;
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            twice += a.x as i64 * b.y as i64 - b.x as i64 * a.y as i64;
        }
        (twice as f64 / 2.0).abs()
    }

    /// Inclusive pixel extent `(min_x, min_y, max_x, max_y)`.
    pub fn extent(&self) -> Option<(i32, i32, i32, i32)> {
        let first = self.points.first()?;
        Some(self.points.iter().fold(
            (first.x, first.y, first.x, first.y),
            |(x0, y0, x1, y1), p| (x0.min(p.x), y0.min(p.y), x1.max(p.x), y1.max(p.y)),
        ))
    }
}

/// Output of [`DefectSegmenter::segment`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Segmentation {
    /// Cleaned binary mask, 0 or 255.
    pub mask: GrayImage,
    /// External contours in discovery (raster) order, unfiltered.
    pub contours: Vec<Contour>,
}

/// Thresholds the absolute difference of two aligned images and extracts
/// the outer boundaries of what remains after morphological cleanup.
#[derive(Clone, Debug, Default)]
pub struct DefectSegmenter {
    params: SegmenterParams,
}

impl DefectSegmenter {
    pub fn new(params: SegmenterParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SegmenterParams {
        &self.params
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, reference, aligned))
    )]
    pub fn segment(
        &self,
        reference: &RasterImage,
        aligned: &RasterImage,
    ) -> Result<Segmentation, DefectError> {
        check_same_size(
            (reference.width(), reference.height()),
            (aligned.width(), aligned.height()),
        )?;
        let diff = abs_diff(&reference.to_gray(), &aligned.to_gray());

        let t = self.params.diff_threshold;
        let binary = image::GrayImage::from_fn(diff.width as u32, diff.height as u32, |x, y| {
            let v = diff.get(x as usize, y as usize);
            Luma([if v >= t { 255 } else { 0 }])
        });

        let k = self.params.kernel_radius;
        let mut cleaned = morphology::open(&binary, Norm::LInf, k);
        for _ in 0..self.params.dilate_iterations {
            cleaned = morphology::dilate(&cleaned, Norm::LInf, k);
        }

        let contours: Vec<Contour> = find_contours::<i32>(&cleaned)
            .into_iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
            .map(|c| {
                let points: Vec<Point2<i32>> =
                    c.points.iter().map(|p| Point2::new(p.x, p.y)).collect();
                let points = match self.params.approximation {
                    ContourApprox::None => points,
                    ContourApprox::Simple => compress_straight_runs(points),
                };
                Contour { points }
            })
            .collect();

        let mask = GrayImage {
            width: diff.width,
            height: diff.height,
            data: cleaned.into_raw(),
        };
        log::debug!(
            "segment: {} foreground pixels, {} external contours",
            mask.count_nonzero(),
            contours.len()
        );
        Ok(Segmentation { mask, contours })
    }
}

/// Per-pixel `|a - b|`. Both images must have the same size.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!((a.width, a.height), (b.width, b.height));
    GrayImage {
        width: a.width,
        height: a.height,
        data: a.data.iter().zip(&b.data).map(|(&x, &y)| x.abs_diff(y)).collect(),
    }
}

// Keep only vertices where the step direction changes (closed polygon).
fn compress_straight_runs(points: Vec<Point2<i32>>) -> Vec<Point2<i32>> {
    let n = points.len();
    if n < 3 {
        return points;
    }
    let step = |from: usize, to: usize| -> Vector2<i32> { points[to] - points[from] };
    let kept: Vec<Point2<i32>> = (0..n)
        .filter(|&i| {
            let prev = (i + n - 1) % n;
            let next = (i + 1) % n;
            step(prev, i) != step(i, next)
        })
        .map(|i| points[i])
        .collect();
    if kept.is_empty() {
        points
    } else {
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_board(w: usize, h: usize, v: u8) -> RasterImage {
        RasterImage::filled(w, h, &[v]).unwrap()
    }

    #[test]
    fn identical_images_give_empty_mask() {
        let img = gray_board(64, 48, 120);
        let seg = DefectSegmenter::default().segment(&img, &img).unwrap();
        assert_eq!(seg.mask.count_nonzero(), 0);
        assert!(seg.contours.is_empty());
    }

    #[test]
    fn isolated_pixels_are_opened_away() {
        let reference = gray_board(40, 40, 200);
        let mut test = reference.clone();
        test.fill_rect(10, 10, 1, 1, &[0]);
        test.fill_rect(25, 18, 2, 1, &[0]);
        let seg = DefectSegmenter::default().segment(&reference, &test).unwrap();
        assert_eq!(seg.mask.count_nonzero(), 0);
        assert!(seg.contours.is_empty());
    }

    #[test]
    fn square_blob_grows_by_one_pixel() {
        let reference = gray_board(60, 60, 200);
        let mut test = reference.clone();
        test.fill_rect(20, 20, 10, 10, &[0]);
        let seg = DefectSegmenter::default().segment(&reference, &test).unwrap();

        assert_eq!(seg.mask.count_nonzero(), 12 * 12);
        assert_eq!(seg.contours.len(), 1);
        let c = &seg.contours[0];
        assert_eq!(c.extent(), Some((19, 19, 30, 30)));
        assert_eq!(c.area(), 121.0);
        assert_eq!(c.points.len(), 4);
    }

    #[test]
    fn full_boundary_is_kept_without_approximation() {
        let reference = gray_board(60, 60, 200);
        let mut test = reference.clone();
        test.fill_rect(20, 20, 10, 10, &[0]);
        let seg = DefectSegmenter::new(SegmenterParams {
            approximation: ContourApprox::None,
            ..SegmenterParams::default()
        })
        .segment(&reference, &test)
        .unwrap();
        assert_eq!(seg.contours[0].points.len(), 4 * 11);
        assert_eq!(seg.contours[0].area(), 121.0);
    }

    #[test]
    fn threshold_is_inclusive() {
        let reference = gray_board(40, 40, 100);
        let mut at = reference.clone();
        at.fill_rect(15, 15, 8, 8, &[150]);
        let mut below = reference.clone();
        below.fill_rect(15, 15, 8, 8, &[149]);
        let seg = DefectSegmenter::default();
        assert_eq!(seg.segment(&reference, &at).unwrap().contours.len(), 1);
        assert!(seg.segment(&reference, &below).unwrap().contours.is_empty());
    }

    #[test]
    fn holes_are_not_reported() {
        let reference = gray_board(60, 60, 200);
        let mut test = reference.clone();
        test.fill_rect(10, 10, 30, 30, &[0]);
        test.fill_rect(18, 18, 14, 14, &[200]);
        let seg = DefectSegmenter::default().segment(&reference, &test).unwrap();
        assert_eq!(seg.contours.len(), 1);
        assert_eq!(seg.contours[0].extent(), Some((9, 9, 40, 40)));
    }

    #[test]
    fn segmentation_is_repeatable() {
        let reference = gray_board(50, 50, 200);
        let mut test = reference.clone();
        test.fill_rect(5, 30, 9, 7, &[20]);
        test.fill_rect(30, 8, 6, 12, &[255]);
        let s = DefectSegmenter::default();
        assert_eq!(
            s.segment(&reference, &test).unwrap(),
            s.segment(&reference, &test).unwrap()
        );
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let err = DefectSegmenter::default()
            .segment(&gray_board(10, 10, 0), &gray_board(10, 11, 0))
            .unwrap_err();
        assert_eq!(
            err,
            DefectError::SizeMismatch {
                reference: (10, 10),
                aligned: (10, 11)
            }
        );
    }
}
