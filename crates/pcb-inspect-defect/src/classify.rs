//! Candidate filtering and rule-based labelling.

use crate::annotate::{annotate, AnnotationStyle};
use crate::error::check_same_size;
use crate::{ClassifierParams, Contour, DefectError};
use image::Luma;
use pcb_inspect_core::{GrayImage, RasterImage};
use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Closed set of defect categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefectLabel {
    /// Small light region: drilled-through or etched pin hole.
    PinHole,
    /// Medium light region: bite taken out of a trace edge.
    Mousebite,
    /// Large light region: broken trace.
    Open,
    /// Large dark region: copper bridging two conductors.
    Short,
    /// Small dark region: leftover copper.
    Copper,
}

impl DefectLabel {
    pub const ALL: [DefectLabel; 5] = [
        DefectLabel::PinHole,
        DefectLabel::Mousebite,
        DefectLabel::Open,
        DefectLabel::Short,
        DefectLabel::Copper,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DefectLabel::PinHole => "pin-hole",
            DefectLabel::Mousebite => "mousebite",
            DefectLabel::Open => "open",
            DefectLabel::Short => "short",
            DefectLabel::Copper => "copper",
        }
    }

    /// Light regions (missing material) as opposed to dark ones (excess material).
    pub fn is_missing_material(self) -> bool {
        matches!(
            self,
            DefectLabel::PinHole | DefectLabel::Mousebite | DefectLabel::Open
        )
    }
}

impl fmt::Display for DefectLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Axis-aligned pixel rectangle `[x, x + width) × [y, y + height)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    /// `true` if the box keeps at least `margin` pixels from every edge of a
    /// `width × height` image.
    pub fn clears_border(&self, width: usize, height: usize, margin: u32) -> bool {
        let (w, h, m) = (width as i64, height as i64, margin as i64);
        self.x as i64 >= m
            && self.y as i64 >= m
            && self.right() as i64 <= w - m
            && self.bottom() as i64 <= h - m
    }
}

/// One accepted defect.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Defect {
    pub bbox: BoundingBox,
    /// Area enclosed by the region boundary.
    pub area: f64,
    /// Mean aligned-image intensity over the filled region.
    pub mean_intensity: f64,
    pub label: DefectLabel,
}

/// Output of [`DefectClassifier::classify`].
#[derive(Clone, Debug)]
pub struct Classification {
    /// RGB copy of the aligned image with boxes and labels drawn on it.
    pub annotated: RasterImage,
    /// Accepted defects, in contour order.
    pub defects: Vec<Defect>,
}

#[derive(Clone, Debug, Default)]
pub struct DefectClassifier {
    params: ClassifierParams,
    style: AnnotationStyle,
}

impl DefectClassifier {
    pub fn new(params: ClassifierParams) -> Self {
        Self {
            params,
            style: AnnotationStyle::default(),
        }
    }

    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn params(&self) -> &ClassifierParams {
        &self.params
    }

    pub fn style(&self) -> &AnnotationStyle {
        &self.style
    }

    /// Filter, measure and label `contours`, then draw the accepted ones on a
    /// copy of `aligned`.
    ///
    /// Regions with area at or below `min_area` and regions whose bounding box
    /// enters the border margin are skipped.
    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip(self, reference, aligned, contours), fields(candidates = contours.len()))
    )]
    pub fn classify(
        &self,
        reference: &RasterImage,
        aligned: &RasterImage,
        contours: &[Contour],
    ) -> Result<Classification, DefectError> {
        let (w, h) = (reference.width(), reference.height());
        check_same_size((w, h), (aligned.width(), aligned.height()))?;
        let gray = aligned.to_gray();
        let p = &self.params;

        let mut defects = Vec::new();
        for (idx, contour) in contours.iter().enumerate() {
            let area = contour.area();
            if area <= p.min_area {
                log::trace!("classify: contour {idx} dropped, area {area} <= {}", p.min_area);
                continue;
            }
            let Some(bbox) = bounding_box(contour) else {
                continue;
            };
            if !bbox.clears_border(w, h, p.border_margin) {
                log::debug!("classify: contour {idx} dropped at border, {bbox:?}");
                continue;
            }
            let mean_intensity = mean_inside(&gray, contour, &bbox);
            let label = p.label(mean_intensity, area);
            log::debug!(
                "classify: contour {idx} -> {label} (area {area}, mean {mean_intensity:.1}, {bbox:?})"
            );
            defects.push(Defect {
                bbox,
                area,
                mean_intensity,
                label,
            });
        }

        let annotated = annotate(aligned, &defects, &self.style)?;
        Ok(Classification { annotated, defects })
    }
}

/// Pixel bounding box of a contour; width and height count pixels, so a
/// single point has a 1 × 1 box.
pub fn bounding_box(contour: &Contour) -> Option<BoundingBox> {
    let (x0, y0, x1, y1) = contour.extent()?;
    if x0 < 0 || y0 < 0 {
        return None;
    }
    Some(BoundingBox {
        x: x0 as u32,
        y: y0 as u32,
        width: (x1 - x0 + 1) as u32,
        height: (y1 - y0 + 1) as u32,
    })
}

/// Mean of `gray` over the filled contour (boundary included).
fn mean_inside(gray: &GrayImage, contour: &Contour, bbox: &BoundingBox) -> f64 {
    let mask = region_mask(contour, bbox);
    let (mut sum, mut count) = (0u64, 0u64);
    for (x, y, px) in mask.enumerate_pixels() {
        if px[0] == 0 {
            continue;
        }
        sum += gray.get((bbox.x + x) as usize, (bbox.y + y) as usize) as u64;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Rasterise the closed contour into a `bbox`-sized mask: even-odd interior
/// (half-open in y) plus every pixel on the boundary segments.
fn region_mask(contour: &Contour, bbox: &BoundingBox) -> image::GrayImage {
    let mut mask = image::GrayImage::new(bbox.width, bbox.height);
    let pts: Vec<(i64, i64)> = contour
        .points
        .iter()
        .map(|p| (p.x as i64 - bbox.x as i64, p.y as i64 - bbox.y as i64))
        .collect();
    let n = pts.len();
    let (w, h) = (bbox.width as i64, bbox.height as i64);
    let mut set = |x: i64, y: i64| {
        if x >= 0 && y >= 0 && x < w && y < h {
            mask.put_pixel(x as u32, y as u32, Luma([255u8]));
        }
    };

    let mut crossings = Vec::new();
    for y in 0..h {
        crossings.clear();
        for i in 0..n {
            let (a, b) = (pts[i], pts[(i + 1) % n]);
            if (a.1 <= y) != (b.1 <= y) {
                let t = (y - a.1) as f64 / (b.1 - a.1) as f64;
                crossings.push(a.0 as f64 + t * (b.0 - a.0) as f64);
            }
        }
        crossings.sort_by(f64::total_cmp);
        for span in crossings.chunks_exact(2) {
            let (from, to) = (span[0].ceil() as i64, span[1].floor() as i64);
            for x in from..=to {
                set(x, y);
            }
        }
    }

    for i in 0..n {
        let (a, b) = (pts[i], pts[(i + 1) % n]);
        let steps = (b.0 - a.0).abs().max((b.1 - a.1).abs());
        if steps == 0 {
            set(a.0, a.1);
            continue;
        }
        for s in 0..=steps {
            let t = s as f64 / steps as f64;
            let x = a.0 as f64 + t * (b.0 - a.0) as f64;
            let y = a.1 as f64 + t * (b.1 - a.1) as f64;
            set(x.round() as i64, y.round() as i64);
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point2;

    fn square(x0: i32, y0: i32, side: i32) -> Contour {
        let (x1, y1) = (x0 + side - 1, y0 + side - 1);
        Contour {
            points: vec![
                Point2::new(x0, y0),
                Point2::new(x0, y1),
                Point2::new(x1, y1),
                Point2::new(x1, y0),
            ],
        }
    }

    fn board(v: u8) -> RasterImage {
        RasterImage::filled(100, 100, &[v]).unwrap()
    }

    #[test]
    fn labels_serialize_kebab_case() {
        assert_eq!(
            serde_json::to_string(&DefectLabel::PinHole).unwrap(),
            "\"pin-hole\""
        );
        for l in DefectLabel::ALL {
            assert_eq!(
                serde_json::to_string(&l).unwrap(),
                format!("\"{}\"", l.as_str())
            );
        }
    }

    #[test]
    fn small_regions_are_skipped() {
        let img = board(200);
        // 8x8 pixels -> area 49
        let out = DefectClassifier::default()
            .classify(&img, &img, &[square(40, 40, 8)])
            .unwrap();
        assert!(out.defects.is_empty());
    }

    #[test]
    fn border_regions_are_suppressed() {
        let img = board(200);
        let contours = [square(5, 40, 20), square(40, 85, 20), square(40, 40, 20)];
        let out = DefectClassifier::default()
            .classify(&img, &img, &contours)
            .unwrap();
        assert_eq!(out.defects.len(), 1);
        let d = &out.defects[0];
        assert_eq!(
            d.bbox,
            BoundingBox {
                x: 40,
                y: 40,
                width: 20,
                height: 20
            }
        );
        assert!(d.bbox.clears_border(100, 100, 10));
    }

    #[test]
    fn mean_uses_filled_region_of_aligned_image() {
        let reference = board(200);
        let mut aligned = board(200);
        aligned.fill_rect(31, 31, 18, 18, &[0]);
        let out = DefectClassifier::default()
            .classify(&reference, &aligned, &[square(30, 30, 20)])
            .unwrap();
        let d = &out.defects[0];
        assert_eq!(d.area, 361.0);
        // 324 dark pixels and a 76-pixel light ring
        approx::assert_abs_diff_eq!(d.mean_intensity, 76.0 * 200.0 / 400.0, epsilon = 1e-9);
        assert_eq!(d.label, DefectLabel::Short);
    }

    #[test]
    fn light_small_region_is_pin_hole() {
        let reference = board(200);
        let aligned = board(255);
        let out = DefectClassifier::default()
            .classify(&reference, &aligned, &[square(45, 45, 12)])
            .unwrap();
        assert_eq!(out.defects[0].label, DefectLabel::PinHole);
        assert_eq!(out.defects[0].area, 121.0);
    }

    #[test]
    fn inputs_are_untouched_and_annotation_is_rgb() {
        let reference = board(200);
        let aligned = board(200);
        let before = aligned.clone();
        let out = DefectClassifier::default()
            .classify(&reference, &aligned, &[square(40, 40, 20)])
            .unwrap();
        assert_eq!(aligned, before);
        assert_eq!(out.annotated.channels(), 3);
        assert_eq!(out.annotated.pixel(40, 40), &[0, 255, 0]);
    }

    #[test]
    fn region_mask_fills_non_convex_outline() {
        // L shape: 10x10 square minus its top-right 5x5 quadrant
        let c = Contour {
            points: vec![
                Point2::new(0, 0),
                Point2::new(0, 9),
                Point2::new(9, 9),
                Point2::new(9, 5),
                Point2::new(5, 5),
                Point2::new(5, 0),
            ],
        };
        let bbox = bounding_box(&c).unwrap();
        let mask = region_mask(&c, &bbox);
        let filled = mask.pixels().filter(|p| p[0] != 0).count();
        assert_eq!(filled, 100 - 4 * 5);
        assert_eq!(mask.get_pixel(2, 2)[0], 255);
        assert_eq!(mask.get_pixel(8, 2)[0], 0);
        assert_eq!(mask.get_pixel(9, 5)[0], 255);
    }

    #[test]
    fn single_point_contour_has_unit_box() {
        let c = Contour {
            points: vec![Point2::new(7, 9)],
        };
        assert_eq!(
            bounding_box(&c),
            Some(BoundingBox {
                x: 7,
                y: 9,
                width: 1,
                height: 1
            })
        );
        assert_eq!(c.area(), 0.0);
    }
}
