//! Difference-based defect detection for aligned image pairs.
//!
//! [`DefectSegmenter`] turns a reference/aligned pair into a cleaned binary
//! difference mask and the outer contours of its connected regions.
//! [`DefectClassifier`] drops tiny and border-touching regions, labels the
//! rest from their area and mean intensity, and draws them on an RGB copy of
//! the aligned image.

mod annotate;
mod classify;
mod error;
mod params;
mod segment;

pub use annotate::{annotate, to_rgb, AnnotationStyle};
pub use classify::{
    bounding_box, BoundingBox, Classification, Defect, DefectClassifier, DefectLabel,
};
pub use error::DefectError;
pub use params::{ClassifierParams, ContourApprox, SegmenterParams};
pub use segment::{abs_diff, Contour, DefectSegmenter, Segmentation};

/// `FontArc` re-export so callers can build an [`AnnotationStyle`] without
/// depending on `ab_glyph` directly.
pub use ab_glyph::FontArc;
