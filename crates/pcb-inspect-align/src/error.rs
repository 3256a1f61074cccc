/// Errors returned by [`crate::FeatureAligner`].
///
/// Too few correspondences is not an error: the aligner falls back to the
/// unwarped test image and reports `warped: false`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AlignError {
    #[error("degenerate geometry: no usable homography from {correspondences} correspondences")]
    DegenerateGeometry { correspondences: usize },
}
