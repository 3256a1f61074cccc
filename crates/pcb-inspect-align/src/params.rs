use pcb_inspect_core::RansacParams;
use serde::{Deserialize, Serialize};

/// Parameters of the ORB-style detector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbParams {
    /// Upper bound on keypoints returned per image, summed over all levels.
    pub max_features: usize,
    /// Downscale ratio between consecutive pyramid levels (> 1).
    pub scale_factor: f32,
    /// Number of pyramid levels, including the full-resolution one.
    pub n_levels: usize,
    /// Keypoints closer than this to a level border are dropped.
    pub edge_threshold: usize,
    /// Side of the square patch used for orientation and description.
    pub patch_size: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Harris detector constant used to rank FAST corners.
    pub harris_k: f32,
}

impl Default for OrbParams {
    fn default() -> Self {
        Self {
            max_features: 5000,
            scale_factor: 1.2,
            n_levels: 8,
            edge_threshold: 31,
            patch_size: 31,
            fast_threshold: 20,
            harris_k: 0.04,
        }
    }
}

/// Parameters of [`crate::FeatureAligner`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignParams {
    pub orb: OrbParams,
    /// Fraction of cross-checked matches (lowest distance first) kept for
    /// homography estimation; the count is rounded down.
    pub keep_ratio: f32,
    pub ransac: RansacParams,
}

impl Default for AlignParams {
    fn default() -> Self {
        Self {
            orb: OrbParams::default(),
            keep_ratio: 0.15,
            ransac: RansacParams::default(),
        }
    }
}
