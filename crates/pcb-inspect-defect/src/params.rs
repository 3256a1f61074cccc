use crate::DefectLabel;
use serde::{Deserialize, Serialize};

/// How contour boundaries are stored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourApprox {
    /// Every boundary pixel.
    None,
    /// Only the points where the boundary changes direction.
    #[default]
    Simple,
}

/// Parameters of [`crate::DefectSegmenter`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterParams {
    /// Absolute intensity difference at or above which a pixel is foreground.
    pub diff_threshold: u8,
    /// Chebyshev radius of the square structuring element (1 = 3×3).
    pub kernel_radius: u8,
    /// Dilation passes applied after the opening.
    pub dilate_iterations: usize,
    pub approximation: ContourApprox,
}

impl Default for SegmenterParams {
    fn default() -> Self {
        Self {
            diff_threshold: 50,
            kernel_radius: 1,
            dilate_iterations: 1,
            approximation: ContourApprox::Simple,
        }
    }
}

/// Parameters of [`crate::DefectClassifier`].
///
/// The intensity midpoint and area breakpoints are heuristics tuned for
/// bright-substrate board photographs, not calibrated constants.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Regions with area at or below this are dropped.
    pub min_area: f64,
    /// Regions whose bounding box comes closer than this to an edge are dropped.
    pub border_margin: u32,
    /// Mean intensity above which a region counts as missing material.
    pub intensity_midpoint: f64,
    pub pinhole_max_area: f64,
    pub mousebite_max_area: f64,
    /// Dark regions larger than this are shorts, the rest spurious copper.
    pub short_min_area: f64,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            min_area: 50.0,
            border_margin: 10,
            intensity_midpoint: 150.0,
            pinhole_max_area: 200.0,
            mousebite_max_area: 600.0,
            short_min_area: 350.0,
        }
    }
}

impl ClassifierParams {
    /// Label a region from its mean intensity and area.
    pub fn label(&self, mean_intensity: f64, area: f64) -> DefectLabel {
        if mean_intensity > self.intensity_midpoint {
            if area < self.pinhole_max_area {
                DefectLabel::PinHole
            } else if area < self.mousebite_max_area {
                DefectLabel::Mousebite
            } else {
                DefectLabel::Open
            }
        } else if area > self.short_min_area {
            DefectLabel::Short
        } else {
            DefectLabel::Copper
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_tree_breakpoints() {
        let p = ClassifierParams::default();
        assert_eq!(p.label(151.0, 199.9), DefectLabel::PinHole);
        assert_eq!(p.label(151.0, 200.0), DefectLabel::Mousebite);
        assert_eq!(p.label(151.0, 599.0), DefectLabel::Mousebite);
        assert_eq!(p.label(151.0, 600.0), DefectLabel::Open);
        assert_eq!(p.label(150.0, 351.0), DefectLabel::Short);
        assert_eq!(p.label(150.0, 350.0), DefectLabel::Copper);
        assert_eq!(p.label(0.0, 51.0), DefectLabel::Copper);
    }

    #[test]
    fn approximation_round_trips_through_json() {
        let p: SegmenterParams = serde_json::from_str(r#"{ "approximation": "none" }"#).unwrap();
        assert_eq!(p.approximation, ContourApprox::None);
        assert_eq!(p.diff_threshold, 50);
    }
}
