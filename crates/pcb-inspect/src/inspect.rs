//! The inspection orchestrator.

use crate::io::load_image;
use crate::InspectionParams;
use pcb_inspect_align::{AlignError, AlignmentSummary, FeatureAligner};
use pcb_inspect_core::{GrayImage, RasterError, RasterImage};
use pcb_inspect_defect::{
    AnnotationStyle, Defect, DefectClassifier, DefectError, DefectSegmenter,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Where an inspection is in its single pass.
///
/// `Idle -> Loading -> Aligning -> Segmenting -> Classifying -> Done`, with
/// `Failed` reachable from every non-terminal stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InspectionStage {
    Idle,
    Loading,
    Aligning,
    Segmenting,
    Classifying,
    Done,
    Failed,
}

impl InspectionStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, InspectionStage::Done | InspectionStage::Failed)
    }
}

impl fmt::Display for InspectionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InspectionStage::Idle => "idle",
            InspectionStage::Loading => "loading",
            InspectionStage::Aligning => "aligning",
            InspectionStage::Segmenting => "segmenting",
            InspectionStage::Classifying => "classifying",
            InspectionStage::Done => "done",
            InspectionStage::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Reasons an inspection ends in [`InspectionStage::Failed`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum InspectError {
    #[error("image not found: {}: {reason}", path.display())]
    ImageNotFound { path: PathBuf, reason: String },

    #[error("degenerate geometry: no usable homography from {correspondences} correspondences")]
    DegenerateGeometry { correspondences: usize },

    #[error(
        "image size mismatch: reference is {}x{}, aligned test is {}x{}",
        reference.0, reference.1, aligned.0, aligned.1
    )]
    SizeMismatch {
        reference: (usize, usize),
        aligned: (usize, usize),
    },

    #[error(transparent)]
    Raster(#[from] RasterError),
}

impl InspectError {
    /// The stage that was running when the inspection failed.
    pub fn stage(&self) -> InspectionStage {
        match self {
            InspectError::ImageNotFound { .. } => InspectionStage::Loading,
            InspectError::DegenerateGeometry { .. } => InspectionStage::Aligning,
            InspectError::SizeMismatch { .. } => InspectionStage::Segmenting,
            InspectError::Raster(_) => InspectionStage::Classifying,
        }
    }
}

impl From<AlignError> for InspectError {
    fn from(e: AlignError) -> Self {
        match e {
            AlignError::DegenerateGeometry { correspondences } => {
                InspectError::DegenerateGeometry { correspondences }
            }
        }
    }
}

impl From<DefectError> for InspectError {
    fn from(e: DefectError) -> Self {
        match e {
            DefectError::SizeMismatch { reference, aligned } => {
                InspectError::SizeMismatch { reference, aligned }
            }
            DefectError::Raster(e) => InspectError::Raster(e),
        }
    }
}

/// Everything a completed inspection produces. Read-only to callers.
#[derive(Clone, Debug)]
pub struct InspectionResult {
    annotated: RasterImage,
    mask: GrayImage,
    defects: Vec<Defect>,
    alignment: AlignmentSummary,
}

impl InspectionResult {
    /// RGB copy of the aligned test image with defects drawn on it.
    pub fn annotated(&self) -> &RasterImage {
        &self.annotated
    }

    /// Cleaned binary difference mask (0 or 255).
    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Accepted defects in contour discovery order.
    pub fn defects(&self) -> &[Defect] {
        &self.defects
    }

    pub fn defect_count(&self) -> usize {
        self.defects.len()
    }

    pub fn alignment(&self) -> &AlignmentSummary {
        &self.alignment
    }
}

/// Runs align -> segment -> classify over one reference/test pair.
///
/// Holds only configuration, so one `Inspector` can serve concurrent
/// inspections from several threads.
#[derive(Clone, Debug)]
pub struct Inspector {
    params: InspectionParams,
    aligner: FeatureAligner,
    segmenter: DefectSegmenter,
    classifier: DefectClassifier,
}

impl Default for Inspector {
    fn default() -> Self {
        Self::new(InspectionParams::default())
    }
}

impl Inspector {
    /// Labels are rendered with a system font when one is installed.
    pub fn new(params: InspectionParams) -> Self {
        Self {
            aligner: FeatureAligner::new(params.align.clone()),
            segmenter: DefectSegmenter::new(params.segment.clone()),
            classifier: DefectClassifier::new(params.classify.clone())
                .with_style(AnnotationStyle::with_system_font()),
            params,
        }
    }

    /// Use `style` for the annotated output.
    pub fn with_style(mut self, style: AnnotationStyle) -> Self {
        self.classifier = self.classifier.with_style(style);
        self
    }

    pub fn params(&self) -> &InspectionParams {
        &self.params
    }

    /// Inspect an in-memory pair. Neither image is modified.
    pub fn inspect(
        &self,
        reference: &RasterImage,
        test: &RasterImage,
    ) -> Result<InspectionResult, InspectError> {
        self.run(reference, test, &mut |_: InspectionStage| {})
    }

    /// Load both images and inspect them.
    pub fn inspect_paths(
        &self,
        reference: impl AsRef<Path>,
        test: impl AsRef<Path>,
    ) -> Result<InspectionResult, InspectError> {
        self.inspect_observed(reference, test, |_| {})
    }

    /// Like [`Inspector::inspect_paths`], reporting every stage transition to
    /// `observer`, starting with `Idle` and ending with `Done` or `Failed`.
    pub fn inspect_observed<F>(
        &self,
        reference: impl AsRef<Path>,
        test: impl AsRef<Path>,
        mut observer: F,
    ) -> Result<InspectionResult, InspectError>
    where
        F: FnMut(InspectionStage),
    {
        observer(InspectionStage::Idle);
        observer(InspectionStage::Loading);
        let loaded = load_image(reference.as_ref())
            .and_then(|r| load_image(test.as_ref()).map(|t| (r, t)));
        let outcome = loaded.and_then(|(r, t)| self.run(&r, &t, &mut observer));
        match &outcome {
            Ok(_) => observer(InspectionStage::Done),
            Err(e) => {
                log::debug!("inspect: failed while {}: {e}", e.stage());
                observer(InspectionStage::Failed);
            }
        }
        outcome
    }

    #[cfg_attr(
        feature = "tracing",
        instrument(level = "info", skip_all, fields(
            w = reference.width(), h = reference.height()
        ))
    )]
    fn run(
        &self,
        reference: &RasterImage,
        test: &RasterImage,
        observer: &mut dyn FnMut(InspectionStage),
    ) -> Result<InspectionResult, InspectError> {
        observer(InspectionStage::Aligning);
        let alignment = self.aligner.align_with_report(test, reference)?;

        observer(InspectionStage::Segmenting);
        let segmentation = self.segmenter.segment(reference, &alignment.image)?;

        observer(InspectionStage::Classifying);
        let classification =
            self.classifier
                .classify(reference, &alignment.image, &segmentation.contours)?;

        log::info!(
            "inspect: {} candidate regions, {} defects (aligned: {})",
            segmentation.contours.len(),
            classification.defects.len(),
            alignment.summary.warped
        );
        Ok(InspectionResult {
            annotated: classification.annotated,
            mask: segmentation.mask,
            defects: classification.defects,
            alignment: alignment.summary,
        })
    }
}
