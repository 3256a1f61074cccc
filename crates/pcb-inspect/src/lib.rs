//! High-level facade for the `pcb-inspect-*` workspace.
//!
//! This crate provides:
//! - re-exports of the underlying stage crates
//! - [`Inspector`], which runs alignment, segmentation and classification as
//!   one deterministic pass and reports which stage it is in
//! - image loading/saving, JSON parameters and JSON reports
//! - an append-only inspection record log with pass/fail summaries
//! - a display preview view-model
//!
//! ## Quickstart
//!
//! ```no_run
//! use pcb_inspect::{Inspector, InspectionParams};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let inspector = Inspector::new(InspectionParams::default());
//! let result = inspector.inspect_paths("golden.png", "board_042.png")?;
//! for d in result.defects() {
//!     println!("{} at {:?} (area {})", d.label, d.bbox, d.area);
//! }
//! pcb_inspect::save_raster(result.annotated(), "board_042_annotated.png")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `pcb_inspect::core`: rasters, homographies, RANSAC, warping, logger.
//! - `pcb_inspect::align`: ORB features, cross-checked matching, `FeatureAligner`.
//! - `pcb_inspect::defect`: `DefectSegmenter`, `DefectClassifier`, annotation.

pub use pcb_inspect_align as align;
pub use pcb_inspect_core as core;
pub use pcb_inspect_defect as defect;

pub use pcb_inspect_align::{AlignParams, AlignmentSummary, FeatureAligner, OrbParams};
pub use pcb_inspect_core::{GrayImage, RasterImage};
pub use pcb_inspect_defect::{
    AnnotationStyle, BoundingBox, ClassifierParams, Defect, DefectLabel, SegmenterParams,
};

mod inspect;
mod io;
mod params;
mod preview;
mod record;

pub use inspect::{InspectError, InspectionResult, InspectionStage, Inspector};
pub use io::{load_image, save_mask, save_raster, InspectionReport, IoError};
pub use params::InspectionParams;
pub use preview::{ImagePreview, DEFAULT_DISPLAY_WIDTH};
pub use record::{
    InspectionRecord, InspectionSink, InspectionStatus, JsonLinesLog, LogSummary, MemoryLog,
    RecordError,
};
