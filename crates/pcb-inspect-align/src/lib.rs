//! Feature-based image registration.
//!
//! Pipeline: grayscale -> ORB keypoints (FAST-9, Harris ranking, scale
//! pyramid, intensity-centroid orientation, steered BRIEF) -> brute-force
//! cross-checked Hamming matching -> lowest-distance fraction -> RANSAC
//! homography -> bilinear warp into the reference frame.
//!
//! ```no_run
//! use pcb_inspect_align::FeatureAligner;
//! use pcb_inspect_core::RasterImage;
//!
//! # fn load() -> RasterImage { unimplemented!() }
//! let (test, reference) = (load(), load());
//! let aligned = FeatureAligner::default().align(&test, &reference)?;
//! assert_eq!(aligned.width(), reference.width());
//! # Ok::<(), pcb_inspect_align::AlignError>(())
//! ```

mod aligner;
mod descriptor;
mod error;
mod fast;
mod matcher;
mod orb;
mod params;
mod pyramid;

pub use aligner::{Alignment, AlignmentSummary, FeatureAligner, MIN_CORRESPONDENCES};
pub use descriptor::{Descriptor, DESCRIPTOR_BYTES};
pub use error::AlignError;
pub use matcher::{match_cross_checked, retain_best_fraction, Match};
pub use orb::{Keypoint, OrbDetector};
pub use params::{AlignParams, OrbParams};
