//! Core types and utilities for reference-based board inspection.
//!
//! This crate is purely geometric: owned rasters, projective transforms,
//! robust homography fitting and perspective warping. It knows nothing about
//! feature detectors or defect semantics.

mod homography;
mod logger;
mod ransac;
mod raster;

pub use homography::{estimate_homography, homography_from_4pt, warp_perspective, Homography};
pub use ransac::{find_homography_ransac, HomographyError, RansacHomography, RansacParams};
pub use raster::{
    sample_bilinear, sample_bilinear_u8, GrayImage, GrayImageView, RasterError, RasterImage,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_verbosity};
