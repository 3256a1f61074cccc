//! Image loading/saving and the JSON inspection report.

use crate::{InspectError, InspectionResult, InspectionStage};
use image::{ColorType, GrayImage as LumaImage, RgbImage, RgbaImage};
use pcb_inspect_align::AlignmentSummary;
use pcb_inspect_core::{GrayImage, RasterError, RasterImage};
use pcb_inspect_defect::Defect;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Raster(#[from] RasterError),
}

/// Decode an image file. Grayscale files load as one channel, everything
/// else as RGB.
pub fn load_image(path: impl AsRef<Path>) -> Result<RasterImage, InspectError> {
    let path = path.as_ref();
    let not_found = |reason: String| InspectError::ImageNotFound {
        path: path.to_path_buf(),
        reason,
    };
    let img = image::open(path).map_err(|e| not_found(e.to_string()))?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let raster = match img.color() {
        ColorType::L8 | ColorType::L16 | ColorType::La8 | ColorType::La16 => {
            RasterImage::new(w, h, 1, img.to_luma8().into_raw())
        }
        _ => RasterImage::new(w, h, 3, img.to_rgb8().into_raw()),
    };
    let raster = raster.map_err(|e| not_found(e.to_string()))?;
    log::debug!(
        "load_image: {} ({}x{}, {} ch)",
        path.display(),
        w,
        h,
        raster.channels()
    );
    Ok(raster)
}

/// Encode `img` to `path`; the format follows the file extension.
pub fn save_raster(img: &RasterImage, path: impl AsRef<Path>) -> Result<(), IoError> {
    let (w, h) = (img.width() as u32, img.height() as u32);
    let raw = img.as_raw().to_vec();
    let bad_buffer = || RasterError::InvalidBuffer {
        expected: img.width() * img.height() * img.channels(),
        got: img.as_raw().len(),
    };
    match img.channels() {
        1 => LumaImage::from_raw(w, h, raw).ok_or_else(bad_buffer)?.save(path)?,
        3 => RgbImage::from_raw(w, h, raw).ok_or_else(bad_buffer)?.save(path)?,
        4 => RgbaImage::from_raw(w, h, raw).ok_or_else(bad_buffer)?.save(path)?,
        c => return Err(RasterError::UnsupportedChannels(c).into()),
    }
    Ok(())
}

/// Encode a single-channel mask to `path`.
pub fn save_mask(mask: &GrayImage, path: impl AsRef<Path>) -> Result<(), IoError> {
    let img = RasterImage::new(mask.width, mask.height, 1, mask.data.clone())?;
    save_raster(&img, path)
}

/// Serializable summary of one inspection, successful or not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionReport {
    pub reference: String,
    pub test: String,
    /// Stage the inspection ended in: `done` or `failed`.
    pub stage: InspectionStage,
    /// Stage that was running when the inspection failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_stage: Option<InspectionStage>,
    pub defect_count: usize,
    #[serde(default)]
    pub defects: Vec<Defect>,
    #[serde(default)]
    pub alignment: Option<AlignmentSummary>,
    #[serde(default)]
    pub error: Option<String>,
}

impl InspectionReport {
    pub fn from_result(
        reference: impl AsRef<Path>,
        test: impl AsRef<Path>,
        result: &InspectionResult,
    ) -> Self {
        Self {
            reference: reference.as_ref().display().to_string(),
            test: test.as_ref().display().to_string(),
            stage: InspectionStage::Done,
            failed_stage: None,
            defect_count: result.defect_count(),
            defects: result.defects().to_vec(),
            alignment: Some(result.alignment().clone()),
            error: None,
        }
    }

    pub fn from_error(
        reference: impl AsRef<Path>,
        test: impl AsRef<Path>,
        err: &InspectError,
    ) -> Self {
        Self {
            reference: reference.as_ref().display().to_string(),
            test: test.as_ref().display().to_string(),
            stage: InspectionStage::Failed,
            failed_stage: Some(err.stage()),
            defect_count: 0,
            defects: Vec::new(),
            alignment: None,
            error: Some(err.to_string()),
        }
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
