use crate::IoError;
use pcb_inspect_align::AlignParams;
use pcb_inspect_defect::{ClassifierParams, SegmenterParams};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Every tunable of the inspection pipeline.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectionParams {
    pub align: AlignParams,
    pub segment: SegmenterParams,
    pub classify: ClassifierParams,
}

impl InspectionParams {
    /// Load a JSON config from disk. Missing fields keep their defaults.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}
