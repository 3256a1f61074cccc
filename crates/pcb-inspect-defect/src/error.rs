use pcb_inspect_core::RasterError;

/// Errors returned by segmentation and classification.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DefectError {
    #[error(
        "image size mismatch: reference is {}x{}, aligned is {}x{}",
        reference.0, reference.1, aligned.0, aligned.1
    )]
    SizeMismatch {
        reference: (usize, usize),
        aligned: (usize, usize),
    },
    #[error(transparent)]
    Raster(#[from] RasterError),
}

pub(crate) fn check_same_size(
    reference: (usize, usize),
    aligned: (usize, usize),
) -> Result<(), DefectError> {
    if reference == aligned {
        Ok(())
    } else {
        Err(DefectError::SizeMismatch { reference, aligned })
    }
}
