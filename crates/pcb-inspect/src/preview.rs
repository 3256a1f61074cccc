//! Display-sized copies of inspection images.

use image::imageops::{resize, FilterType};
use image::{ImageBuffer, Pixel};
use pcb_inspect_core::{RasterError, RasterImage};

pub const DEFAULT_DISPLAY_WIDTH: usize = 600;

/// A full-resolution image paired with a copy scaled to a display width.
///
/// Presentation code shows `display` and maps interactions back to
/// `original` with [`ImagePreview::to_original`].
#[derive(Clone, Debug)]
pub struct ImagePreview {
    original: RasterImage,
    display: RasterImage,
}

impl ImagePreview {
    /// Scale `original` to `display_width`, keeping the aspect ratio.
    pub fn new(original: RasterImage, display_width: usize) -> Result<Self, RasterError> {
        let display_width = display_width.max(1);
        let scale = display_width as f64 / original.width() as f64;
        let display_height = ((original.height() as f64 * scale).round() as usize).max(1);
        let display = resize_raster(&original, display_width, display_height)?;
        Ok(Self { original, display })
    }

    pub fn with_default_width(original: RasterImage) -> Result<Self, RasterError> {
        Self::new(original, DEFAULT_DISPLAY_WIDTH)
    }

    pub fn original(&self) -> &RasterImage {
        &self.original
    }

    pub fn display(&self) -> &RasterImage {
        &self.display
    }

    /// Display pixels per original pixel.
    pub fn scale(&self) -> f64 {
        self.display.width() as f64 / self.original.width() as f64
    }

    /// Map a display coordinate to the corresponding original coordinate.
    pub fn to_original(&self, x: f64, y: f64) -> (f64, f64) {
        let s = self.scale();
        (x / s, y / s)
    }
}

fn resize_raster(src: &RasterImage, w: usize, h: usize) -> Result<RasterImage, RasterError> {
    let raw = match src.channels() {
        1 => resize_buffer::<image::Luma<u8>>(src, w, h)?,
        3 => resize_buffer::<image::Rgb<u8>>(src, w, h)?,
        4 => resize_buffer::<image::Rgba<u8>>(src, w, h)?,
        c => return Err(RasterError::UnsupportedChannels(c)),
    };
    RasterImage::new(w, h, src.channels(), raw)
}

fn resize_buffer<P>(src: &RasterImage, w: usize, h: usize) -> Result<Vec<u8>, RasterError>
where
    P: Pixel<Subpixel = u8> + 'static,
{
    let buf: ImageBuffer<P, Vec<u8>> = ImageBuffer::from_raw(
        src.width() as u32,
        src.height() as u32,
        src.as_raw().to_vec(),
    )
    .ok_or(RasterError::InvalidBuffer {
        expected: src.width() * src.height() * src.channels(),
        got: src.as_raw().len(),
    })?;
    Ok(resize(&buf, w as u32, h as u32, FilterType::Triangle).into_raw())
}
