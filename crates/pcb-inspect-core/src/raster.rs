//! Owned 8-bit rasters and a borrowed single-channel view.
//!
//! `RasterImage` is the buffer every pipeline stage consumes and produces.
//! Pixels are row-major and interleaved; channel order for colour images is
//! RGB (or RGBA).

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RasterError {
    #[error("unsupported channel count {0} (expected 1, 3 or 4)")]
    UnsupportedChannels(usize),

    #[error("invalid raster dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },

    #[error("invalid raster buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
}

#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

/// Single-channel intensity image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    /// Zero-filled image.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Number of non-zero pixels.
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Owned 8-bit raster with 1, 3 or 4 interleaved channels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    width: usize,
    height: usize,
    channels: usize,
    data: Vec<u8>,
}

impl RasterImage {
    /// Wrap a raw interleaved buffer, validating its size.
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, RasterError> {
        if !matches!(channels, 1 | 3 | 4) {
            return Err(RasterError::UnsupportedChannels(channels));
        }
        if width == 0 || height == 0 {
            return Err(RasterError::InvalidDimensions { width, height });
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(channels))
            .ok_or(RasterError::InvalidDimensions { width, height })?;
        if data.len() != expected {
            return Err(RasterError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Image where every pixel equals `pixel` (its length sets the channel count).
    pub fn filled(width: usize, height: usize, pixel: &[u8]) -> Result<Self, RasterError> {
        let data = pixel.repeat(width * height);
        Self::new(width, height, pixel.len(), data)
    }

    pub fn from_gray(gray: GrayImage) -> Result<Self, RasterError> {
        Self::new(gray.width, gray.height, 1, gray.data)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let i = (y * self.width + x) * self.channels;
        &self.data[i..i + self.channels]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        let i = (y * self.width + x) * self.channels;
        &mut self.data[i..i + self.channels]
    }

    /// Fill the axis-aligned rectangle `[x, x+w) × [y, y+h)` (clipped) with `pixel`.
    ///
    /// Used to paint synthetic fixtures; pipeline stages never mutate their inputs.
    pub fn fill_rect(&mut self, x: i64, y: i64, w: i64, h: i64, pixel: &[u8]) {
        let x0 = x.clamp(0, self.width as i64) as usize;
        let y0 = y.clamp(0, self.height as i64) as usize;
        let x1 = (x + w).clamp(0, self.width as i64) as usize;
        let y1 = (y + h).clamp(0, self.height as i64) as usize;
        for yy in y0..y1 {
            for xx in x0..x1 {
                let px = self.pixel_mut(xx, yy);
                for (k, v) in px.iter_mut().enumerate() {
                    // a single value broadcasts over all channels
                    *v = pixel.get(k).or(pixel.last()).copied().unwrap_or(0);
                }
            }
        }
    }

    /// Convert to single-channel intensity.
    ///
    /// Colour input uses the BT.601 luma weights in 14-bit fixed point, so the
    /// result is bit-exact across platforms. Alpha is ignored.
    pub fn to_gray(&self) -> GrayImage {
        let data = match self.channels {
            1 => self.data.clone(),
            c => self
                .data
                .chunks_exact(c)
                .map(|px| luma_bt601(px[0], px[1], px[2]))
                .collect(),
        };
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }
}

#[inline]
fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample with a constant zero border.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    (sample_bilinear(src, x, y) + 0.5).clamp(0.0, 255.0) as u8
}
