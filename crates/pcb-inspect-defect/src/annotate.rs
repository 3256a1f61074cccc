//! Drawing defect boxes and labels onto an RGB copy of the aligned image.

use crate::Defect;
use ab_glyph::FontArc;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use pcb_inspect_core::{RasterError, RasterImage};
use std::fmt;
use std::path::Path;

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const PLAQUE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const PLAQUE_HEIGHT: i32 = 20;
const TEXT_PAD: i32 = 2;

const SYSTEM_FONTS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// How annotations are drawn.
///
/// Without a font the label plaquettes are still drawn but left empty; use
/// [`AnnotationStyle::with_system_font`] to pick up a font installed on the host.
#[derive(Clone)]
pub struct AnnotationStyle {
    pub font: Option<FontArc>,
    /// Glyph height in pixels.
    pub font_scale: f32,
    pub box_thickness: u32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            font: None,
            font_scale: 16.0,
            box_thickness: 2,
        }
    }
}

impl fmt::Debug for AnnotationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnnotationStyle")
            .field("font", &self.font.as_ref().map(|_| "<font>"))
            .field("font_scale", &self.font_scale)
            .field("box_thickness", &self.box_thickness)
            .finish()
    }
}

impl AnnotationStyle {
    /// Default style with a TrueType/OpenType font read from `path`.
    pub fn with_font_file(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Default style with the first system font that loads, or no font (and
    /// no label text) when none is installed.
    pub fn with_system_font() -> Self {
        for path in SYSTEM_FONTS {
            if let Ok(style) = Self::with_font_file(path) {
                log::info!("annotate: loaded system font {path}");
                return style;
            }
        }
        log::debug!("annotate: no system font found, labels will be left empty");
        Self::default()
    }

    fn label_width(&self, text: &str) -> i32 {
        match &self.font {
            Some(font) => text_size(self.font_scale, font, text).0 as i32,
            None => (text.chars().count() as f32 * self.font_scale * 0.5).ceil() as i32,
        }
    }
}

/// Convert any supported raster to 8-bit RGB (gray is replicated, alpha dropped).
pub fn to_rgb(img: &RasterImage) -> RgbImage {
    RgbImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
        let px = img.pixel(x as usize, y as usize);
        match px.len() {
            1 => Rgb([px[0], px[0], px[0]]),
            _ => Rgb([px[0], px[1], px[2]]),
        }
    })
}

/// Draw every defect on an RGB copy of `image`.
///
/// Each box gets a white label plaquette above it, or below it when there is
/// no room above.
pub fn annotate(
    image: &RasterImage,
    defects: &[Defect],
    style: &AnnotationStyle,
) -> Result<RasterImage, RasterError> {
    let mut canvas = to_rgb(image);
    for d in defects {
        let (x, y) = (d.bbox.x as i32, d.bbox.y as i32);
        let (w, h) = (d.bbox.width, d.bbox.height);

        for t in 0..style.box_thickness {
            let grow = 2 * t;
            let rect = Rect::at(x - t as i32, y - t as i32).of_size(w + grow, h + grow);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }

        let text = d.label.as_str();
        let plaque_w = style.label_width(text) + 2 * TEXT_PAD;
        let plaque_y = if y - PLAQUE_HEIGHT > 0 {
            y - PLAQUE_HEIGHT
        } else {
            y + h as i32
        };
        let plaque = Rect::at(x, plaque_y).of_size(plaque_w.max(1) as u32, PLAQUE_HEIGHT as u32);
        draw_filled_rect_mut(&mut canvas, plaque, PLAQUE_COLOR);
        draw_hollow_rect_mut(&mut canvas, plaque, TEXT_COLOR);

        if let Some(font) = &style.font {
            let text_y = plaque_y + (PLAQUE_HEIGHT - style.font_scale as i32).max(0) / 2;
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                x + TEXT_PAD,
                text_y,
                style.font_scale,
                font,
                text,
            );
        }
    }

    let (w, h) = (canvas.width() as usize, canvas.height() as usize);
    RasterImage::new(w, h, 3, canvas.into_raw())
}
