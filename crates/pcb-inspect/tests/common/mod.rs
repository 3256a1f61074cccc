#![allow(dead_code)]

use pcb_inspect::{save_raster, RasterImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

pub const BACKGROUND: u8 = 200;

/// Single-channel image with every pixel set to `value`.
pub fn uniform(w: usize, h: usize, value: u8) -> RasterImage {
    RasterImage::filled(w, h, &[value]).expect("uniform image")
}

/// 500x500 board at [`BACKGROUND`].
pub fn blank_board() -> RasterImage {
    uniform(500, 500, BACKGROUND)
}

/// Copy of `base` with a filled `side x side` square at `(x, y)`.
pub fn with_square(base: &RasterImage, x: i64, y: i64, side: i64, value: u8) -> RasterImage {
    let mut img = base.clone();
    img.fill_rect(x, y, side, side, &[value]);
    img
}

/// Seeded random blocks on a dark background; rich enough in corners for ORB.
pub fn textured(w: usize, h: usize, seed: u64) -> RasterImage {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut img = uniform(w, h, 40);
    for _ in 0..160 {
        let bw = rng.gen_range(8..36);
        let bh = rng.gen_range(8..36);
        let x = rng.gen_range(0..(w - bw) as i64);
        let y = rng.gen_range(0..(h - bh) as i64);
        let v: u8 = rng.gen_range(0..=255);
        img.fill_rect(x, y, bw as i64, bh as i64, &[v]);
    }
    img
}

pub fn crop(src: &RasterImage, x0: usize, y0: usize, w: usize, h: usize) -> RasterImage {
    let c = src.channels();
    let mut data = Vec::with_capacity(w * h * c);
    for y in y0..y0 + h {
        for x in x0..x0 + w {
            data.extend_from_slice(src.pixel(x, y));
        }
    }
    RasterImage::new(w, h, c, data).expect("crop")
}

/// Write `img` as `dir/name` and return the path.
pub fn write_png(dir: &Path, name: &str, img: &RasterImage) -> PathBuf {
    let path = dir.join(name);
    save_raster(img, &path).expect("write png");
    path
}
