//! QC montage: a grid of randomly ordered tile previews for eyeballing a
//! slide's output.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::warn;

use crate::error::EncodeError;
use crate::tiler::{alpha_to_white, write_png};

/// Default number of montage cells
pub const DEFAULT_QC_TILES: usize = 64;

/// Default cell side in pixels
pub const DEFAULT_QC_SIZE: u32 = 128;

/// Montage settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QcOptions {
    pub tiles: usize,
    pub size: u32,
}

impl Default for QcOptions {
    fn default() -> Self {
        Self {
            tiles: DEFAULT_QC_TILES,
            size: DEFAULT_QC_SIZE,
        }
    }
}

impl QcOptions {
    /// `(cols, rows)`: `floor(sqrt(n))` columns, `ceil(n / cols)` rows.
    pub fn grid(&self) -> (u32, u32) {
        let n = self.tiles.max(1);
        let cols = ((n as f64).sqrt() as usize).max(1);
        let rows = n.div_ceil(cols);
        (cols as u32, rows as u32)
    }
}

/// PNG files of a tile directory, sorted by name.
pub fn tile_pngs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|ext| ext == "png"))
        .collect();
    paths.sort();
    paths
}

/// Paste up to `options.tiles` of `paths`, shuffled, onto a white canvas.
///
/// The canvas always has room for `options.tiles` cells. Unreadable tiles
/// leave their cell white. Returns the montage and the number of cells
/// filled, or `None` when `paths` is empty.
pub fn build_montage<R: Rng + ?Sized>(
    paths: &[PathBuf],
    options: &QcOptions,
    rng: &mut R,
) -> Option<(RgbImage, usize)> {
    if paths.is_empty() {
        return None;
    }

    let mut picked: Vec<&PathBuf> = paths.iter().take(options.tiles).collect();
    picked.shuffle(rng);

    let (cols, rows) = options.grid();
    let size = options.size;
    let mut canvas = RgbImage::from_pixel(cols * size, rows * size, Rgb([255, 255, 255]));

    let mut filled = 0;
    for (i, path) in picked.iter().enumerate() {
        let (col, row) = (i as u32 % cols, i as u32 / cols);
        if row >= rows {
            break;
        }
        match image::open(path) {
            Ok(img) => {
                let cell =
                    imageops::resize(&alpha_to_white(img), size, size, FilterType::Triangle);
                let (px, py) = ((col * size) as i64, (row * size) as i64);
                imageops::replace(&mut canvas, &cell, px, py);
                filled += 1;
            }
            Err(e) => warn!(path = %path.display(), error = %e, "QC tile skipped"),
        }
    }

    Some((canvas, filled))
}

/// Build the montage of a tile directory and write it to `out`.
///
/// Returns the number of cells filled, 0 when there are no tiles (nothing
/// is written then).
pub fn save_qc_montage(
    tile_dir: &Path,
    out: &Path,
    options: &QcOptions,
) -> Result<usize, EncodeError> {
    let paths = tile_pngs(tile_dir);
    let Some((canvas, filled)) = build_montage(&paths, options, &mut rand::rng()) else {
        return Ok(0);
    };
    write_png(out, &canvas)?;
    Ok(filled)
}
