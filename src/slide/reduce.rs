//! Block averaging of a pyramid level, one native tile at a time.

use image::{Rgb, RgbImage, RgbaImage};

use crate::tiler::pixel_over_white;

/// Averages `factor` x `factor` blocks of a level into a small raster.
///
/// Tiles are added as they are decoded, so only the reduced raster stays in
/// memory. Pixels are composited over white first; cells that receive no
/// pixel stay white.
pub(crate) struct BoxReducer {
    level_width: u32,
    level_height: u32,
    factor: u32,
    width: u32,
    height: u32,
    sums: Vec<[u64; 3]>,
    counts: Vec<u64>,
}

impl BoxReducer {
    pub fn new(level_width: u32, level_height: u32, factor: u32) -> Self {
        let factor = factor.max(1);
        let width = level_width.div_ceil(factor).max(1);
        let height = level_height.div_ceil(factor).max(1);
        let cells = width as usize * height as usize;
        Self {
            level_width,
            level_height,
            factor,
            width,
            height,
            sums: vec![[0; 3]; cells],
            counts: vec![0; cells],
        }
    }

    /// Add a decoded tile whose top-left corner sits at level `(x, y)`.
    ///
    /// Only the first `tile_width` x `tile_height` pixels that also lie
    /// inside the level are used; JPEG padding past the level edge is
    /// dropped.
    pub fn add_tile(
        &mut self,
        x: u32,
        y: u32,
        tile: &RgbaImage,
        tile_width: u32,
        tile_height: u32,
    ) {
        if x >= self.level_width || y >= self.level_height {
            return;
        }
        let w = tile.width().min(tile_width).min(self.level_width - x);
        let h = tile.height().min(tile_height).min(self.level_height - y);

        for py in 0..h {
            let row = ((y + py) / self.factor) as usize * self.width as usize;
            for px in 0..w {
                let cell = row + ((x + px) / self.factor) as usize;
                let rgb = pixel_over_white(tile.get_pixel(px, py).0);
                let sum = &mut self.sums[cell];
                for (s, c) in sum.iter_mut().zip(rgb) {
                    *s += c as u64;
                }
                self.counts[cell] += 1;
            }
        }
    }

    /// Rounded mean of every cell.
    pub fn finish(self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let cell = y as usize * self.width as usize + x as usize;
            let n = self.counts[cell];
            if n == 0 {
                return Rgb([255, 255, 255]);
            }
            let [r, g, b] = self.sums[cell].map(|s| ((s + n / 2) / n) as u8);
            Rgb([r, g, b])
        })
    }
}
