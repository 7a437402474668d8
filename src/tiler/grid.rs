/// Level-0 to mask coordinate mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleMap {
    pub sx: f64,
    pub sy: f64,
    /// Mask `(tw, th)`
    pub mask_size: (u32, u32),
}

/// Half-open rectangle `[x0, x1) x [y0, y1)` in mask pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaskRoi {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl MaskRoi {
    pub fn is_empty(&self) -> bool {
        self.x0 >= self.x1 || self.y0 >= self.y1
    }
}

impl ScaleMap {
    /// `sx = tw / W0`, `sy = th / H0`.
    pub fn new(mask_size: (u32, u32), slide_size: (u32, u32)) -> Self {
        let ratio = |m: u32, s: u32| if s == 0 { 0.0 } else { m as f64 / s as f64 };
        Self {
            sx: ratio(mask_size.0, slide_size.0),
            sy: ratio(mask_size.1, slide_size.1),
            mask_size,
        }
    }

    /// Mask rectangle under a level-0 tile, coordinates truncated toward
    /// zero and clamped to the mask.
    pub fn roi(&self, x: u32, y: u32, tile_px: u32) -> MaskRoi {
        let map = |v: u64, scale: f64, limit: u32| {
            ((v as f64 * scale) as i64).clamp(0, limit as i64) as u32
        };
        let (tw, th) = self.mask_size;
        MaskRoi {
            x0: map(x as u64, self.sx, tw),
            y0: map(y as u64, self.sy, th),
            x1: map(x as u64 + tile_px as u64, self.sx, tw),
            y1: map(y as u64 + tile_px as u64, self.sy, th),
        }
    }
}

/// Full tiles of a level-0 raster in row-major order.
///
/// Partial tiles at the right and bottom edges are not produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub width: u32,
    pub height: u32,
    pub tile_px: u32,
}

impl TileGrid {
    pub fn new(slide_size: (u32, u32), tile_px: u32) -> Self {
        Self {
            width: slide_size.0,
            height: slide_size.1,
            tile_px,
        }
    }

    pub fn columns(&self) -> u32 {
        self.width.checked_div(self.tile_px).unwrap_or(0)
    }

    pub fn rows(&self) -> u32 {
        self.height.checked_div(self.tile_px).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tile origins `(x, y)`, `y` outer and `x` inner.
    pub fn origins(&self) -> impl Iterator<Item = (u32, u32)> {
        let (cols, rows, step) = (self.columns(), self.rows(), self.tile_px);
        (0..rows).flat_map(move |r| (0..cols).map(move |c| (c * step, r * step)))
    }
}
