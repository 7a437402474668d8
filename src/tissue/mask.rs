//! Tissue mask construction.
//!
//! # Stages
//!
//! 1. HSV saturation of the thumbnail
//! 2. Otsu binarization, `S > t` is tissue
//! 3. Opening then closing with an elliptical kernel
//! 4. Removal of 8-connected regions below a fraction of the thumbnail area
//!
//! The resulting [`TissueMask`] is immutable and answers coverage queries
//! over rectangles in constant time.

use image::{GrayImage, RgbImage};
use tracing::debug;

use super::components::{min_region_area, remove_small_regions};
use super::morphology::open_close;
use super::otsu::{binarize, otsu_threshold};
use super::saturation::saturation_channel;

/// Default structuring element diameter
pub const DEFAULT_OPEN_CLOSE: u32 = 5;

/// Default minimum region size, as a fraction of the thumbnail area
pub const DEFAULT_MIN_FRAC: f64 = 1e-3;

/// Parameters of the mask builder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskParams {
    /// Structuring element diameter, 0 disables morphology
    pub open_close: u32,
    /// Minimum region area fraction, 0 disables region removal
    pub min_frac: f64,
}

impl Default for MaskParams {
    fn default() -> Self {
        Self {
            open_close: DEFAULT_OPEN_CLOSE,
            min_frac: DEFAULT_MIN_FRAC,
        }
    }
}

/// Tissue pixels and background pixels in a mask rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiCoverage {
    pub tissue: u64,
    pub total: u64,
}

impl RoiCoverage {
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn is_full(&self) -> bool {
        self.total > 0 && self.tissue == self.total
    }

    /// Fraction of tissue pixels, 0 for an empty rectangle.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.tissue as f64 / self.total as f64
        }
    }
}

/// Binary tissue mask, 255 = tissue, 0 = background.
#[derive(Debug, Clone)]
pub struct TissueMask {
    image: GrayImage,
    /// Summed-area table of tissue pixels, `(w + 1) * (h + 1)`
    integral: Vec<u64>,
}

impl TissueMask {
    /// Wrap an existing binary raster. Any non-zero pixel counts as tissue
    /// and is stored as 255.
    pub fn from_binary(mut image: GrayImage) -> Self {
        for p in image.pixels_mut() {
            if p.0[0] != 0 {
                p.0[0] = 255;
            }
        }

        let (w, h) = (image.width() as usize, image.height() as usize);
        let stride = w + 1;
        let mut integral = vec![0u64; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0u64;
            for x in 0..w {
                if image.get_pixel(x as u32, y as u32).0[0] == 255 {
                    row += 1;
                }
                integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row;
            }
        }

        Self { image, integral }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    pub fn into_image(self) -> GrayImage {
        self.image
    }

    pub fn is_tissue(&self, x: u32, y: u32) -> bool {
        x < self.width() && y < self.height() && self.image.get_pixel(x, y).0[0] == 255
    }

    pub fn tissue_pixels(&self) -> u64 {
        self.integral.last().copied().unwrap_or(0)
    }

    /// Coverage of the half-open rectangle `[x0, x1) x [y0, y1)`, clipped to
    /// the mask.
    pub fn roi_coverage(&self, x0: u32, y0: u32, x1: u32, y1: u32) -> RoiCoverage {
        let x1 = x1.min(self.width()) as usize;
        let y1 = y1.min(self.height()) as usize;
        let (x0, y0) = (x0 as usize, y0 as usize);
        if x0 >= x1 || y0 >= y1 {
            return RoiCoverage {
                tissue: 0,
                total: 0,
            };
        }

        let stride = self.width() as usize + 1;
        let at = |x: usize, y: usize| self.integral[y * stride + x];
        let tissue = at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0);

        RoiCoverage {
            tissue,
            total: ((x1 - x0) * (y1 - y0)) as u64,
        }
    }
}

/// Build the tissue mask of an RGB thumbnail.
pub fn build_tissue_mask(thumb: &RgbImage, params: &MaskParams) -> TissueMask {
    let (w, h) = thumb.dimensions();
    let channel = saturation_channel(thumb);
    build_mask_from_channel(&channel, params, w, h)
}

/// Build the tissue mask from an already computed 8-bit channel.
pub fn build_mask_from_channel(
    channel: &GrayImage,
    params: &MaskParams,
    width: u32,
    height: u32,
) -> TissueMask {
    let threshold = otsu_threshold(channel);
    let mut mask = open_close(&binarize(channel, threshold), params.open_close);

    let mut removed = 0;
    if params.min_frac > 0.0 {
        removed = remove_small_regions(&mut mask, min_region_area(width, height, params.min_frac));
    }

    let mask = TissueMask::from_binary(mask);
    debug!(
        threshold,
        removed_regions = removed,
        tissue_pixels = mask.tissue_pixels(),
        width,
        height,
        "built tissue mask"
    );
    mask
}
