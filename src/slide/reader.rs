//! The pixel-access seam between slides and the tissue/tiling stages.
//!
//! Thumbnail sampling and tile extraction only need a slide's level-0 size
//! and rectangular RGBA regions. [`RegionReader`] captures exactly that, so
//! those stages run unchanged against a real [`Slide`](super::Slide) or a
//! synthetic raster.

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{RgbImage, RgbaImage};

use crate::error::RegionError;
use crate::tiler::composite_over_white;

/// Random access to a slide's full-resolution pixels.
#[async_trait]
pub trait RegionReader: Send + Sync {
    /// Level-0 `(width, height)` in pixels.
    fn dimensions(&self) -> (u32, u32);

    /// Read a `width` x `height` RGBA region at level-0 origin `(x, y)`.
    ///
    /// Pixels of the region that fall outside the slide are transparent
    /// (alpha 0).
    async fn read_region(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RegionError>;

    /// An RGB overview of the whole slide resized to `width` x `height`.
    ///
    /// The default reads the full level-0 raster; implementations with a
    /// pyramid override it to start from a smaller level.
    async fn read_thumbnail(&self, width: u32, height: u32) -> Result<RgbImage, RegionError> {
        let (w0, h0) = self.dimensions();
        let full = self.read_region(0, 0, w0, h0).await?;
        Ok(resize_rgb(&composite_over_white(&full), width, height))
    }
}

/// Bilinear resize, skipped when the size already matches.
pub fn resize_rgb(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    if image.dimensions() == (width, height) {
        return image.clone();
    }
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// A slide backed by an in-memory RGBA raster.
///
/// Useful as a stand-in for a real slide when driving the pipeline stages
/// directly.
#[derive(Debug, Clone)]
pub struct RasterSlide {
    raster: RgbaImage,
}

impl RasterSlide {
    pub fn new(raster: RgbaImage) -> Self {
        Self { raster }
    }

    pub fn from_rgb(rgb: &RgbImage) -> Self {
        Self::new(image::DynamicImage::ImageRgb8(rgb.clone()).to_rgba8())
    }
}

#[async_trait]
impl RegionReader for RasterSlide {
    fn dimensions(&self) -> (u32, u32) {
        self.raster.dimensions()
    }

    async fn read_region(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RegionError> {
        if width == 0 || height == 0 {
            return Err(RegionError::EmptyRegion { width, height });
        }
        let mut out = RgbaImage::new(width, height);
        let (w0, h0) = self.raster.dimensions();
        for dy in 0..height {
            let sy = y as u64 + dy as u64;
            if sy >= h0 as u64 {
                break;
            }
            for dx in 0..width {
                let sx = x as u64 + dx as u64;
                if sx >= w0 as u64 {
                    break;
                }
                out.put_pixel(dx, dy, *self.raster.get_pixel(sx as u32, sy as u32));
            }
        }
        Ok(out)
    }
}
