use image::RgbImage;

use crate::error::RegionError;
use crate::slide::{resize_rgb, RegionReader};

/// Default downsampling factor between level 0 and the thumbnail.
pub const DEFAULT_DOWNSAMPLE: u32 = 32;

/// Low-resolution RGB overview of a slide.
#[derive(Debug, Clone)]
pub struct Thumbnail {
    pub rgb: RgbImage,
    /// `(tw, th)`
    pub size: (u32, u32),
    /// Level-0 `(W0, H0)`
    pub slide_size: (u32, u32),
}

impl Thumbnail {
    /// `(tw / W0, th / H0)`: multiply a level-0 coordinate by it to land in
    /// thumbnail space.
    pub fn scale(&self) -> (f64, f64) {
        (
            self.size.0 as f64 / self.slide_size.0 as f64,
            self.size.1 as f64 / self.slide_size.1 as f64,
        )
    }
}

/// Thumbnail size for a slide: `max(1, W0 / d)` by `max(1, H0 / d)`.
///
/// A factor of 0 is treated as 1.
pub fn thumbnail_size(slide_size: (u32, u32), downsample: u32) -> (u32, u32) {
    let d = downsample.max(1);
    ((slide_size.0 / d).max(1), (slide_size.1 / d).max(1))
}

/// Sample the slide at `downsample` and return the RGB thumbnail.
pub async fn sample_thumbnail<S>(slide: &S, downsample: u32) -> Result<Thumbnail, RegionError>
where
    S: RegionReader + ?Sized,
{
    let slide_size = slide.dimensions();
    let (tw, th) = thumbnail_size(slide_size, downsample);

    let mut rgb = slide.read_thumbnail(tw, th).await?;
    if rgb.dimensions() != (tw, th) {
        rgb = resize_rgb(&rgb, tw, th);
    }

    Ok(Thumbnail {
        rgb,
        size: (tw, th),
        slide_size,
    })
}
