use image::{GrayImage, Rgb, RgbImage};

use crate::error::SlideError;
use crate::tiler::{write_gray_png, write_png};
use crate::tissue::TissueMask;

use super::layout::{OutputLayout, ThumbKind};

const OVERLAY_COLOR: [u8; 3] = [0, 255, 0];

/// Thumbnail with tissue pixels blended half-and-half with green.
pub fn tissue_overlay(rgb: &RgbImage, mask: &TissueMask) -> RgbImage {
    let mut overlay = rgb.clone();
    for (x, y, px) in overlay.enumerate_pixels_mut() {
        if mask.is_tissue(x, y) {
            let blended: [u8; 3] = std::array::from_fn(|c| {
                (0.5 * px.0[c] as f64 + 0.5 * OVERLAY_COLOR[c] as f64) as u8
            });
            *px = Rgb(blended);
        }
    }
    overlay
}

/// Write the four per-slide thumbnails: RGB, saturation, mask and overlay.
pub fn save_thumbnails(
    layout: &OutputLayout,
    slide_id: &str,
    rgb: &RgbImage,
    saturation: &GrayImage,
    mask: &TissueMask,
) -> Result<(), SlideError> {
    let overlay = tissue_overlay(rgb, mask);

    for kind in ThumbKind::ALL {
        let path = layout.thumb_path(slide_id, kind);
        let written = match kind {
            ThumbKind::Rgb => write_png(&path, rgb),
            ThumbKind::Saturation => write_gray_png(&path, saturation),
            ThumbKind::Mask => write_gray_png(&path, mask.image()),
            ThumbKind::Overlay => write_png(&path, &overlay),
        };
        written?;
    }

    Ok(())
}
