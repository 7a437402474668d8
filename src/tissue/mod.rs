//! Tissue detection on slide thumbnails.
//!
//! A slide is sampled at a large downsampling factor and the resulting RGB
//! thumbnail is turned into a binary mask separating stained tissue from
//! glass background. The tiler then uses the mask to decide which
//! full-resolution tiles to keep.

mod components;
mod mask;
mod morphology;
mod otsu;
mod saturation;
mod thumbnail;

pub use components::{min_region_area, remove_small_regions};
pub use mask::{
    build_mask_from_channel, build_tissue_mask, MaskParams, RoiCoverage, TissueMask,
    DEFAULT_MIN_FRAC, DEFAULT_OPEN_CLOSE,
};
pub use morphology::{close, dilate, erode, open, open_close, Kernel};
pub use otsu::{binarize, otsu_threshold};
pub use saturation::saturation_channel;
pub use thumbnail::{sample_thumbnail, thumbnail_size, Thumbnail, DEFAULT_DOWNSAMPLE};
