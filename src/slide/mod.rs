//! Slide access.
//!
//! [`Slide`] opens an Aperio SVS or generic pyramidal TIFF file and reads
//! RGBA regions from it. The tissue and tiling stages depend only on the
//! [`RegionReader`] trait, which [`Slide`] and the in-memory
//! [`RasterSlide`] implement.

mod reader;
mod reduce;
mod tile_cache;
mod wsi;

pub use reader::{resize_rgb, RasterSlide, RegionReader};
pub use tile_cache::{DecodedTileCache, TileKey, DEFAULT_DECODED_CACHE_BYTES};
pub use wsi::{LocalSlide, Slide, SlideCacheOptions};
