//! Tile selection and extraction.
//!
//! # Components
//!
//! - [`TileGrid`] and [`ScaleMap`]: the level-0 tile grid and its mapping
//!   into tissue-mask coordinates
//! - [`AcceptancePolicy`]: strict or relaxed tissue coverage rule
//! - [`scan_tiles`]: concurrent extraction of accepted tiles to PNG
//! - [`composite_over_white`]: alpha flattening shared with the slide layer

mod composite;
mod encoder;
mod grid;
mod policy;
mod scanner;

pub use composite::{alpha_to_white, composite_over_white};
pub(crate) use composite::pixel_over_white;
pub use encoder::{encode_png, write_gray_png, write_png};
pub use grid::{MaskRoi, ScaleMap, TileGrid};
pub use policy::{AcceptancePolicy, DEFAULT_RELAXED_COVERAGE};
pub use scanner::{
    default_workers, scan_tiles, tile_file_name, ScanOptions, ScanOutcome, TileRecord,
    DEFAULT_TILE_PX,
};
