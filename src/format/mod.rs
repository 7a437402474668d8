//! Slide file formats.
//!
//! Supported formats are both TIFF based:
//!
//! - **Aperio SVS**: identified by the `Aperio` marker in ImageDescription
//! - **Generic pyramidal TIFF**: any other tiled, JPEG-compressed TIFF pyramid
//!
//! [`detect_format`] picks the format, [`TiledSlideFile`] parses the pyramid
//! and serves decodable JPEG tiles.

pub mod detect;
pub mod jpeg;
pub mod svs;
pub mod tiff;
pub mod tiled;

pub use detect::{detect_format, is_tiff_header, SlideFormat};
pub use jpeg::{is_abbreviated_stream, merge_jpeg_tables, prepare_tile_jpeg};
pub use svs::SvsMetadata;
pub use tiled::{LevelData, TiledSlideFile};
