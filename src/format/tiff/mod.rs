//! Native TIFF / BigTIFF parsing for slide files.
//!
//! Byte order comes from the header (`II` little-endian, `MM` big-endian)
//! and applies to every multi-byte value. Classic TIFF uses 32-bit offsets,
//! BigTIFF 64-bit ones; both are handled by the same types. Small tag
//! values are stored inline in their IFD entry, larger ones at an offset.

mod parser;
mod pyramid;
mod tags;
mod values;

pub use parser::{ByteOrder, Ifd, IfdEntry, TiffHeader, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};
pub use pyramid::{read_ifd, PyramidLevel, TiffPyramid, TileData};
pub use tags::{Compression, FieldType, TiffTag};
pub use values::{parse_u64_array, ValueReader};
