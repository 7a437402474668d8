use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading byte ranges from a slide file.
#[derive(Debug, Clone, Error)]
pub enum IoError {
    /// Operating system error on the underlying file
    #[error("I/O error on {path}: {message}")]
    File { path: String, message: String },

    /// Requested range exceeds resource bounds
    #[error("Range out of bounds: requested {requested} bytes at offset {offset}, size is {size}")]
    RangeOutOfBounds {
        offset: u64,
        requested: u64,
        size: u64,
    },

    /// File does not exist
    #[error("File not found: {0}")]
    NotFound(String),
}

/// Errors related to format detection.
#[derive(Debug, Clone, Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// Not a TIFF-based slide
    #[error("Unsupported format: {reason}")]
    UnsupportedFormat { reason: String },
}

/// Errors that can occur when parsing TIFF structures.
#[derive(Debug, Clone, Error)]
pub enum TiffError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// First two bytes are neither `II` nor `MM`
    #[error("Invalid TIFF magic bytes: expected 0x4949 (II) or 0x4D4D (MM), got 0x{0:04X}")]
    InvalidMagic(u16),

    #[error("Invalid TIFF version: expected 42 (TIFF) or 43 (BigTIFF), got {0}")]
    InvalidVersion(u16),

    #[error("Invalid BigTIFF offset byte size: expected 8, got {0}")]
    InvalidBigTiffOffsetSize(u16),

    #[error("File too small: need at least {required} bytes, got {actual}")]
    FileTooSmall { required: u64, actual: u64 },

    /// IFD offset points outside the file or back into the chain
    #[error("Invalid IFD offset: {0}")]
    InvalidIfdOffset(u64),

    #[error("Missing required tag: {0}")]
    MissingTag(&'static str),

    #[error("Invalid tag value for {tag}: {message}")]
    InvalidTagValue { tag: &'static str, message: String },

    #[error("Unknown field type: {0}")]
    UnknownFieldType(u16),
}

/// A slide could not be opened or its metadata could not be read.
///
/// Fatal for the slide it concerns; the batch moves on to the next slide.
#[derive(Debug, Clone, Error)]
pub enum SlideOpenError {
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    #[error("{0}")]
    Format(#[from] FormatError),

    #[error("TIFF error: {0}")]
    Tiff(#[from] TiffError),

    /// No IFD in the file qualifies as a tiled pyramid level
    #[error("No tiled pyramid levels found")]
    NoPyramid,

    #[error("Level {level} uses unsupported compression {compression} (only JPEG tiles are decoded)")]
    UnsupportedCompression { level: usize, compression: String },

    #[error("Slide has empty dimensions {width}x{height}")]
    EmptyDimensions { width: u32, height: u32 },
}

/// A pixel region could not be produced from the slide.
#[derive(Debug, Clone, Error)]
pub enum RegionError {
    #[error("Level {level} out of range (slide has {count} levels)")]
    LevelOutOfRange { level: usize, count: usize },

    #[error("Failed to read tile ({tile_x}, {tile_y}) at level {level}: {source}")]
    TileRead {
        level: usize,
        tile_x: u32,
        tile_y: u32,
        #[source]
        source: TiffError,
    },

    #[error("Failed to decode tile ({tile_x}, {tile_y}) at level {level}: {message}")]
    Decode {
        level: usize,
        tile_x: u32,
        tile_y: u32,
        message: String,
    },

    /// Width or height of the requested region is zero
    #[error("Requested region {width}x{height} is empty")]
    EmptyRegion { width: u32, height: u32 },

    /// A blocking decode task panicked or was cancelled
    #[error("Decode task failed: {0}")]
    Task(String),
}

/// A raster could not be encoded or written as PNG.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("PNG encode failed: {0}")]
    Png(#[from] image::ImageError),

    #[error("Cannot write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EncodeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EncodeError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Cause of a single tile failing to extract.
#[derive(Debug, Error)]
pub enum TileFailure {
    #[error("region read failed: {0}")]
    Read(#[from] RegionError),

    #[error("encode failed: {0}")]
    Encode(#[source] EncodeError),

    #[error("write failed: {0}")]
    Write(#[source] EncodeError),

    #[error("worker task failed: {0}")]
    Task(String),
}

/// One accepted tile could not be read, encoded or written.
///
/// The tile is dropped from the accepted set; the scan continues.
#[derive(Debug, Error)]
#[error("Tile at ({x}, {y}): {kind}")]
pub struct TileExtractionError {
    pub x: u32,
    pub y: u32,
    #[source]
    pub kind: TileFailure,
}

impl TileExtractionError {
    pub fn new(x: u32, y: u32, kind: impl Into<TileFailure>) -> Self {
        Self {
            x,
            y,
            kind: kind.into(),
        }
    }
}

/// The label table could not be used.
///
/// Callers treat this as an empty mapping after logging it.
#[derive(Debug, Error)]
pub enum LabelError {
    #[error("Cannot read label table {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    /// The name column or the label column is missing
    #[error("Label table {} has no recognized name/label columns (found: {headers})", .path.display())]
    MissingColumns { path: PathBuf, headers: String },

    #[error("Label table {} row {row}: label {value:?} is not an integer", .path.display())]
    InvalidLabel {
        path: PathBuf,
        row: usize,
        value: String,
    },
}

/// Processing of one slide failed.
#[derive(Debug, Error)]
pub enum SlideError {
    #[error("Failed to open slide: {0}")]
    Open(#[from] SlideOpenError),

    #[error("Failed to read thumbnail: {0}")]
    Thumbnail(#[from] RegionError),

    #[error("Failed to write image: {0}")]
    Encode(#[from] EncodeError),

    #[error("Failed to write {}: {message}", .path.display())]
    Output { path: PathBuf, message: String },
}

impl SlideError {
    pub(crate) fn output(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SlideError::Output {
            path: path.into(),
            message: err.to_string(),
        }
    }
}

/// Run-level failures that stop the whole batch.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid slide pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to write {}: {message}", .path.display())]
    Index { path: PathBuf, message: String },
}
