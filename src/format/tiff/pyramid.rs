//! Pyramid level identification.
//!
//! A slide file holds more IFDs than pyramid levels: label, macro and
//! thumbnail images sit in the same chain. Levels are the tiled IFDs whose
//! aspect ratio matches the largest tiled image, which becomes level 0.

use std::collections::HashSet;

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, Ifd, TiffHeader, BIGTIFF_HEADER_SIZE};
use super::tags::TiffTag;
use super::values::ValueReader;

/// Upper bound on IFDs walked per file.
const MAX_IFDS: usize = 256;

/// Relative difference allowed between horizontal and vertical downsample.
const DOWNSAMPLE_TOLERANCE: f64 = 0.05;

// =============================================================================
// PyramidLevel
// =============================================================================

/// One resolution of the image pyramid.
#[derive(Debug, Clone)]
pub struct PyramidLevel {
    /// 0 is full resolution
    pub level_index: usize,
    /// Position of the IFD in the file's chain
    pub ifd_index: usize,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tiles_x: u32,
    pub tiles_y: u32,
    /// Relative to level 0, averaged over both axes
    pub downsample: f64,
    pub compression: u16,
    pub ifd: Ifd,
}

impl PyramidLevel {
    fn from_ifd(ifd: Ifd, ifd_index: usize, byte_order: ByteOrder) -> Option<Self> {
        if !ifd.is_tiled() || ifd.get_entry_by_tag(TiffTag::TileByteCounts).is_none() {
            return None;
        }
        let tile_width = ifd.tile_width(byte_order).filter(|&w| w > 0)?;
        let tile_height = ifd.tile_height(byte_order).filter(|&h| h > 0)?;
        let width = ifd.image_width(byte_order)?;
        let height = ifd.image_height(byte_order)?;

        Some(PyramidLevel {
            level_index: 0,
            ifd_index,
            width,
            height,
            tile_width,
            tile_height,
            tiles_x: width.div_ceil(tile_width),
            tiles_y: height.div_ceil(tile_height),
            downsample: 1.0,
            // an absent Compression tag means uncompressed
            compression: ifd.compression(byte_order).unwrap_or(1),
            ifd,
        })
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_x as usize * self.tiles_y as usize
    }

    /// Row-major index of a tile, `None` outside the grid.
    pub fn tile_index(&self, tile_x: u32, tile_y: u32) -> Option<usize> {
        if tile_x >= self.tiles_x || tile_y >= self.tiles_y {
            return None;
        }
        Some(tile_y as usize * self.tiles_x as usize + tile_x as usize)
    }
}

// =============================================================================
// TileData
// =============================================================================

/// Where each tile of a level lives in the file.
#[derive(Debug, Clone)]
pub struct TileData {
    pub offsets: Vec<u64>,
    pub byte_counts: Vec<u64>,
    /// Shared quantization/Huffman tables for abbreviated JPEG tiles
    pub jpeg_tables: Option<Bytes>,
}

impl TileData {
    /// Read the offset and byte-count arrays and JPEGTables of a level.
    pub async fn load<R: RangeReader>(
        reader: &R,
        level: &PyramidLevel,
        header: &TiffHeader,
    ) -> Result<Self, TiffError> {
        let values = ValueReader::new(reader, header);

        let offsets_entry = level
            .ifd
            .get_entry_by_tag(TiffTag::TileOffsets)
            .ok_or(TiffError::MissingTag(TiffTag::TileOffsets.name()))?;
        let counts_entry = level
            .ifd
            .get_entry_by_tag(TiffTag::TileByteCounts)
            .ok_or(TiffError::MissingTag(TiffTag::TileByteCounts.name()))?;

        let offsets = values.read_u64_array(offsets_entry).await?;
        let byte_counts = values.read_u64_array(counts_entry).await?;

        let expected = level.tile_count();
        for (tag, len) in [
            (TiffTag::TileOffsets, offsets.len()),
            (TiffTag::TileByteCounts, byte_counts.len()),
        ] {
            if len < expected {
                return Err(TiffError::InvalidTagValue {
                    tag: tag.name(),
                    message: format!("{} entries for a {} tile grid", len, expected),
                });
            }
        }

        let jpeg_tables = match level.ifd.get_entry_by_tag(TiffTag::JpegTables) {
            Some(entry) => Some(values.read_bytes(entry).await?),
            None => None,
        };

        Ok(TileData {
            offsets,
            byte_counts,
            jpeg_tables,
        })
    }

    /// `(offset, byte_count)` of the tile at `index`.
    pub fn location(&self, index: usize) -> Option<(u64, u64)> {
        Some((*self.offsets.get(index)?, *self.byte_counts.get(index)?))
    }
}

// =============================================================================
// TiffPyramid
// =============================================================================

/// All pyramid levels of a file, level 0 first.
#[derive(Debug, Clone)]
pub struct TiffPyramid {
    pub header: TiffHeader,
    pub levels: Vec<PyramidLevel>,
    /// Every IFD of the chain in file order, including non-pyramid images
    pub ifds: Vec<Ifd>,
}

impl TiffPyramid {
    /// Parse the header, walk the IFD chain and identify pyramid levels.
    pub async fn parse<R: RangeReader>(reader: &R) -> Result<Self, TiffError> {
        let head_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
        let head = reader.read_exact_at(0, head_len).await?;
        let header = TiffHeader::parse(&head, reader.size())?;

        let ifds = read_ifd_chain(reader, &header).await?;
        let levels = identify_levels(&ifds, header.byte_order);

        Ok(TiffPyramid {
            header,
            levels,
            ifds,
        })
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    /// Dimensions of level 0.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.width, l.height))
    }
}

/// Read one IFD at `offset`.
pub async fn read_ifd<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
    offset: u64,
) -> Result<Ifd, TiffError> {
    let count_bytes = reader.read_exact_at(offset, header.ifd_count_size()).await?;
    let size = Ifd::calculate_size(header.read_entry_count(&count_bytes), header);
    let bytes = reader.read_exact_at(offset, size).await?;
    Ifd::parse(&bytes, header)
}

async fn read_ifd_chain<R: RangeReader>(
    reader: &R,
    header: &TiffHeader,
) -> Result<Vec<Ifd>, TiffError> {
    let mut ifds = Vec::new();
    let mut seen = HashSet::new();
    let mut offset = header.first_ifd_offset;

    while offset != 0 && ifds.len() < MAX_IFDS {
        if !seen.insert(offset) || offset >= reader.size() {
            return Err(TiffError::InvalidIfdOffset(offset));
        }
        let ifd = read_ifd(reader, header, offset).await?;
        offset = ifd.next_ifd_offset;
        ifds.push(ifd);
    }

    Ok(ifds)
}

fn identify_levels(ifds: &[Ifd], byte_order: ByteOrder) -> Vec<PyramidLevel> {
    let mut candidates: Vec<PyramidLevel> = ifds
        .iter()
        .enumerate()
        .filter_map(|(i, ifd)| PyramidLevel::from_ifd(ifd.clone(), i, byte_order))
        .filter(|level| level.width > 0 && level.height > 0)
        .collect();

    // Largest area first; ties keep file order
    candidates.sort_by_key(|l| std::cmp::Reverse(l.width as u64 * l.height as u64));

    let Some(base) = candidates.first() else {
        return Vec::new();
    };
    let (base_w, base_h) = (base.width as f64, base.height as f64);

    let mut levels: Vec<PyramidLevel> = Vec::with_capacity(candidates.len());
    for mut level in candidates {
        let dx = base_w / level.width as f64;
        let dy = base_h / level.height as f64;
        if (dx - dy).abs() / dx.max(dy) > DOWNSAMPLE_TOLERANCE {
            // different aspect ratio: macro or label image
            continue;
        }
        if levels
            .iter()
            .any(|l| l.width == level.width && l.height == level.height)
        {
            continue;
        }
        level.level_index = levels.len();
        level.downsample = (dx + dy) / 2.0;
        levels.push(level);
    }

    levels
}
