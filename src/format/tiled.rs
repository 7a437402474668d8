//! Tile-level access to a pyramidal TIFF slide.
//!
//! Opening a slide reads the IFD chain once, identifies the pyramid levels
//! and loads every level's tile offsets, byte counts and JPEGTables. After
//! that a tile costs one range read.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::detect::SlideFormat;
use super::jpeg::prepare_tile_jpeg;
use super::svs::SvsMetadata;
use super::tiff::{PyramidLevel, TiffPyramid, TiffTag, TileData, ValueReader};

/// A pyramid level with its tile locations.
#[derive(Debug, Clone)]
pub struct LevelData {
    pub level: PyramidLevel,
    pub tiles: TileData,
}

impl LevelData {
    /// `(offset, byte_count)` of a tile.
    pub fn tile_location(&self, tile_x: u32, tile_y: u32) -> Option<(u64, u64)> {
        self.tiles.location(self.level.tile_index(tile_x, tile_y)?)
    }
}

/// Parsed structure of an SVS or generic pyramidal TIFF file.
#[derive(Debug, Clone)]
pub struct TiledSlideFile {
    format: SlideFormat,
    levels: Vec<LevelData>,
    metadata: SvsMetadata,
}

impl TiledSlideFile {
    /// Parse the pyramid and load tile tables for every level.
    pub async fn open<R: RangeReader>(reader: &R, format: SlideFormat) -> Result<Self, TiffError> {
        let pyramid = TiffPyramid::parse(reader).await?;

        let mut levels = Vec::with_capacity(pyramid.level_count());
        for level in &pyramid.levels {
            let tiles = TileData::load(reader, level, &pyramid.header).await?;
            levels.push(LevelData {
                level: level.clone(),
                tiles,
            });
        }

        let metadata = match (format, pyramid.levels.first()) {
            (SlideFormat::AperioSvs, Some(base)) => {
                match base.ifd.get_entry_by_tag(TiffTag::ImageDescription) {
                    Some(entry) => {
                        let text = ValueReader::new(reader, &pyramid.header)
                            .read_string(entry)
                            .await?;
                        SvsMetadata::parse(&text)
                    }
                    None => SvsMetadata::default(),
                }
            }
            _ => SvsMetadata::default(),
        };

        Ok(TiledSlideFile {
            format,
            levels,
            metadata,
        })
    }

    pub fn format(&self) -> SlideFormat {
        self.format
    }

    pub fn metadata(&self) -> &SvsMetadata {
        &self.metadata
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn level(&self, index: usize) -> Option<&LevelData> {
        self.levels.get(index)
    }

    pub fn levels(&self) -> &[LevelData] {
        &self.levels
    }

    /// Level 0 dimensions.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.levels.first().map(|l| (l.level.width, l.level.height))
    }

    /// The coarsest level whose downsample does not exceed `downsample`.
    ///
    /// Falls back to level 0, so the result is never coarser than asked.
    pub fn best_level_for_downsample(&self, downsample: f64) -> usize {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, l)| l.level.downsample <= downsample + 1e-6)
            .max_by(|(_, a), (_, b)| a.level.downsample.total_cmp(&b.level.downsample))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// Read a tile and return a self-contained JPEG stream.
    pub async fn read_tile<R: RangeReader>(
        &self,
        reader: &R,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TiffError> {
        let data = self.levels.get(level).ok_or_else(|| TiffError::InvalidTagValue {
            tag: "level",
            message: format!("level {} out of range ({} levels)", level, self.levels.len()),
        })?;

        let (offset, size) =
            data.tile_location(tile_x, tile_y)
                .ok_or_else(|| TiffError::InvalidTagValue {
                    tag: TiffTag::TileOffsets.name(),
                    message: format!("tile ({}, {}) outside level {}", tile_x, tile_y, level),
                })?;
        if size == 0 {
            return Err(TiffError::InvalidTagValue {
                tag: TiffTag::TileByteCounts.name(),
                message: format!("tile ({}, {}) at level {} is empty", tile_x, tile_y, level),
            });
        }

        let raw = reader.read_exact_at(offset, size as usize).await?;
        Ok(prepare_tile_jpeg(data.tiles.jpeg_tables.as_deref(), &raw))
    }
}
