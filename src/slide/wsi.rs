//! Opened whole-slide images.
//!
//! A [`Slide`] owns the range reader of one slide file and its parsed
//! pyramid. Regions are composed from decoded native tiles; pixels outside
//! the level stay transparent.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use image::{ImageFormat, RgbImage, RgbaImage};
use tracing::debug;

use crate::error::{RegionError, SlideOpenError};
use crate::format::tiff::Compression;
use crate::format::{detect_format, SlideFormat, SvsMetadata, TiledSlideFile};
use crate::io::{
    BlockCache, FileRangeReader, RangeReader, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS,
};
use crate::tiler::composite_over_white;

use super::reader::{resize_rgb, RegionReader};
use super::reduce::BoxReducer;
use super::tile_cache::{DecodedTileCache, TileKey, DEFAULT_DECODED_CACHE_BYTES};

/// Cache sizing for an opened slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlideCacheOptions {
    /// Block size of the byte-range cache
    pub block_size: usize,
    /// Number of blocks kept by the byte-range cache
    pub cache_blocks: usize,
    /// Bytes of decoded tile pixels kept
    pub decoded_tile_bytes: usize,
}

impl Default for SlideCacheOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
            decoded_tile_bytes: DEFAULT_DECODED_CACHE_BYTES,
        }
    }
}

/// A slide file on local disk.
pub type LocalSlide = Slide<BlockCache<FileRangeReader>>;

/// An opened SVS or pyramidal TIFF slide.
pub struct Slide<R> {
    reader: R,
    file: TiledSlideFile,
    tiles: DecodedTileCache,
}

impl Slide<BlockCache<FileRangeReader>> {
    /// Open a slide file from disk behind a block cache.
    pub async fn open_path(
        path: impl AsRef<Path>,
        options: &SlideCacheOptions,
    ) -> Result<Self, SlideOpenError> {
        let file = FileRangeReader::open(path).await?;
        let reader = BlockCache::with_capacity(file, options.block_size, options.cache_blocks);
        Self::open_with_cache(reader, options.decoded_tile_bytes).await
    }
}

impl<R: RangeReader> Slide<R> {
    /// Detect the format, parse the pyramid and check that it can be decoded.
    pub async fn open(reader: R) -> Result<Self, SlideOpenError> {
        Self::open_with_cache(reader, DEFAULT_DECODED_CACHE_BYTES).await
    }

    async fn open_with_cache(reader: R, decoded_tile_bytes: usize) -> Result<Self, SlideOpenError> {
        let format = detect_format(&reader).await?;
        let file = TiledSlideFile::open(&reader, format).await?;

        let (width, height) = file.dimensions().ok_or(SlideOpenError::NoPyramid)?;
        if width == 0 || height == 0 {
            return Err(SlideOpenError::EmptyDimensions { width, height });
        }
        for (index, data) in file.levels().iter().enumerate() {
            let compression = Compression::from_u16(data.level.compression);
            if compression != Compression::Jpeg {
                return Err(SlideOpenError::UnsupportedCompression {
                    level: index,
                    compression: compression.name(),
                });
            }
        }

        debug!(
            slide = reader.identifier(),
            format = format.name(),
            width,
            height,
            levels = file.level_count(),
            mpp = ?file.metadata().mpp,
            "opened slide"
        );

        Ok(Slide {
            reader,
            file,
            tiles: DecodedTileCache::with_capacity(decoded_tile_bytes),
        })
    }

    pub fn identifier(&self) -> &str {
        self.reader.identifier()
    }

    pub fn format(&self) -> SlideFormat {
        self.file.format()
    }

    pub fn metadata(&self) -> &SvsMetadata {
        self.file.metadata()
    }

    pub fn level_count(&self) -> usize {
        self.file.level_count()
    }

    pub fn level_dimensions(&self, level: usize) -> Option<(u32, u32)> {
        self.file.level(level).map(|l| (l.level.width, l.level.height))
    }

    pub fn level_downsample(&self, level: usize) -> Option<f64> {
        self.file.level(level).map(|l| l.level.downsample)
    }

    /// Read an RGBA region at `level`, in that level's pixel coordinates.
    pub async fn read_level_region(
        &self,
        level: usize,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RegionError> {
        if width == 0 || height == 0 {
            return Err(RegionError::EmptyRegion { width, height });
        }
        let data = self.file.level(level).ok_or(RegionError::LevelOutOfRange {
            level,
            count: self.file.level_count(),
        })?;
        let lvl = &data.level;

        let mut canvas = RgbaImage::new(width, height);

        let (x0, y0) = (x as u64, y as u64);
        let x_end = (x0 + width as u64).min(lvl.width as u64);
        let y_end = (y0 + height as u64).min(lvl.height as u64);
        if x0 >= x_end || y0 >= y_end {
            return Ok(canvas);
        }

        let (tw, th) = (lvl.tile_width as u64, lvl.tile_height as u64);
        let stride = width as usize * 4;

        for ty in y0 / th..=(y_end - 1) / th {
            for tx in x0 / tw..=(x_end - 1) / tw {
                let tile = self.decoded_tile(level, tx as u32, ty as u32).await?;
                let (ox, oy) = (tx * tw, ty * th);

                // overlap of region, tile and decoded pixels, in level coordinates
                let sx0 = x0.max(ox);
                let sx1 = x_end.min(ox + tw).min(ox + tile.width() as u64);
                let sy0 = y0.max(oy);
                let sy1 = y_end.min(oy + th).min(oy + tile.height() as u64);
                if sx0 >= sx1 || sy0 >= sy1 {
                    continue;
                }

                let row_bytes = (sx1 - sx0) as usize * 4;
                let tile_stride = tile.width() as usize * 4;
                let src: &[u8] = tile.as_raw();
                let dst: &mut [u8] = &mut canvas;
                for py in sy0..sy1 {
                    let s = (py - oy) as usize * tile_stride + (sx0 - ox) as usize * 4;
                    let d = (py - y0) as usize * stride + (sx0 - x0) as usize * 4;
                    dst[d..d + row_bytes].copy_from_slice(&src[s..s + row_bytes]);
                }
            }
        }

        Ok(canvas)
    }

    async fn decoded_tile(
        &self,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Arc<RgbaImage>, RegionError> {
        let key: TileKey = (level, tile_x, tile_y);
        if let Some(tile) = self.tiles.get(&key).await {
            return Ok(tile);
        }

        let jpeg = self
            .file
            .read_tile(&self.reader, level, tile_x, tile_y)
            .await
            .map_err(|source| RegionError::TileRead {
                level,
                tile_x,
                tile_y,
                source,
            })?;

        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory_with_format(&jpeg, ImageFormat::Jpeg).map(|img| img.to_rgba8())
        })
        .await
        .map_err(|e| RegionError::Task(e.to_string()))?
        .map_err(|e| RegionError::Decode {
            level,
            tile_x,
            tile_y,
            message: e.to_string(),
        })?;

        let tile = Arc::new(decoded);
        self.tiles.put(key, Arc::clone(&tile)).await;
        Ok(tile)
    }
}

#[async_trait]
impl<R: RangeReader> RegionReader for Slide<R> {
    fn dimensions(&self) -> (u32, u32) {
        self.level_dimensions(0).unwrap_or((0, 0))
    }

    async fn read_region(
        &self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, RegionError> {
        self.read_level_region(0, x, y, width, height).await
    }

    /// Reads the coarsest level that is still at least as detailed as the
    /// requested size, then resizes.
    ///
    /// When that level is at least twice the requested size it is block
    /// averaged tile by tile, so the whole level is never held in memory.
    async fn read_thumbnail(&self, width: u32, height: u32) -> Result<RgbImage, RegionError> {
        let (w0, h0) = self.dimensions();
        let (req_w, req_h) = (width.max(1), height.max(1));
        let downsample = (w0 as f64 / req_w as f64).min(h0 as f64 / req_h as f64);
        let level = self.file.best_level_for_downsample(downsample);
        let data = self.file.level(level).ok_or(RegionError::LevelOutOfRange {
            level,
            count: self.file.level_count(),
        })?;
        let lvl = &data.level;
        let (lw, lh) = (lvl.width, lvl.height);
        let factor = (lw / req_w).min(lh / req_h);

        debug!(
            slide = self.identifier(),
            level,
            level_width = lw,
            level_height = lh,
            factor,
            "sampling thumbnail"
        );

        if factor < 2 {
            let raster = self.read_level_region(level, 0, 0, lw, lh).await?;
            return Ok(resize_rgb(&composite_over_white(&raster), width, height));
        }

        let (tw, th) = (lvl.tile_width, lvl.tile_height);
        let (tiles_x, tiles_y) = (lvl.tiles_x, lvl.tiles_y);
        let mut reducer = BoxReducer::new(lw, lh, factor);
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                let tile = self.decoded_tile(level, tx, ty).await?;
                reducer.add_tile(tx * tw, ty * th, &tile, tw, th);
            }
        }

        Ok(resize_rgb(&reducer.finish(), width, height))
    }
}
