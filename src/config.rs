//! Command-line configuration for the tiler.
//!
//! Every option can also be set through an environment variable with the
//! `WSI_TILER_` prefix:
//!
//! - `WSI_TILER_WSI_DIR` - Directory of slide files (required)
//! - `WSI_TILER_PATTERN` - Glob pattern inside the slide directory (default: *.svs)
//! - `WSI_TILER_OUT_DIR` - Output root (default: .)
//! - `WSI_TILER_LABELS_CSV` - Slide label table
//! - `WSI_TILER_DOWNSAMPLE` - Thumbnail downsampling factor (default: 32)
//! - `WSI_TILER_TILE_PX` - Tile side in level-0 pixels (default: 512)
//! - `WSI_TILER_RELAX` - Relaxed tissue acceptance (default: false)
//! - `WSI_TILER_RELAXED_COVERAGE` - Relaxed acceptance threshold (default: 0.95)
//! - `WSI_TILER_OPEN_CLOSE` - Morphology kernel diameter (default: 5)
//! - `WSI_TILER_MIN_FRAC` - Minimum tissue region fraction (default: 0.001)
//! - `WSI_TILER_SKIP_EXISTING` - Skip slides with a finished table (default: false)
//! - `WSI_TILER_WORKERS` - Concurrent tile extractions (default: CPU count)
//! - `WSI_TILER_QC_TILES` / `WSI_TILER_QC_SIZE` / `WSI_TILER_NO_QC` - QC montage
//! - `WSI_TILER_BLOCK_SIZE` / `WSI_TILER_CACHE_BLOCKS` - Slide read cache

use std::path::PathBuf;

use clap::Parser;

use crate::dataset::{QcOptions, DEFAULT_QC_SIZE, DEFAULT_QC_TILES};
use crate::io::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};
use crate::pipeline::{PipelineOptions, DEFAULT_PATTERN};
use crate::slide::{SlideCacheOptions, DEFAULT_DECODED_CACHE_BYTES};
use crate::tiler::{
    default_workers, AcceptancePolicy, ScanOptions, DEFAULT_RELAXED_COVERAGE, DEFAULT_TILE_PX,
};
use crate::tissue::{MaskParams, DEFAULT_DOWNSAMPLE, DEFAULT_MIN_FRAC, DEFAULT_OPEN_CLOSE};

/// Smallest accepted block size.
pub const MIN_BLOCK_SIZE: usize = 1024;

/// Largest accepted block size.
pub const MAX_BLOCK_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// CLI Arguments
// =============================================================================

/// wsi-tiler - Turn whole-slide images into a labeled tile dataset.
///
/// Detects tissue on a thumbnail of each slide, cuts full-resolution tiles
/// that lie on tissue and writes them with per-slide and aggregate CSV tables.
#[derive(Parser, Debug, Clone)]
#[command(name = "wsi-tiler")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Input / Output
    // =========================================================================
    /// Directory containing the slide files.
    #[arg(long, env = "WSI_TILER_WSI_DIR")]
    pub wsi_dir: PathBuf,

    /// Glob pattern selecting slides inside the directory.
    #[arg(long, default_value = DEFAULT_PATTERN, env = "WSI_TILER_PATTERN")]
    pub pattern: String,

    /// Output root; `data/images` and `data/labels` are created below it.
    #[arg(long, default_value = ".", env = "WSI_TILER_OUT_DIR")]
    pub out_dir: PathBuf,

    /// CSV table of slide-level labels.
    #[arg(long, env = "WSI_TILER_LABELS_CSV")]
    pub labels_csv: Option<PathBuf>,

    // =========================================================================
    // Tissue Detection
    // =========================================================================
    /// Downsampling factor of the thumbnail used for tissue detection.
    #[arg(long, default_value_t = DEFAULT_DOWNSAMPLE, env = "WSI_TILER_DOWNSAMPLE")]
    pub downsample: u32,

    /// Diameter of the morphology kernel; 0 disables opening/closing.
    #[arg(long, default_value_t = DEFAULT_OPEN_CLOSE, env = "WSI_TILER_OPEN_CLOSE")]
    pub open_close: u32,

    /// Tissue regions smaller than this fraction of the thumbnail are dropped.
    #[arg(long, default_value_t = DEFAULT_MIN_FRAC, env = "WSI_TILER_MIN_FRAC")]
    pub min_frac: f64,

    // =========================================================================
    // Tiling
    // =========================================================================
    /// Tile side in level-0 pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_PX, env = "WSI_TILER_TILE_PX")]
    pub tile_px: u32,

    /// Accept tiles that are mostly tissue instead of entirely tissue.
    #[arg(long, default_value_t = false, env = "WSI_TILER_RELAX")]
    pub relax: bool,

    /// Minimum tissue fraction for relaxed acceptance.
    #[arg(long, default_value_t = DEFAULT_RELAXED_COVERAGE, env = "WSI_TILER_RELAXED_COVERAGE")]
    pub relaxed_coverage: f64,

    /// Number of tiles extracted concurrently.
    #[arg(long, default_value_t = default_workers(), env = "WSI_TILER_WORKERS")]
    pub workers: usize,

    /// Skip slides whose tile table exists and is fully labeled.
    #[arg(long, default_value_t = false, env = "WSI_TILER_SKIP_EXISTING")]
    pub skip_existing: bool,

    // =========================================================================
    // QC Montage
    // =========================================================================
    /// Number of tiles in the QC montage.
    #[arg(long, default_value_t = DEFAULT_QC_TILES, env = "WSI_TILER_QC_TILES")]
    pub qc_tiles: usize,

    /// Side of each QC montage cell in pixels.
    #[arg(long, default_value_t = DEFAULT_QC_SIZE, env = "WSI_TILER_QC_SIZE")]
    pub qc_size: u32,

    /// Do not write QC montages.
    #[arg(long, default_value_t = false, env = "WSI_TILER_NO_QC")]
    pub no_qc: bool,

    // =========================================================================
    // Slide Reading
    // =========================================================================
    /// Block size in bytes for the slide read cache.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE, env = "WSI_TILER_BLOCK_SIZE")]
    pub block_size: usize,

    /// Number of blocks kept per slide.
    #[arg(long, default_value_t = DEFAULT_CACHE_BLOCKS, env = "WSI_TILER_CACHE_BLOCKS")]
    pub cache_blocks: usize,

    // =========================================================================
    // Logging
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.downsample == 0 {
            return Err("downsample must be greater than 0".to_string());
        }
        if self.tile_px == 0 {
            return Err("tile_px must be greater than 0".to_string());
        }
        if !(0.0..1.0).contains(&self.min_frac) {
            return Err("min_frac must be in [0, 1)".to_string());
        }
        if !(self.relaxed_coverage > 0.0 && self.relaxed_coverage <= 1.0) {
            return Err("relaxed_coverage must be in (0, 1]".to_string());
        }
        if self.workers == 0 {
            return Err("workers must be greater than 0".to_string());
        }
        if self.qc_size == 0 {
            return Err("qc_size must be greater than 0".to_string());
        }
        if self.cache_blocks == 0 {
            return Err("cache_blocks must be greater than 0".to_string());
        }
        if self.block_size < MIN_BLOCK_SIZE || self.block_size > MAX_BLOCK_SIZE {
            return Err("block_size must be between 1KB and 16MB".to_string());
        }

        Ok(())
    }

    /// The tile acceptance rule selected by `--relax`.
    pub fn policy(&self) -> AcceptancePolicy {
        if self.relax {
            AcceptancePolicy::Relaxed {
                min_coverage: self.relaxed_coverage,
            }
        } else {
            AcceptancePolicy::Strict
        }
    }

    /// Library options for a batch run.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            wsi_dir: self.wsi_dir.clone(),
            pattern: self.pattern.clone(),
            out_dir: self.out_dir.clone(),
            labels_csv: self.labels_csv.clone(),
            downsample: self.downsample,
            mask: MaskParams {
                open_close: self.open_close,
                min_frac: self.min_frac,
            },
            scan: ScanOptions {
                tile_px: self.tile_px,
                policy: self.policy(),
                workers: self.workers,
            },
            skip_existing: self.skip_existing,
            qc: (!self.no_qc && self.qc_tiles > 0).then_some(QcOptions {
                tiles: self.qc_tiles,
                size: self.qc_size,
            }),
            cache: SlideCacheOptions {
                block_size: self.block_size,
                cache_blocks: self.cache_blocks,
                decoded_tile_bytes: DEFAULT_DECODED_CACHE_BYTES,
            },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
