//! Full-resolution tile scan.
//!
//! Every full tile of the level-0 grid is mapped into mask coordinates and
//! checked against the acceptance policy. Accepted tiles are read, flattened
//! over white and written as PNG by up to `workers` concurrent tasks.
//! A failing tile is logged and dropped; its siblings are unaffected.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{EncodeError, TileExtractionError, TileFailure};
use crate::slide::RegionReader;
use crate::tissue::TissueMask;

use super::composite::composite_over_white;
use super::encoder::encode_png;
use super::grid::{ScaleMap, TileGrid};
use super::policy::AcceptancePolicy;

/// Default output tile side in level-0 pixels
pub const DEFAULT_TILE_PX: u32 = 512;

/// Tile scan settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanOptions {
    pub tile_px: u32,
    pub policy: AcceptancePolicy,
    /// Maximum concurrent tile extractions
    pub workers: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            tile_px: DEFAULT_TILE_PX,
            policy: AcceptancePolicy::Strict,
            workers: default_workers(),
        }
    }
}

/// Number of CPUs, 1 when unknown.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// One accepted and written tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileRecord {
    pub slide_id: String,
    pub x: u32,
    pub y: u32,
    pub tile_px: u32,
    /// File name relative to the slide's tile directory
    pub file: String,
}

/// `{slide_id}_x{x}_y{y}.png`
pub fn tile_file_name(slide_id: &str, x: u32, y: u32) -> String {
    format!("{slide_id}_x{x}_y{y}.png")
}

/// Result of scanning one slide.
#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    /// Written tiles sorted by `(y, x)`
    pub records: Vec<TileRecord>,
    /// Tiles that passed the policy
    pub accepted: usize,
    /// Accepted tiles that could not be extracted
    pub failed: usize,
    /// Full tiles in the grid
    pub candidates: usize,
}

impl ScanOutcome {
    pub fn saved(&self) -> usize {
        self.records.len()
    }
}

/// Scan `slide` against `mask` and write accepted tiles into `dest`.
///
/// `dest` must exist. Rows come back in scan order regardless of how many
/// workers ran.
pub async fn scan_tiles<S>(
    slide: Arc<S>,
    mask: Arc<TissueMask>,
    slide_id: &str,
    dest: &Path,
    options: &ScanOptions,
) -> ScanOutcome
where
    S: RegionReader + ?Sized + 'static,
{
    let started = Instant::now();
    let slide_size = slide.dimensions();
    let grid = TileGrid::new(slide_size, options.tile_px);
    let scale = ScaleMap::new(mask.dimensions(), slide_size);
    let semaphore = Arc::new(Semaphore::new(options.workers.max(1)));

    let mut outcome = ScanOutcome {
        candidates: grid.len(),
        ..Default::default()
    };
    let mut tasks = JoinSet::new();

    for (x, y) in grid.origins() {
        let roi = scale.roi(x, y, options.tile_px);
        let coverage = mask.roi_coverage(roi.x0, roi.y0, roi.x1, roi.y1);
        if !options.policy.accepts(&coverage) {
            continue;
        }
        outcome.accepted += 1;

        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                warn!(slide = slide_id, x, y, error = %e, "tile skipped");
                outcome.failed += 1;
                continue;
            }
        };

        let record = TileRecord {
            slide_id: slide_id.to_string(),
            x,
            y,
            tile_px: options.tile_px,
            file: tile_file_name(slide_id, x, y),
        };
        let path = dest.join(&record.file);
        let slide = Arc::clone(&slide);

        tasks.spawn(async move {
            let _permit = permit;
            extract_tile(&*slide, x, y, record.tile_px, path)
                .await
                .map_err(|kind| TileExtractionError::new(x, y, kind))?;
            Ok::<_, TileExtractionError>(record)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(record)) => outcome.records.push(record),
            Ok(Err(e)) => {
                warn!(slide = slide_id, x = e.x, y = e.y, error = %e.kind, "tile skipped");
                outcome.failed += 1;
            }
            Err(e) => {
                warn!(slide = slide_id, error = %e, "tile task failed");
                outcome.failed += 1;
            }
        }
    }

    outcome.records.sort_by_key(|r| (r.y, r.x));

    debug!(
        slide = slide_id,
        policy = options.policy.name(),
        candidates = outcome.candidates,
        accepted = outcome.accepted,
        saved = outcome.saved(),
        failed = outcome.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "tile scan finished"
    );

    outcome
}

async fn extract_tile<S>(
    slide: &S,
    x: u32,
    y: u32,
    tile_px: u32,
    path: PathBuf,
) -> Result<(), TileFailure>
where
    S: RegionReader + ?Sized,
{
    let region = slide.read_region(x, y, tile_px, tile_px).await?;

    let png = tokio::task::spawn_blocking(move || encode_png(&composite_over_white(&region)))
        .await
        .map_err(|e| TileFailure::Task(e.to_string()))?
        .map_err(TileFailure::Encode)?;

    tokio::fs::write(&path, png)
        .await
        .map_err(|e| TileFailure::Write(EncodeError::io(&path, e)))
}
