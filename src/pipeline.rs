//! Slide and batch orchestration.
//!
//! A slide goes through: thumbnail sampling, tissue mask, thumbnail
//! previews, concurrent tile scan, per-slide table, QC montage. A batch runs
//! every matching slide in path order, one at a time, then rebuilds the
//! aggregate indices. A failing slide is logged and the batch moves on.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::dataset::{
    completed_rows, save_qc_montage, save_thumbnails, slide_key, write_indices, write_slide_csv,
    IndexSummary, LabelTable, OutputLayout, QcOptions,
};
use crate::error::{BatchError, SlideError};
use crate::slide::{LocalSlide, SlideCacheOptions};
use crate::tiler::{scan_tiles, ScanOptions};
use crate::tissue::{
    build_mask_from_channel, sample_thumbnail, saturation_channel, MaskParams, DEFAULT_DOWNSAMPLE,
};

/// Default glob pattern for slide discovery
pub const DEFAULT_PATTERN: &str = "*.svs";

/// Everything a batch run needs.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub wsi_dir: PathBuf,
    /// Glob pattern matched inside `wsi_dir`
    pub pattern: String,
    pub out_dir: PathBuf,
    pub labels_csv: Option<PathBuf>,
    /// Thumbnail downsampling factor
    pub downsample: u32,
    pub mask: MaskParams,
    pub scan: ScanOptions,
    /// Leave slides with a finished, fully labeled table alone
    pub skip_existing: bool,
    /// `None` disables the QC montage
    pub qc: Option<QcOptions>,
    pub cache: SlideCacheOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            wsi_dir: PathBuf::from("."),
            pattern: DEFAULT_PATTERN.to_string(),
            out_dir: PathBuf::from("."),
            labels_csv: None,
            downsample: DEFAULT_DOWNSAMPLE,
            mask: MaskParams::default(),
            scan: ScanOptions::default(),
            skip_existing: false,
            qc: Some(QcOptions::default()),
            cache: SlideCacheOptions::default(),
        }
    }
}

/// What happened to one slide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideOutcome {
    pub slide_id: String,
    /// Tiles written, or rows of the existing table when skipped
    pub tiles_saved: usize,
    pub tiles_failed: usize,
    pub label: Option<i64>,
    /// The slide already had a finished table
    pub skipped: bool,
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub slides: Vec<SlideOutcome>,
    /// Slides that failed, with the error message
    pub failures: Vec<(PathBuf, String)>,
    /// `None` when no per-slide tables exist
    pub index: Option<IndexSummary>,
}

impl BatchSummary {
    pub fn total_tiles(&self) -> usize {
        self.slides.iter().map(|s| s.tiles_saved).sum()
    }
}

/// Label as printed in logs: the integer, or nothing.
pub fn label_text(label: Option<i64>) -> String {
    label.map(|l| l.to_string()).unwrap_or_default()
}

/// Process one slide file into thumbnails, tiles, a labeled table and a
/// QC montage under `layout`.
pub async fn process_slide(
    path: &Path,
    layout: &OutputLayout,
    labels: &LabelTable,
    options: &PipelineOptions,
) -> Result<SlideOutcome, SlideError> {
    let slide_id = slide_key(path);
    let label = labels.get(&slide_id);
    let csv_path = layout.slide_csv(&slide_id);

    if options.skip_existing {
        if let Some(rows) = completed_rows(&csv_path) {
            debug!(slide = %slide_id, rows, "finished table found, skipping");
            return Ok(SlideOutcome {
                slide_id,
                tiles_saved: rows,
                tiles_failed: 0,
                label,
                skipped: true,
            });
        }
    }

    let started = Instant::now();
    let slide = Arc::new(LocalSlide::open_path(path, &options.cache).await?);

    let thumb = sample_thumbnail(&*slide, options.downsample).await?;
    let (tw, th) = thumb.size;
    let saturation = saturation_channel(&thumb.rgb);
    let mask = Arc::new(build_mask_from_channel(&saturation, &options.mask, tw, th));
    debug!(
        slide = %slide_id,
        thumb_width = tw,
        thumb_height = th,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "tissue mask ready"
    );

    let tiles_dir = layout.slide_tiles_dir(&slide_id);
    layout
        .create_slide_dirs(&slide_id)
        .map_err(|e| SlideError::output(&tiles_dir, e))?;

    let thumbs_dir = layout.thumbs_dir();
    let thumbs = {
        let layout = layout.clone();
        let slide_id = slide_id.clone();
        let mask = Arc::clone(&mask);
        tokio::task::spawn_blocking(move || {
            save_thumbnails(&layout, &slide_id, &thumb.rgb, &saturation, &mask)
        })
    };
    thumbs
        .await
        .map_err(|e| SlideError::output(&thumbs_dir, e))??;

    let scan = scan_tiles(
        Arc::clone(&slide),
        mask,
        &slide_id,
        &tiles_dir,
        &options.scan,
    )
    .await;
    drop(slide);

    write_slide_csv(&csv_path, &scan.records, label)
        .map_err(|e| SlideError::output(&csv_path, e))?;

    if let Some(qc) = options.qc {
        if scan.saved() > 0 {
            write_qc(layout, &slide_id, qc).await;
        }
    }

    debug!(
        slide = %slide_id,
        saved = scan.saved(),
        failed = scan.failed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "slide finished"
    );

    Ok(SlideOutcome {
        slide_id,
        tiles_saved: scan.saved(),
        tiles_failed: scan.failed,
        label,
        skipped: false,
    })
}

/// QC montage problems never fail the slide.
async fn write_qc(layout: &OutputLayout, slide_id: &str, qc: QcOptions) {
    let tiles_dir = layout.slide_tiles_dir(slide_id);
    let out = layout.qc_path(slide_id);

    let task = tokio::task::spawn_blocking(move || save_qc_montage(&tiles_dir, &out, &qc));
    match task.await {
        Ok(Ok(filled)) => debug!(slide = slide_id, filled, "wrote QC montage"),
        Ok(Err(e)) => warn!(slide = slide_id, error = %e, "QC montage failed"),
        Err(e) => warn!(slide = slide_id, error = %e, "QC montage task failed"),
    }
}

/// Slide files matching `pattern` inside `dir`, sorted by path.
pub fn discover_slides(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, BatchError> {
    let full = format!("{}/{}", glob::Pattern::escape(&dir.to_string_lossy()), pattern);
    let entries = glob::glob(&full).map_err(|e| BatchError::Pattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Process every matching slide, then rebuild the aggregate indices.
pub async fn run_batch(options: &PipelineOptions) -> Result<BatchSummary, BatchError> {
    let files = discover_slides(&options.wsi_dir, &options.pattern)?;
    if files.is_empty() {
        info!(
            "No files found for {} in {}",
            options.pattern,
            options.wsi_dir.display()
        );
        return Ok(BatchSummary::default());
    }

    let labels = LabelTable::load(options.labels_csv.as_deref());
    let layout = OutputLayout::new(&options.out_dir);
    let mut summary = BatchSummary::default();

    info!(
        "Processing {} slide(s) from {}",
        files.len(),
        options.wsi_dir.display()
    );

    for path in files {
        match process_slide(&path, &layout, &labels, options).await {
            Ok(outcome) => {
                info!(
                    "{}: {} tiles | label={}{}",
                    outcome.slide_id,
                    outcome.tiles_saved,
                    label_text(outcome.label),
                    if outcome.skipped { " (existing)" } else { "" }
                );
                if outcome.tiles_failed > 0 {
                    warn!(
                        "{}: {} accepted tiles could not be written",
                        outcome.slide_id, outcome.tiles_failed
                    );
                }
                summary.slides.push(outcome);
            }
            Err(e) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                error!("{}: {}", name, e);
                summary.failures.push((path, e.to_string()));
            }
        }
    }

    summary.index = write_indices(&layout)?;
    if let Some(index) = summary.index {
        info!("{} tiles from {} slides", index.tiles, index.slides);
    }

    Ok(summary)
}
