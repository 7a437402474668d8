//! Per-slide tile tables and the aggregate indices built from them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::BatchError;
use crate::tiler::TileRecord;

use super::layout::{OutputLayout, SLIDE_CSV_SUFFIX};

/// Header of per-slide tables and of `tiles_index.csv`
pub const TILE_COLUMNS: [&str; 6] = ["slide_id", "x", "y", "tile_px", "file", "label"];

/// One row of a per-slide table: a tile record plus the slide label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledRow {
    pub slide_id: String,
    pub x: u32,
    pub y: u32,
    pub tile_px: u32,
    pub file: String,
    /// Empty in the CSV when the slide has no label
    #[serde(default)]
    pub label: Option<i64>,
}

impl LabeledRow {
    pub fn new(record: &TileRecord, label: Option<i64>) -> Self {
        Self {
            slide_id: record.slide_id.clone(),
            x: record.x,
            y: record.y,
            tile_px: record.tile_px,
            file: record.file.clone(),
            label,
        }
    }
}

#[derive(Debug, Serialize)]
struct SlideCount<'a> {
    slide_id: &'a str,
    n_tiles: usize,
}

/// Write a per-slide table. The header is written even when there are no rows.
pub fn write_slide_csv(
    path: &Path,
    records: &[TileRecord],
    label: Option<i64>,
) -> Result<(), csv::Error> {
    let rows: Vec<_> = records.iter().map(|r| LabeledRow::new(r, label)).collect();
    write_rows(path, &rows)
}

fn write_rows(path: &Path, rows: &[LabeledRow]) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    wtr.write_record(TILE_COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_slide_csv(path: &Path) -> Result<Vec<LabeledRow>, csv::Error> {
    csv::Reader::from_path(path)?.deserialize().collect()
}

/// Row count of a finished per-slide table.
///
/// A table is finished when it has at least one row, a `label` column, and
/// a label on every row. Anything else, including a missing or unreadable
/// file, returns `None` and the slide is processed again.
pub fn completed_rows(path: &Path) -> Option<usize> {
    let mut rdr = csv::Reader::from_path(path).ok()?;
    let label_col = rdr.headers().ok()?.iter().position(|h| h == "label")?;

    let mut rows = 0;
    for record in rdr.records() {
        let record = record.ok()?;
        match record.get(label_col) {
            Some(label) if !label.trim().is_empty() => {}
            _ => return None,
        }
        rows += 1;
    }

    (rows > 0).then_some(rows)
}

/// Totals of the aggregate indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSummary {
    pub tiles: usize,
    pub slides: usize,
}

/// Per-slide tables under the labels directory, sorted by path.
pub fn slide_csv_paths(layout: &OutputLayout) -> Result<Vec<PathBuf>, BatchError> {
    let dir = layout.labels_dir();
    let pattern = format!(
        "{}/*{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        SLIDE_CSV_SUFFIX
    );
    let entries = glob::glob(&pattern).map_err(|e| BatchError::Pattern {
        pattern: pattern.clone(),
        message: e.to_string(),
    })?;

    let mut paths: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
    paths.sort();
    Ok(paths)
}

/// Rebuild `tiles_index.csv` and `slides_index.csv` from every per-slide
/// table on disk.
///
/// Returns `None` and writes nothing when there are no per-slide tables.
/// A table that cannot be read is logged and left out of both indices;
/// only failing to write an index is an error.
pub fn write_indices(layout: &OutputLayout) -> Result<Option<IndexSummary>, BatchError> {
    let paths = slide_csv_paths(layout)?;
    if paths.is_empty() {
        return Ok(None);
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for path in &paths {
        match read_slide_csv(path) {
            Ok(mut slide_rows) => rows.append(&mut slide_rows),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable tile table");
                skipped += 1;
            }
        }
    }

    let tiles_index = layout.tiles_index();
    write_rows(&tiles_index, &rows).map_err(|e| index_error(&tiles_index, e))?;

    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for row in &rows {
        *counts.entry(row.slide_id.as_str()).or_default() += 1;
    }

    let slides_index = layout.slides_index();
    write_counts(&slides_index, &counts).map_err(|e| index_error(&slides_index, e))?;

    debug!(
        tables = paths.len(),
        skipped,
        tiles = rows.len(),
        slides = counts.len(),
        "wrote dataset indices"
    );

    Ok(Some(IndexSummary {
        tiles: rows.len(),
        slides: counts.len(),
    }))
}

fn write_counts(path: &Path, counts: &BTreeMap<&str, usize>) -> Result<(), csv::Error> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    wtr.write_record(["slide_id", "n_tiles"])?;
    for (slide_id, n_tiles) in counts {
        wtr.serialize(SlideCount {
            slide_id: *slide_id,
            n_tiles: *n_tiles,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

fn index_error(path: &Path, err: csv::Error) -> BatchError {
    BatchError::Index {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
