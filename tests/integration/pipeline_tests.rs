//! End-to-end pipeline tests.
//!
//! Tests verify:
//! - Tiles on tissue are written once each, in row-major table order
//! - Per-slide tables carry the slide label; indices aggregate them
//! - Results do not depend on the worker count or on re-runs
//! - Unreadable tiles, slides and stale tables are skipped, not fatal
//! - Finished slides are skipped when resuming

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use image::{GrayImage, Luma};

use wsi_tiler::dataset::{read_slide_csv, OutputLayout, ThumbKind};
use wsi_tiler::io::MemoryRangeReader;
use wsi_tiler::pipeline::{run_batch, PipelineOptions};
use wsi_tiler::slide::Slide;
use wsi_tiler::tiler::{scan_tiles, AcceptancePolicy, ScanOptions};
use wsi_tiler::tissue::TissueMask;

use super::test_utils::{
    banded_slide, banded_svs, close_to, is_png, write_slide, TiffBuilder, TISSUE,
};

fn options(wsi_dir: &Path, out_dir: &Path, workers: usize) -> PipelineOptions {
    PipelineOptions {
        wsi_dir: wsi_dir.to_path_buf(),
        out_dir: out_dir.to_path_buf(),
        scan: ScanOptions {
            tile_px: 512,
            policy: AcceptancePolicy::Strict,
            workers,
        },
        ..Default::default()
    }
}

fn write_labels(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("labels.csv");
    std::fs::write(&path, body).unwrap();
    path
}

fn tile_names(layout: &OutputLayout, slide_id: &str) -> BTreeSet<String> {
    std::fs::read_dir(layout.slide_tiles_dir(slide_id))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

/// Tissue covers the left 1280 of 2048 columns: two of four tile columns.
fn expected_origins() -> Vec<(u32, u32)> {
    let mut origins = Vec::new();
    for y in [0, 512, 1024, 1536] {
        for x in [0, 512] {
            origins.push((x, y));
        }
    }
    origins
}

// =============================================================================
// Scanning a Real Slide
// =============================================================================

#[tokio::test]
async fn test_full_tissue_mask_covers_grid_once() {
    let out = tempfile::tempdir().unwrap();
    let slide = Slide::open(MemoryRangeReader::new(banded_svs(), "S1.svs"))
        .await
        .unwrap();
    let mask = TissueMask::from_binary(GrayImage::from_pixel(64, 64, Luma([255])));

    let outcome = scan_tiles(
        Arc::new(slide),
        Arc::new(mask),
        "S1",
        out.path(),
        &ScanOptions {
            tile_px: 512,
            policy: AcceptancePolicy::Strict,
            workers: 4,
        },
    )
    .await;

    assert_eq!(outcome.candidates, 16);
    assert_eq!(outcome.saved(), 16);
    let origins: BTreeSet<(u32, u32)> = outcome.records.iter().map(|r| (r.x, r.y)).collect();
    assert_eq!(origins.len(), 16, "every grid tile exactly once");
    assert!(origins.iter().all(|&(x, y)| x % 512 == 0 && y % 512 == 0 && x < 2048 && y < 2048));
}

// =============================================================================
// Single Slide
// =============================================================================

#[tokio::test]
async fn test_banded_slide_end_to_end() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());

    let mut opts = options(wsi.path(), out.path(), 4);
    opts.labels_csv = Some(write_labels(wsi.path(), "filename,label\nS1.svs,1\n"));

    let summary = run_batch(&opts).await.unwrap();
    assert!(summary.failures.is_empty(), "{:?}", summary.failures);
    assert_eq!(summary.slides.len(), 1);

    let outcome = &summary.slides[0];
    assert_eq!(outcome.slide_id, "S1");
    assert_eq!(outcome.tiles_saved, 8);
    assert_eq!(outcome.tiles_failed, 0);
    assert_eq!(outcome.label, Some(1));
    assert!(!outcome.skipped);

    let layout = OutputLayout::new(out.path());

    // table rows in (y, x) order, labeled
    let rows = read_slide_csv(&layout.slide_csv("S1")).unwrap();
    let origins: Vec<(u32, u32)> = rows.iter().map(|r| (r.x, r.y)).collect();
    assert_eq!(origins, expected_origins());
    for row in &rows {
        assert_eq!(row.slide_id, "S1");
        assert_eq!(row.tile_px, 512);
        assert_eq!(row.label, Some(1));
        assert_eq!(row.file, format!("S1_x{}_y{}.png", row.x, row.y));
    }

    // one PNG per row, nothing else
    let expected: BTreeSet<String> = rows.iter().map(|r| r.file.clone()).collect();
    assert_eq!(tile_names(&layout, "S1"), expected);

    let tile = image::open(layout.slide_tiles_dir("S1").join("S1_x512_y1024.png"))
        .unwrap()
        .to_rgb8();
    assert_eq!(tile.dimensions(), (512, 512));
    assert!(close_to(tile.get_pixel(100, 100).0, TISSUE.0, 10));

    for kind in ThumbKind::ALL {
        let path = layout.thumb_path("S1", kind);
        let bytes = std::fs::read(&path).unwrap();
        assert!(is_png(&bytes), "{} is not a PNG", path.display());
    }
    let thumb = image::open(layout.thumb_path("S1", ThumbKind::Mask)).unwrap();
    assert_eq!((thumb.width(), thumb.height()), (64, 64));

    let qc = image::open(layout.qc_path("S1")).unwrap();
    assert_eq!((qc.width(), qc.height()), (1024, 1024));

    let index = summary.index.unwrap();
    assert_eq!(index.tiles, 8);
    assert_eq!(index.slides, 1);
    assert_eq!(
        std::fs::read_to_string(layout.slides_index()).unwrap(),
        "slide_id,n_tiles\nS1,8\n"
    );
}

#[tokio::test]
async fn test_worker_count_does_not_change_output() {
    let wsi = tempfile::tempdir().unwrap();
    let single = tempfile::tempdir().unwrap();
    let parallel = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());

    run_batch(&options(wsi.path(), single.path(), 1)).await.unwrap();
    run_batch(&options(wsi.path(), parallel.path(), 8)).await.unwrap();

    let a = OutputLayout::new(single.path());
    let b = OutputLayout::new(parallel.path());
    assert_eq!(
        std::fs::read_to_string(a.slide_csv("S1")).unwrap(),
        std::fs::read_to_string(b.slide_csv("S1")).unwrap()
    );
    assert_eq!(tile_names(&a, "S1"), tile_names(&b, "S1"));

    let name = "S1_x0_y512.png";
    assert_eq!(
        std::fs::read(a.slide_tiles_dir("S1").join(name)).unwrap(),
        std::fs::read(b.slide_tiles_dir("S1").join(name)).unwrap(),
        "tile bytes depend only on the slide"
    );
}

#[tokio::test]
async fn test_rerun_overwrites_identically() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());
    let opts = options(wsi.path(), out.path(), 4);
    let layout = OutputLayout::new(out.path());

    run_batch(&opts).await.unwrap();
    let first = std::fs::read_to_string(layout.slide_csv("S1")).unwrap();
    let first_index = std::fs::read_to_string(layout.tiles_index()).unwrap();

    let summary = run_batch(&opts).await.unwrap();
    assert!(!summary.slides[0].skipped);
    assert_eq!(std::fs::read_to_string(layout.slide_csv("S1")).unwrap(), first);
    assert_eq!(
        std::fs::read_to_string(layout.tiles_index()).unwrap(),
        first_index
    );
}

#[tokio::test]
async fn test_corrupt_tile_is_skipped() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    // native tile (1, 1) lies inside the output tile at (0, 0)
    let data = TiffBuilder::svs(&banded_slide(2048, 2048, 1280), 256)
        .corrupt_tile(0, 1, 1)
        .build();
    write_slide(wsi.path(), "S1.svs", &data);

    let summary = run_batch(&options(wsi.path(), out.path(), 4)).await.unwrap();
    assert!(summary.failures.is_empty());
    assert_eq!(summary.slides[0].tiles_saved, 7);
    assert_eq!(summary.slides[0].tiles_failed, 1);

    let layout = OutputLayout::new(out.path());
    let rows = read_slide_csv(&layout.slide_csv("S1")).unwrap();
    assert_eq!(rows.len(), 7);
    assert!(!rows.iter().any(|r| (r.x, r.y) == (0, 0)));
    assert!(!layout.slide_tiles_dir("S1").join("S1_x0_y0.png").exists());
}

#[tokio::test]
async fn test_large_tiles_on_small_slide() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let data = TiffBuilder::new()
        .level(banded_slide(400, 300, 200), 128)
        .build();
    write_slide(wsi.path(), "tiny.svs", &data);

    let summary = run_batch(&options(wsi.path(), out.path(), 2)).await.unwrap();
    assert!(summary.failures.is_empty());
    assert_eq!(summary.slides[0].tiles_saved, 0);

    // an empty table is still written, so the slide is indexed with no rows
    let layout = OutputLayout::new(out.path());
    assert!(read_slide_csv(&layout.slide_csv("tiny")).unwrap().is_empty());
    assert!(!layout.qc_path("tiny").exists());
    assert_eq!(
        std::fs::read_to_string(layout.slides_index()).unwrap(),
        "slide_id,n_tiles\n"
    );
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_batch_with_labels_and_broken_slide() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());
    // tissue over the first 768 columns: one tile column
    write_slide(
        wsi.path(),
        "S2.svs",
        &TiffBuilder::svs(&banded_slide(2048, 2048, 768), 256).build(),
    );
    write_slide(wsi.path(), "S3.svs", b"truncated upload");
    write_slide(wsi.path(), "notes.txt", b"not a slide");

    let mut opts = options(wsi.path(), out.path(), 4);
    opts.labels_csv = Some(write_labels(
        wsi.path(),
        "slide,label\nS1,1\nS2.svs,0\nS9,1\n",
    ));

    let summary = run_batch(&opts).await.unwrap();
    let ids: Vec<&str> = summary.slides.iter().map(|s| s.slide_id.as_str()).collect();
    assert_eq!(ids, vec!["S1", "S2"]);
    assert_eq!(summary.failures.len(), 1);
    assert!(summary.failures[0].0.ends_with("S3.svs"));
    assert_eq!(summary.total_tiles(), 12);

    let layout = OutputLayout::new(out.path());
    let s2 = read_slide_csv(&layout.slide_csv("S2")).unwrap();
    assert_eq!(s2.len(), 4);
    assert!(s2.iter().all(|r| r.x == 0 && r.label == Some(0)));

    let index = std::fs::read_to_string(layout.tiles_index()).unwrap();
    let lines: Vec<&str> = index.lines().collect();
    assert_eq!(lines[0], "slide_id,x,y,tile_px,file,label");
    assert_eq!(lines.len(), 13);
    assert!(lines[1].starts_with("S1,"));
    assert!(lines[12].starts_with("S2,"));

    assert_eq!(
        std::fs::read_to_string(layout.slides_index()).unwrap(),
        "slide_id,n_tiles\nS1,8\nS2,4\n"
    );
}

#[tokio::test]
async fn test_stale_truncated_table_does_not_fail_batch() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());

    // left behind by an interrupted earlier run
    let layout = OutputLayout::new(out.path());
    std::fs::create_dir_all(layout.labels_dir()).unwrap();
    std::fs::write(
        layout.slide_csv("OLD"),
        "slide_id,x,y,tile_px,file,label\nOLD,0,0,51\n",
    )
    .unwrap();

    let summary = run_batch(&options(wsi.path(), out.path(), 4)).await.unwrap();
    assert_eq!(summary.total_tiles(), 8);
    assert_eq!(summary.index.unwrap().tiles, 8);

    assert_eq!(read_slide_csv(&layout.tiles_index()).unwrap().len(), 8);
    assert_eq!(
        std::fs::read_to_string(layout.slides_index()).unwrap(),
        "slide_id,n_tiles\nS1,8\n"
    );
}

#[tokio::test]
async fn test_unlabeled_slide_has_empty_label() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());

    let mut opts = options(wsi.path(), out.path(), 4);
    opts.labels_csv = Some(write_labels(wsi.path(), "filename,label\nOTHER.svs,1\n"));

    let summary = run_batch(&opts).await.unwrap();
    assert_eq!(summary.slides[0].label, None);

    let layout = OutputLayout::new(out.path());
    let rows = read_slide_csv(&layout.slide_csv("S1")).unwrap();
    assert!(rows.iter().all(|r| r.label.is_none()));

    let text = std::fs::read_to_string(layout.slide_csv("S1")).unwrap();
    assert!(text.lines().nth(1).unwrap().ends_with(".png,"));
}

// =============================================================================
// Resuming
// =============================================================================

#[tokio::test]
async fn test_skip_existing_leaves_finished_slide() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());

    let mut opts = options(wsi.path(), out.path(), 4);
    opts.labels_csv = Some(write_labels(wsi.path(), "filename,label\nS1.svs,2\n"));
    run_batch(&opts).await.unwrap();

    let layout = OutputLayout::new(out.path());
    let removed = layout.slide_tiles_dir("S1").join("S1_x0_y0.png");
    std::fs::remove_file(&removed).unwrap();

    opts.skip_existing = true;
    let summary = run_batch(&opts).await.unwrap();
    let outcome = &summary.slides[0];
    assert!(outcome.skipped);
    assert_eq!(outcome.tiles_saved, 8);
    assert!(!removed.exists(), "skipped slides are not re-tiled");
    assert_eq!(summary.index.unwrap().tiles, 8);
}

#[tokio::test]
async fn test_skip_existing_reprocesses_unlabeled_table() {
    let wsi = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_slide(wsi.path(), "S1.svs", &banded_svs());

    let mut opts = options(wsi.path(), out.path(), 4);
    run_batch(&opts).await.unwrap();

    // the first run had no labels, so its table is not finished
    opts.skip_existing = true;
    opts.labels_csv = Some(write_labels(wsi.path(), "filename,label\nS1.svs,1\n"));
    let summary = run_batch(&opts).await.unwrap();
    assert!(!summary.slides[0].skipped);

    let layout = OutputLayout::new(out.path());
    let rows = read_slide_csv(&layout.slide_csv("S1")).unwrap();
    assert!(rows.iter().all(|r| r.label == Some(1)));
}
