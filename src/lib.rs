//! # wsi-tiler
//!
//! Turns directories of whole-slide images (WSI) into tile datasets for
//! model training.
//!
//! For each slide a low-resolution thumbnail is sampled and segmented into
//! tissue and glass. Full-resolution tiles lying on tissue are cut out and
//! written as PNG, together with a per-slide CSV table carrying the slide's
//! label and aggregate indices across slides.
//!
//! ## Features
//!
//! - **Native slide reading**: Aperio SVS and tiled pyramidal TIFF parsed
//!   directly, with JPEG tiles decoded on demand through block and tile caches
//! - **Tissue detection**: HSV saturation, Otsu threshold, morphological
//!   cleanup and small-region removal
//! - **Concurrent extraction**: accepted tiles are read and encoded by a
//!   bounded pool of tasks; output order is independent of concurrency
//! - **Resumable**: slides with a finished, labeled table can be skipped
//!
//! ## Architecture
//!
//! - [`io`] - Range readers and block caching
//! - [`mod@format`] - TIFF/SVS parsers and JPEG handling
//! - [`slide`] - Opened slides and the region reader seam
//! - [`tissue`] - Thumbnail sampling and tissue masks
//! - [`tiler`] - Tile grid, acceptance policy and extraction
//! - [`dataset`] - Labels, output layout, CSV tables and previews
//! - [`pipeline`] - Per-slide processing and batch runs
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use wsi_tiler::{run_batch, PipelineOptions};
//!
//! #[tokio::main]
//! async fn main() {
//!     let options = PipelineOptions {
//!         wsi_dir: "/data/wsi".into(),
//!         out_dir: "/data/out".into(),
//!         ..Default::default()
//!     };
//!
//!     let summary = run_batch(&options).await.expect("batch failed");
//!     println!("{} tiles", summary.total_tiles());
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod format;
pub mod io;
pub mod pipeline;
pub mod slide;
pub mod tiler;
pub mod tissue;

// Re-export commonly used types
pub use config::Config;
pub use dataset::{slide_key, LabelTable, OutputLayout};
pub use error::{
    BatchError, EncodeError, FormatError, IoError, LabelError, RegionError, SlideError,
    SlideOpenError, TiffError, TileExtractionError,
};
pub use io::{BlockCache, FileRangeReader, RangeReader};
pub use pipeline::{process_slide, run_batch, BatchSummary, PipelineOptions, SlideOutcome};
pub use slide::{LocalSlide, RasterSlide, RegionReader, Slide};
pub use tiler::{scan_tiles, AcceptancePolicy, ScanOptions, TileRecord};
pub use tissue::{build_tissue_mask, sample_thumbnail, MaskParams, TissueMask};
