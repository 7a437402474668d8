//! Dataset outputs: slide keys, labels, file layout, tables and previews.

mod keys;
mod labels;
mod layout;
mod qc;
mod records;
mod thumbs;

pub use keys::{slide_key, SLIDE_EXTENSIONS};
pub use labels::{LabelTable, LABEL_COLUMNS, NAME_COLUMNS};
pub use layout::{OutputLayout, ThumbKind, SLIDE_CSV_SUFFIX};
pub use qc::{
    build_montage, save_qc_montage, tile_pngs, QcOptions, DEFAULT_QC_SIZE, DEFAULT_QC_TILES,
};
pub use records::{
    completed_rows, read_slide_csv, slide_csv_paths, write_indices, write_slide_csv,
    IndexSummary, LabeledRow, TILE_COLUMNS,
};
pub use thumbs::{save_thumbnails, tissue_overlay};
