//! On-disk layout of the dataset.
//!
//! ```text
//! {root}/data/
//! ├── images/
//! │   ├── thumbs/{slide_id}_thumb_{rgb,S,mask,overlay}.png
//! │   └── tiles/
//! │       ├── {slide_id}/{slide_id}_x{x}_y{y}.png
//! │       └── {slide_id}_QC.png
//! └── labels/
//!     ├── {slide_id}_tiles.csv
//!     ├── tiles_index.csv
//!     └── slides_index.csv
//! ```

use std::io;
use std::path::{Path, PathBuf};

/// Suffix of per-slide tile tables
pub const SLIDE_CSV_SUFFIX: &str = "_tiles.csv";

/// Thumbnail variants written per slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThumbKind {
    Rgb,
    Saturation,
    Mask,
    Overlay,
}

impl ThumbKind {
    pub const ALL: [ThumbKind; 4] = [
        ThumbKind::Rgb,
        ThumbKind::Saturation,
        ThumbKind::Mask,
        ThumbKind::Overlay,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            ThumbKind::Rgb => "thumb_rgb",
            ThumbKind::Saturation => "thumb_S",
            ThumbKind::Mask => "thumb_mask",
            ThumbKind::Overlay => "thumb_overlay",
        }
    }
}

/// Paths of every artifact under an output root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn images_dir(&self) -> PathBuf {
        self.root.join("data").join("images")
    }

    pub fn thumbs_dir(&self) -> PathBuf {
        self.images_dir().join("thumbs")
    }

    pub fn tiles_dir(&self) -> PathBuf {
        self.images_dir().join("tiles")
    }

    pub fn labels_dir(&self) -> PathBuf {
        self.root.join("data").join("labels")
    }

    pub fn slide_tiles_dir(&self, slide_id: &str) -> PathBuf {
        self.tiles_dir().join(slide_id)
    }

    pub fn thumb_path(&self, slide_id: &str, kind: ThumbKind) -> PathBuf {
        self.thumbs_dir()
            .join(format!("{}_{}.png", slide_id, kind.suffix()))
    }

    pub fn qc_path(&self, slide_id: &str) -> PathBuf {
        self.tiles_dir().join(format!("{slide_id}_QC.png"))
    }

    pub fn slide_csv(&self, slide_id: &str) -> PathBuf {
        self.labels_dir()
            .join(format!("{slide_id}{SLIDE_CSV_SUFFIX}"))
    }

    pub fn tiles_index(&self) -> PathBuf {
        self.labels_dir().join("tiles_index.csv")
    }

    pub fn slides_index(&self) -> PathBuf {
        self.labels_dir().join("slides_index.csv")
    }

    /// Create the directories one slide writes into.
    pub fn create_slide_dirs(&self, slide_id: &str) -> io::Result<()> {
        std::fs::create_dir_all(self.thumbs_dir())?;
        std::fs::create_dir_all(self.slide_tiles_dir(slide_id))?;
        std::fs::create_dir_all(self.labels_dir())
    }
}
