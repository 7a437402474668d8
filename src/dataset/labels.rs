//! Slide-level labels from a CSV table.
//!
//! The table needs a header row. The slide name column and the label column
//! are found by name from ordered candidate lists; the first candidate
//! present wins. Slide names are normalized with [`slide_key`] so
//! `CRC_0001.svs` in the table matches the slide file `CRC_0001.SVS`.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::LabelError;

use super::keys::slide_key;

/// Candidate slide name columns, in priority order
pub const NAME_COLUMNS: &[&str] = &["filename", "slide_name", "slide", "wsi", "id"];

/// Candidate label columns, in priority order
pub const LABEL_COLUMNS: &[&str] = &["label", "slide_label", "Label", "class", "Class"];

/// Mapping from slide key to integer label.
///
/// A slide can be present with an empty label; [`LabelTable::get`] treats
/// that the same as an absent slide.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: HashMap<String, Option<i64>>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a table, logging and falling back to an empty table on any
    /// problem. `None` or a missing file yields an empty table.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::new();
        };
        match Self::try_load(path) {
            Ok(table) => {
                debug!(path = %path.display(), slides = table.len(), "loaded label table");
                table
            }
            Err(e) => {
                warn!(error = %e, "ignoring label table");
                Self::new()
            }
        }
    }

    /// Load a table from disk. A missing file is an empty table.
    pub fn try_load(path: &Path) -> Result<Self, LabelError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let file = std::fs::File::open(path).map_err(|e| LabelError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_reader(file, path)
    }

    /// Parse a table from any reader; `path` is only used in errors.
    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self, LabelError> {
        let path_buf = || -> PathBuf { path.to_path_buf() };
        let read_err = |e: csv::Error| LabelError::Read {
            path: path_buf(),
            message: e.to_string(),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers().map_err(read_err)?.clone();

        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|c| headers.iter().position(|h| h == *c))
        };
        let (Some(name_col), Some(label_col)) = (find(NAME_COLUMNS), find(LABEL_COLUMNS)) else {
            return Err(LabelError::MissingColumns {
                path: path_buf(),
                headers: headers.iter().collect::<Vec<_>>().join(","),
            });
        };

        let mut labels = HashMap::new();
        for (index, record) in rdr.records().enumerate() {
            let record = record.map_err(read_err)?;
            let name = record.get(name_col).unwrap_or("").trim();
            if name.is_empty() {
                continue;
            }
            let raw = record.get(label_col).unwrap_or("");
            let label = parse_label(raw).ok_or_else(|| LabelError::InvalidLabel {
                path: path_buf(),
                // header is line 1
                row: index + 2,
                value: raw.to_string(),
            })?;
            labels.entry(slide_key(name)).or_insert(label);
        }

        Ok(Self { labels })
    }

    /// Label of a slide, `None` when the slide is absent or its label empty.
    pub fn get(&self, slide_id: &str) -> Option<i64> {
        self.labels.get(slide_id).copied().flatten()
    }

    pub fn contains(&self, slide_id: &str) -> bool {
        self.labels.contains_key(slide_id)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<(String, i64)> for LabelTable {
    fn from_iter<I: IntoIterator<Item = (String, i64)>>(iter: I) -> Self {
        let mut labels = HashMap::new();
        for (key, label) in iter {
            labels.entry(key).or_insert(Some(label));
        }
        Self { labels }
    }
}

/// `Some(None)` for a missing value, `None` when the value is not an integer.
fn parse_label(raw: &str) -> Option<Option<i64>> {
    let value = raw.trim();
    if value.is_empty() || matches!(value, "NA" | "N/A" | "nan" | "NaN" | "<NA>") {
        return Some(None);
    }
    if let Ok(v) = value.parse::<i64>() {
        return Some(Some(v));
    }
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
            Some(Some(v as i64))
        }
        _ => None,
    }
}
