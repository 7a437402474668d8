//! Slide format detection.
//!
//! Both supported formats are TIFF files. An Aperio SVS file is recognized
//! by the `Aperio` marker in the first IFD's ImageDescription; every other
//! TIFF is treated as a generic pyramidal TIFF.

use crate::error::FormatError;
use crate::io::RangeReader;

use super::tiff::{read_ifd, TiffHeader, TiffTag, BIGTIFF_HEADER_SIZE, TIFF_HEADER_SIZE};

/// Bytes of ImageDescription inspected for vendor markers.
const MAX_DESCRIPTION_BYTES: usize = 1024;

const APERIO_MARKER: &[u8] = b"Aperio";

/// Detected slide format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideFormat {
    /// Aperio SVS (TIFF with JPEGTables and an `Aperio` description)
    AperioSvs,
    /// Standard tiled TIFF with multiple resolutions
    GenericTiff,
}

impl SlideFormat {
    pub const fn name(&self) -> &'static str {
        match self {
            SlideFormat::AperioSvs => "Aperio SVS",
            SlideFormat::GenericTiff => "Generic Pyramidal TIFF",
        }
    }
}

/// Identify the format of a slide from its header and first IFD.
pub async fn detect_format<R: RangeReader>(reader: &R) -> Result<SlideFormat, FormatError> {
    if reader.size() < TIFF_HEADER_SIZE as u64 {
        return Err(FormatError::UnsupportedFormat {
            reason: "file too small to be a TIFF".to_string(),
        });
    }

    let head_len = BIGTIFF_HEADER_SIZE.min(reader.size() as usize);
    let head = reader.read_exact_at(0, head_len).await?;
    if !is_tiff_header(&head) {
        return Err(FormatError::UnsupportedFormat {
            reason: "missing TIFF magic bytes".to_string(),
        });
    }
    let header = TiffHeader::parse(&head, reader.size())?;

    let first = read_ifd(reader, &header, header.first_ifd_offset).await?;
    let Some(entry) = first.get_entry_by_tag(TiffTag::ImageDescription) else {
        return Ok(SlideFormat::GenericTiff);
    };

    let description = if entry.is_inline {
        entry.value_offset_bytes.clone()
    } else {
        let len = (entry.count as usize).min(MAX_DESCRIPTION_BYTES);
        let offset = entry.value_offset(header.byte_order);
        reader.read_exact_at(offset, len).await?.to_vec()
    };

    if contains_aperio_marker(&description) {
        Ok(SlideFormat::AperioSvs)
    } else {
        Ok(SlideFormat::GenericTiff)
    }
}

fn contains_aperio_marker(data: &[u8]) -> bool {
    data.windows(APERIO_MARKER.len()).any(|w| w == APERIO_MARKER)
}

/// Whether `bytes` start with a classic TIFF or BigTIFF signature.
pub fn is_tiff_header(bytes: &[u8]) -> bool {
    matches!(
        bytes,
        [b'I', b'I', 42, 0, ..] | [b'I', b'I', 43, 0, ..] | [b'M', b'M', 0, 42, ..] | [b'M', b'M', 0, 43, ..]
    )
}
