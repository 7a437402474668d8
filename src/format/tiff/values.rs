//! Reading tag values that may live inline or elsewhere in the file.

use bytes::Bytes;

use crate::error::TiffError;
use crate::io::RangeReader;

use super::parser::{ByteOrder, IfdEntry, TiffHeader};
use super::tags::FieldType;

/// Resolves IFD entry values against the file they came from.
///
/// Arrays such as TileOffsets are fetched with a single range read.
pub struct ValueReader<'a, R: RangeReader> {
    reader: &'a R,
    header: &'a TiffHeader,
}

impl<'a, R: RangeReader> ValueReader<'a, R> {
    pub fn new(reader: &'a R, header: &'a TiffHeader) -> Self {
        Self { reader, header }
    }

    /// Raw value bytes of an entry, from the entry itself or from the file.
    pub async fn read_bytes(&self, entry: &IfdEntry) -> Result<Bytes, TiffError> {
        let size = entry
            .value_byte_size()
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))? as usize;

        if entry.is_inline {
            return Ok(Bytes::copy_from_slice(&entry.value_offset_bytes[..size]));
        }

        let offset = entry.value_offset(self.header.byte_order);
        Ok(self.reader.read_exact_at(offset, size).await?)
    }

    /// An unsigned integer array (Short, Long or Long8 elements) widened to u64.
    pub async fn read_u64_array(&self, entry: &IfdEntry) -> Result<Vec<u64>, TiffError> {
        let field_type = entry
            .field_type
            .ok_or(TiffError::UnknownFieldType(entry.field_type_raw))?;
        let bytes = self.read_bytes(entry).await?;
        parse_u64_array(&bytes, field_type, self.header.byte_order)
    }

    /// An ASCII value with its trailing NUL (and any padding) removed.
    pub async fn read_string(&self, entry: &IfdEntry) -> Result<String, TiffError> {
        let bytes = self.read_bytes(entry).await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.trim_end_matches('\0').to_string())
    }
}

/// Decode packed unsigned integers of `field_type`.
pub fn parse_u64_array(
    bytes: &[u8],
    field_type: FieldType,
    byte_order: ByteOrder,
) -> Result<Vec<u64>, TiffError> {
    let width = field_type.size_in_bytes();
    let chunks = bytes.chunks_exact(width);
    Ok(match field_type {
        FieldType::Short => chunks.map(|b| byte_order.read_u16(b) as u64).collect(),
        FieldType::Long => chunks.map(|b| byte_order.read_u32(b) as u64).collect(),
        FieldType::Long8 => chunks.map(|b| byte_order.read_u64(b)).collect(),
        other => {
            return Err(TiffError::InvalidTagValue {
                tag: "array",
                message: format!("expected Short, Long or Long8 elements, got {:?}", other),
            })
        }
    })
}
