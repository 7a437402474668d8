//! TIFF header and IFD parsing.
//!
//! ```text
//! Classic TIFF header (8 bytes)      BigTIFF header (16 bytes)
//!   0..2  "II" or "MM"                 0..2   "II" or "MM"
//!   2..4  42                           2..4   43
//!   4..8  first IFD offset (u32)       4..6   offset size, always 8
//!                                      6..8   reserved
//!                                      8..16  first IFD offset (u64)
//! ```
//!
//! An IFD is an entry count, a run of fixed-size entries (12 bytes classic,
//! 20 bytes BigTIFF) and the offset of the next IFD. Each entry holds its
//! value inline when it fits in the value field, otherwise an offset to it.

use std::collections::HashMap;

use crate::error::TiffError;

use super::tags::{FieldType, TiffTag};

/// Size of classic TIFF header in bytes
pub const TIFF_HEADER_SIZE: usize = 8;

/// Size of BigTIFF header in bytes
pub const BIGTIFF_HEADER_SIZE: usize = 16;

// =============================================================================
// ByteOrder
// =============================================================================

/// Endianness declared by the first two bytes of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    /// "II"
    LittleEndian,
    /// "MM"
    BigEndian,
}

impl ByteOrder {
    /// Reads the first 2 bytes of `b`. Panics on shorter input.
    #[inline]
    pub fn read_u16(self, b: &[u8]) -> u16 {
        let raw = [b[0], b[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    /// Reads the first 4 bytes of `b`. Panics on shorter input.
    #[inline]
    pub fn read_u32(self, b: &[u8]) -> u32 {
        let raw = [b[0], b[1], b[2], b[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    /// Reads the first 8 bytes of `b`. Panics on shorter input.
    #[inline]
    pub fn read_u64(self, b: &[u8]) -> u64 {
        let raw = [b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]];
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(raw),
            ByteOrder::BigEndian => u64::from_be_bytes(raw),
        }
    }
}

// =============================================================================
// TiffHeader
// =============================================================================

/// Parsed file header: byte order, variant and where the IFD chain starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiffHeader {
    pub byte_order: ByteOrder,
    pub is_bigtiff: bool,
    pub first_ifd_offset: u64,
}

impl TiffHeader {
    /// Parse the header from the first bytes of a file of `file_size` bytes.
    ///
    /// Pass at least [`BIGTIFF_HEADER_SIZE`] bytes when available so BigTIFF
    /// headers can be read.
    pub fn parse(bytes: &[u8], file_size: u64) -> Result<Self, TiffError> {
        if bytes.len() < TIFF_HEADER_SIZE {
            return Err(TiffError::FileTooSmall {
                required: TIFF_HEADER_SIZE as u64,
                actual: bytes.len() as u64,
            });
        }

        let byte_order = match [bytes[0], bytes[1]] {
            [b'I', b'I'] => ByteOrder::LittleEndian,
            [b'M', b'M'] => ByteOrder::BigEndian,
            other => return Err(TiffError::InvalidMagic(u16::from_le_bytes(other))),
        };

        let (is_bigtiff, first_ifd_offset) = match byte_order.read_u16(&bytes[2..]) {
            42 => (false, byte_order.read_u32(&bytes[4..]) as u64),
            43 => {
                if bytes.len() < BIGTIFF_HEADER_SIZE {
                    return Err(TiffError::FileTooSmall {
                        required: BIGTIFF_HEADER_SIZE as u64,
                        actual: bytes.len() as u64,
                    });
                }
                let offset_size = byte_order.read_u16(&bytes[4..]);
                if offset_size != 8 {
                    return Err(TiffError::InvalidBigTiffOffsetSize(offset_size));
                }
                (true, byte_order.read_u64(&bytes[8..]))
            }
            version => return Err(TiffError::InvalidVersion(version)),
        };

        if first_ifd_offset >= file_size {
            return Err(TiffError::InvalidIfdOffset(first_ifd_offset));
        }

        Ok(TiffHeader {
            byte_order,
            is_bigtiff,
            first_ifd_offset,
        })
    }

    /// Bytes per IFD entry: 12 classic, 20 BigTIFF.
    #[inline]
    pub const fn ifd_entry_size(&self) -> usize {
        if self.is_bigtiff {
            20
        } else {
            12
        }
    }

    /// Bytes of the entry-count field that opens an IFD.
    #[inline]
    pub const fn ifd_count_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            2
        }
    }

    /// Bytes of an offset field (value field of an entry, next-IFD pointer).
    #[inline]
    pub const fn offset_size(&self) -> usize {
        if self.is_bigtiff {
            8
        } else {
            4
        }
    }

    /// Decode the entry count from the first bytes of an IFD.
    pub fn read_entry_count(&self, bytes: &[u8]) -> u64 {
        if self.is_bigtiff {
            self.byte_order.read_u64(bytes)
        } else {
            self.byte_order.read_u16(bytes) as u64
        }
    }
}

// =============================================================================
// IfdEntry
// =============================================================================

/// One tag of an IFD, with its value field still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfdEntry {
    pub tag_id: u16,
    /// `None` for field types the reader does not interpret
    pub field_type: Option<FieldType>,
    pub field_type_raw: u16,
    pub count: u64,
    /// The raw value field: 4 bytes classic, 8 bytes BigTIFF
    pub value_offset_bytes: Vec<u8>,
    /// Whether the value lives in `value_offset_bytes` rather than at an offset
    pub is_inline: bool,
}

impl IfdEntry {
    fn parse(bytes: &[u8], header: &TiffHeader) -> Self {
        let order = header.byte_order;
        let field_type_raw = order.read_u16(&bytes[2..]);
        let field_type = FieldType::from_u16(field_type_raw);

        let (count, value) = if header.is_bigtiff {
            (order.read_u64(&bytes[4..]), &bytes[12..20])
        } else {
            (order.read_u32(&bytes[4..]) as u64, &bytes[8..12])
        };

        let is_inline = field_type
            .map(|t| (t.size_in_bytes() as u64).saturating_mul(count) <= header.offset_size() as u64)
            .unwrap_or(false);

        IfdEntry {
            tag_id: order.read_u16(bytes),
            field_type,
            field_type_raw,
            count,
            value_offset_bytes: value.to_vec(),
            is_inline,
        }
    }

    /// Total size of the value in bytes, `None` for unknown field types.
    pub fn value_byte_size(&self) -> Option<u64> {
        self.field_type
            .map(|t| (t.size_in_bytes() as u64).saturating_mul(self.count))
    }

    /// The value field read as a file offset.
    pub fn value_offset(&self, byte_order: ByteOrder) -> u64 {
        if self.value_offset_bytes.len() >= 8 {
            byte_order.read_u64(&self.value_offset_bytes)
        } else {
            byte_order.read_u32(&self.value_offset_bytes) as u64
        }
    }

    /// Single inline Short or Long value.
    pub fn inline_u32(&self, byte_order: ByteOrder) -> Option<u32> {
        if !self.is_inline || self.count != 1 {
            return None;
        }
        match self.field_type? {
            FieldType::Short => Some(byte_order.read_u16(&self.value_offset_bytes) as u32),
            FieldType::Long => Some(byte_order.read_u32(&self.value_offset_bytes)),
            _ => None,
        }
    }

    /// Single inline Short, Long or Long8 value.
    pub fn inline_u64(&self, byte_order: ByteOrder) -> Option<u64> {
        match self.field_type? {
            FieldType::Long8 if self.is_inline && self.count == 1 => {
                Some(byte_order.read_u64(&self.value_offset_bytes))
            }
            _ => self.inline_u32(byte_order).map(u64::from),
        }
    }
}

// =============================================================================
// Ifd
// =============================================================================

/// A parsed Image File Directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ifd {
    pub entries: Vec<IfdEntry>,
    pub entries_by_tag: HashMap<u16, usize>,
    /// Zero when this is the last IFD of the chain
    pub next_ifd_offset: u64,
}

impl Ifd {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Bytes occupied by an IFD with `entry_count` entries.
    pub fn calculate_size(entry_count: u64, header: &TiffHeader) -> usize {
        (entry_count as usize)
            .saturating_mul(header.ifd_entry_size())
            .saturating_add(header.ifd_count_size() + header.offset_size())
    }

    /// Parse an IFD from bytes starting at its entry count.
    pub fn parse(bytes: &[u8], header: &TiffHeader) -> Result<Self, TiffError> {
        let count_size = header.ifd_count_size();
        if bytes.len() < count_size {
            return Err(TiffError::FileTooSmall {
                required: count_size as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_count = header.read_entry_count(bytes);
        let required = Self::calculate_size(entry_count, header);
        if bytes.len() < required {
            return Err(TiffError::FileTooSmall {
                required: required as u64,
                actual: bytes.len() as u64,
            });
        }

        let entry_size = header.ifd_entry_size();
        let mut entries = Vec::with_capacity(entry_count as usize);
        let mut entries_by_tag = HashMap::with_capacity(entry_count as usize);
        for (i, raw) in bytes[count_size..count_size + entry_count as usize * entry_size]
            .chunks_exact(entry_size)
            .enumerate()
        {
            let entry = IfdEntry::parse(raw, header);
            // first occurrence of a duplicated tag wins
            entries_by_tag.entry(entry.tag_id).or_insert(i);
            entries.push(entry);
        }

        let next_at = required - header.offset_size();
        let next_ifd_offset = if header.is_bigtiff {
            header.byte_order.read_u64(&bytes[next_at..])
        } else {
            header.byte_order.read_u32(&bytes[next_at..]) as u64
        };

        Ok(Ifd {
            entries,
            entries_by_tag,
            next_ifd_offset,
        })
    }

    pub fn get_entry_by_tag(&self, tag: TiffTag) -> Option<&IfdEntry> {
        self.entries_by_tag
            .get(&tag.id())
            .and_then(|&i| self.entries.get(i))
    }

    fn inline_value(&self, tag: TiffTag, byte_order: ByteOrder) -> Option<u32> {
        self.get_entry_by_tag(tag)?.inline_u32(byte_order)
    }

    pub fn image_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_value(TiffTag::ImageWidth, byte_order)
    }

    pub fn image_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_value(TiffTag::ImageLength, byte_order)
    }

    pub fn tile_width(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_value(TiffTag::TileWidth, byte_order)
    }

    pub fn tile_height(&self, byte_order: ByteOrder) -> Option<u32> {
        self.inline_value(TiffTag::TileLength, byte_order)
    }

    pub fn compression(&self, byte_order: ByteOrder) -> Option<u16> {
        self.inline_value(TiffTag::Compression, byte_order)
            .map(|v| v as u16)
    }

    /// Has both tile dimensions and tile offsets.
    pub fn is_tiled(&self) -> bool {
        self.get_entry_by_tag(TiffTag::TileWidth).is_some()
            && self.get_entry_by_tag(TiffTag::TileLength).is_some()
            && self.get_entry_by_tag(TiffTag::TileOffsets).is_some()
    }
}

// =============================================================================
// Tests
// =============================================================================
