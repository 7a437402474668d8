//! TIFF field types, tag ids and compression codes used by slide files.

/// How an IFD entry's values are encoded.
///
/// Only the types that appear in the tags read by the slide reader are
/// listed. Entries with other types are kept but their values are never
/// interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Byte,
    Ascii,
    Short,
    Long,
    Undefined,
    /// BigTIFF only
    Long8,
}

impl FieldType {
    pub fn from_u16(value: u16) -> Option<Self> {
        Some(match value {
            1 => FieldType::Byte,
            2 => FieldType::Ascii,
            3 => FieldType::Short,
            4 => FieldType::Long,
            7 => FieldType::Undefined,
            16 => FieldType::Long8,
            _ => return None,
        })
    }

    /// Size of one element in bytes.
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            FieldType::Byte | FieldType::Ascii | FieldType::Undefined => 1,
            FieldType::Short => 2,
            FieldType::Long => 4,
            FieldType::Long8 => 8,
        }
    }
}

/// Tags read while opening a slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TiffTag {
    NewSubfileType,
    ImageWidth,
    ImageLength,
    BitsPerSample,
    Compression,
    PhotometricInterpretation,
    ImageDescription,
    SamplesPerPixel,
    TileWidth,
    TileLength,
    TileOffsets,
    TileByteCounts,
    JpegTables,
}

impl TiffTag {
    /// Numeric tag id as stored in IFD entries.
    pub const fn id(self) -> u16 {
        match self {
            TiffTag::NewSubfileType => 254,
            TiffTag::ImageWidth => 256,
            TiffTag::ImageLength => 257,
            TiffTag::BitsPerSample => 258,
            TiffTag::Compression => 259,
            TiffTag::PhotometricInterpretation => 262,
            TiffTag::ImageDescription => 270,
            TiffTag::SamplesPerPixel => 277,
            TiffTag::TileWidth => 322,
            TiffTag::TileLength => 323,
            TiffTag::TileOffsets => 324,
            TiffTag::TileByteCounts => 325,
            TiffTag::JpegTables => 347,
        }
    }

    /// Tag name used in error messages.
    pub const fn name(self) -> &'static str {
        match self {
            TiffTag::NewSubfileType => "NewSubfileType",
            TiffTag::ImageWidth => "ImageWidth",
            TiffTag::ImageLength => "ImageLength",
            TiffTag::BitsPerSample => "BitsPerSample",
            TiffTag::Compression => "Compression",
            TiffTag::PhotometricInterpretation => "PhotometricInterpretation",
            TiffTag::ImageDescription => "ImageDescription",
            TiffTag::SamplesPerPixel => "SamplesPerPixel",
            TiffTag::TileWidth => "TileWidth",
            TiffTag::TileLength => "TileLength",
            TiffTag::TileOffsets => "TileOffsets",
            TiffTag::TileByteCounts => "TileByteCounts",
            TiffTag::JpegTables => "JPEGTables",
        }
    }
}

/// Compression scheme of a pyramid level.
///
/// Tiles are decoded only for [`Compression::Jpeg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Lzw,
    OldJpeg,
    Jpeg,
    Deflate,
    Jpeg2000,
    Other(u16),
}

impl Compression {
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => Compression::None,
            5 => Compression::Lzw,
            6 => Compression::OldJpeg,
            7 => Compression::Jpeg,
            8 | 32946 => Compression::Deflate,
            33003 | 33005 => Compression::Jpeg2000,
            other => Compression::Other(other),
        }
    }

    pub fn name(self) -> String {
        match self {
            Compression::None => "none".to_string(),
            Compression::Lzw => "LZW".to_string(),
            Compression::OldJpeg => "old-style JPEG".to_string(),
            Compression::Jpeg => "JPEG".to_string(),
            Compression::Deflate => "Deflate".to_string(),
            Compression::Jpeg2000 => "JPEG 2000".to_string(),
            Compression::Other(code) => format!("code {}", code),
        }
    }
}
