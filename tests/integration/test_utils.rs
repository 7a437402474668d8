//! Test utilities for integration tests.
//!
//! Provides a request-counting range reader and a builder that lays out
//! small tiled JPEG TIFF/SVS files byte by byte, so the whole pipeline can
//! run against real slide files without fixtures on disk.

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use wsi_tiler::error::IoError;
use wsi_tiler::io::RangeReader;

// =============================================================================
// Mock Range Reader with Request Tracking
// =============================================================================

/// A mock range reader that tracks all read requests.
///
/// Clones share their counters, so a clone can be handed to a slide or a
/// cache while the test keeps watching.
pub struct TrackingMockReader {
    data: Bytes,
    identifier: String,
    request_count: Arc<AtomicUsize>,
    requests: Arc<RwLock<Vec<(u64, usize)>>>,
}

impl TrackingMockReader {
    pub fn new(data: Vec<u8>, identifier: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(data),
            identifier: identifier.into(),
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    pub async fn get_requests(&self) -> Vec<(u64, usize)> {
        self.requests.read().await.clone()
    }

    pub fn reset_tracking(&self) {
        self.request_count.store(0, Ordering::SeqCst);
    }
}

impl Clone for TrackingMockReader {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            identifier: self.identifier.clone(),
            request_count: Arc::clone(&self.request_count),
            requests: Arc::clone(&self.requests),
        }
    }
}

#[async_trait]
impl RangeReader for TrackingMockReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.write().await.push((offset, len));

        let start = offset as usize;
        let end = start + len;
        if end > self.data.len() {
            return Err(IoError::RangeOutOfBounds {
                offset,
                requested: len as u64,
                size: self.data.len() as u64,
            });
        }
        Ok(self.data.slice(start..end))
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

// =============================================================================
// Synthetic Slide Images
// =============================================================================

/// Stained tissue color used by the synthetic slides.
pub const TISSUE: Rgb<u8> = Rgb([200, 90, 150]);

/// Background glass color.
pub const GLASS: Rgb<u8> = Rgb([255, 255, 255]);

/// Glass with a band of tissue covering `x < tissue_width`.
pub fn banded_slide(width: u32, height: u32, tissue_width: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < tissue_width {
            TISSUE
        } else {
            GLASS
        }
    })
}

/// Four flat quadrants: red, green, blue and white.
pub fn quadrant_slide(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        match (x < width / 2, y < height / 2) {
            (true, true) => Rgb([220, 30, 30]),
            (false, true) => Rgb([30, 200, 30]),
            (true, false) => Rgb([30, 30, 220]),
            (false, false) => GLASS,
        }
    })
}

/// Nearest-neighbour downscale by an integer factor.
pub fn downscale(image: &RgbImage, factor: u32) -> RgbImage {
    let width = (image.width() / factor).max(1);
    let height = (image.height() / factor).max(1);
    RgbImage::from_fn(width, height, |x, y| *image.get_pixel(x * factor, y * factor))
}

/// Whether two colors are equal within `tolerance` per channel.
pub fn close_to(actual: [u8; 3], expected: [u8; 3], tolerance: u8) -> bool {
    actual
        .iter()
        .zip(expected.iter())
        .all(|(a, e)| a.abs_diff(*e) <= tolerance)
}

// =============================================================================
// JPEG Helpers
// =============================================================================

/// Encode an RGB image as a baseline JPEG.
pub fn encode_jpeg(image: &RgbImage, quality: u8) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode_image(image).expect("Failed to encode JPEG");
    buf
}

/// Split a complete JPEG into a tables-only stream and an abbreviated
/// stream, the way Aperio stores them.
pub fn split_jpeg_tables(jpeg: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut tables = vec![0xFF, 0xD8];
    let mut stream = vec![0xFF, 0xD8];

    let mut pos = 2;
    while pos + 4 <= jpeg.len() {
        assert_eq!(jpeg[pos], 0xFF, "unexpected byte in JPEG header");
        let marker = jpeg[pos + 1];
        if marker == 0xDA {
            stream.extend_from_slice(&jpeg[pos..]);
            break;
        }
        let len = u16::from_be_bytes([jpeg[pos + 2], jpeg[pos + 3]]) as usize;
        let segment = &jpeg[pos..pos + 2 + len];
        match marker {
            0xDB | 0xC4 => tables.extend_from_slice(segment),
            _ => stream.extend_from_slice(segment),
        }
        pos += 2 + len;
    }

    tables.extend_from_slice(&[0xFF, 0xD9]);
    (tables, stream)
}

pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4 && data[0] == 0xFF && data[1] == 0xD8
}

pub fn is_png(data: &[u8]) -> bool {
    data.starts_with(&[0x89, b'P', b'N', b'G'])
}

// =============================================================================
// Tiled TIFF Builder
// =============================================================================

/// Byte order for generated TIFF files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrderType {
    LittleEndian,
    BigEndian,
}

/// Aperio-style ImageDescription.
pub const APERIO_DESCRIPTION: &str =
    "Aperio Image Library v12.0.5\r\n2048x2048 (256x256) JPEG/RGB Q=90|AppMag = 20|MPP = 0.4990";

const JPEG_COMPRESSION: u16 = 7;
const YCBCR: u16 = 6;

struct LevelSpec {
    image: RgbImage,
    tile_size: u32,
    /// `None` leaves the Compression tag out
    compression: Option<u16>,
}

/// Builds a classic TIFF with one tiled IFD per level.
///
/// Every tile is a JPEG of the level image, padded with glass at the right
/// and bottom edges. Tile data is written before the IFD that points at it.
pub struct TiffBuilder {
    byte_order: ByteOrderType,
    description: Option<String>,
    levels: Vec<LevelSpec>,
    shared_tables: bool,
    corrupt: Vec<(usize, u32, u32)>,
    quality: u8,
}

impl TiffBuilder {
    pub fn new() -> Self {
        Self {
            byte_order: ByteOrderType::LittleEndian,
            description: None,
            levels: Vec::new(),
            shared_tables: false,
            corrupt: Vec::new(),
            quality: 95,
        }
    }

    /// A two-level Aperio SVS with shared JPEG tables.
    pub fn svs(base: &RgbImage, tile_size: u32) -> Self {
        Self::new()
            .description(APERIO_DESCRIPTION)
            .shared_tables()
            .level(base.clone(), tile_size)
            .level(downscale(base, 4), tile_size)
    }

    pub fn byte_order(mut self, byte_order: ByteOrderType) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// ImageDescription of the first IFD.
    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    pub fn level(mut self, image: RgbImage, tile_size: u32) -> Self {
        self.levels.push(LevelSpec {
            image,
            tile_size,
            compression: Some(JPEG_COMPRESSION),
        });
        self
    }

    /// Declare a different Compression tag value on the last level.
    pub fn compression(mut self, compression: u16) -> Self {
        if let Some(level) = self.levels.last_mut() {
            level.compression = Some(compression);
        }
        self
    }

    /// Leave the Compression tag out of the last level's IFD.
    pub fn without_compression_tag(mut self) -> Self {
        if let Some(level) = self.levels.last_mut() {
            level.compression = None;
        }
        self
    }

    /// Store DQT/DHT once per level in JPEGTables and abbreviate the tiles.
    pub fn shared_tables(mut self) -> Self {
        self.shared_tables = true;
        self
    }

    /// Replace the bytes of one tile with garbage.
    pub fn corrupt_tile(mut self, level: usize, tile_x: u32, tile_y: u32) -> Self {
        self.corrupt.push((level, tile_x, tile_y));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = TiffWriter::new(self.byte_order);
        out.header();
        let mut next_ifd_slot = 4;

        for (index, spec) in self.levels.iter().enumerate() {
            let (tiles, tables) = self.encode_level(index, spec);

            let mut offsets = Vec::with_capacity(tiles.len());
            let mut counts = Vec::with_capacity(tiles.len());
            for tile in &tiles {
                offsets.push(out.len() as u32);
                counts.push(tile.len() as u32);
                out.bytes(tile);
                out.align();
            }

            let description = match (&self.description, index) {
                (Some(text), 0) => {
                    let mut ascii = text.as_bytes().to_vec();
                    ascii.push(0);
                    Some(out.blob(&ascii))
                }
                _ => None,
            };
            let tables = tables.map(|t| out.blob(&t));
            let offsets_value = out.long_array(&offsets);
            let counts_value = out.long_array(&counts);

            let mut entries = vec![
                Entry::long(256, spec.image.width()),
                Entry::long(257, spec.image.height()),
                Entry::short(258, 8),
            ];
            if let Some(compression) = spec.compression {
                entries.push(Entry::short(259, compression));
            }
            entries.push(Entry::short(262, YCBCR));
            if let Some((offset, len)) = description {
                entries.push(Entry::external(270, 2, len, offset));
            }
            entries.push(Entry::short(277, 3));
            entries.push(Entry::short(322, spec.tile_size as u16));
            entries.push(Entry::short(323, spec.tile_size as u16));
            entries.push(offsets_value.entry(324));
            entries.push(counts_value.entry(325));
            if let Some((offset, len)) = tables {
                entries.push(Entry::external(347, 7, len, offset));
            }

            let ifd_offset = out.len() as u32;
            out.patch_u32(next_ifd_slot, ifd_offset);
            next_ifd_slot = out.ifd(&entries);
        }

        out.finish()
    }

    fn encode_level(&self, index: usize, spec: &LevelSpec) -> (Vec<Vec<u8>>, Option<Vec<u8>>) {
        let size = spec.tile_size;
        let tiles_x = spec.image.width().div_ceil(size);
        let tiles_y = spec.image.height().div_ceil(size);

        let mut tiles = Vec::new();
        let mut tables = None;
        for ty in 0..tiles_y {
            for tx in 0..tiles_x {
                if self.corrupt.contains(&(index, tx, ty)) {
                    tiles.push(b"this is not a jpeg tile".to_vec());
                    continue;
                }

                let tile = RgbImage::from_fn(size, size, |x, y| {
                    let (sx, sy) = (tx * size + x, ty * size + y);
                    if sx < spec.image.width() && sy < spec.image.height() {
                        *spec.image.get_pixel(sx, sy)
                    } else {
                        GLASS
                    }
                });
                let jpeg = encode_jpeg(&tile, self.quality);

                if self.shared_tables {
                    let (level_tables, stream) = split_jpeg_tables(&jpeg);
                    tables.get_or_insert(level_tables);
                    tiles.push(stream);
                } else {
                    tiles.push(jpeg);
                }
            }
        }

        (tiles, tables)
    }
}

impl Default for TiffBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One IFD entry; `value` holds the raw 4-byte field.
struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    value: EntryValue,
}

enum EntryValue {
    Short(u16),
    Long(u32),
}

impl Entry {
    fn short(tag: u16, value: u16) -> Self {
        Self {
            tag,
            field_type: 3,
            count: 1,
            value: EntryValue::Short(value),
        }
    }

    fn long(tag: u16, value: u32) -> Self {
        Self {
            tag,
            field_type: 4,
            count: 1,
            value: EntryValue::Long(value),
        }
    }

    fn external(tag: u16, field_type: u16, count: u32, offset: u32) -> Self {
        Self {
            tag,
            field_type,
            count,
            value: EntryValue::Long(offset),
        }
    }
}

/// A LONG array: inline when it holds a single value.
enum LongArray {
    Inline(u32),
    External { offset: u32, count: u32 },
}

impl LongArray {
    fn entry(&self, tag: u16) -> Entry {
        match *self {
            LongArray::Inline(value) => Entry::long(tag, value),
            LongArray::External { offset, count } => Entry::external(tag, 4, count, offset),
        }
    }
}

struct TiffWriter {
    buf: Vec<u8>,
    big_endian: bool,
}

impl TiffWriter {
    fn new(byte_order: ByteOrderType) -> Self {
        Self {
            buf: Vec::new(),
            big_endian: byte_order == ByteOrderType::BigEndian,
        }
    }

    fn len(&self) -> usize {
        self.buf.len()
    }

    fn header(&mut self) {
        if self.big_endian {
            self.buf.extend_from_slice(b"MM");
        } else {
            self.buf.extend_from_slice(b"II");
        }
        self.u16(42);
        self.u32(0);
    }

    fn u16(&mut self, value: u16) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    fn u32(&mut self, value: u32) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.buf.extend_from_slice(&bytes);
    }

    fn patch_u32(&mut self, at: usize, value: u32) {
        let bytes = if self.big_endian {
            value.to_be_bytes()
        } else {
            value.to_le_bytes()
        };
        self.buf[at..at + 4].copy_from_slice(&bytes);
    }

    fn bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Word-align the next write.
    fn align(&mut self) {
        if self.buf.len() % 2 == 1 {
            self.buf.push(0);
        }
    }

    /// Append `data` and return `(offset, len)`.
    fn blob(&mut self, data: &[u8]) -> (u32, u32) {
        let offset = self.buf.len() as u32;
        self.bytes(data);
        self.align();
        (offset, data.len() as u32)
    }

    fn long_array(&mut self, values: &[u32]) -> LongArray {
        if let [single] = values {
            return LongArray::Inline(*single);
        }
        let offset = self.buf.len() as u32;
        for &value in values {
            self.u32(value);
        }
        LongArray::External {
            offset,
            count: values.len() as u32,
        }
    }

    /// Write an IFD and return the position of its next-IFD slot.
    fn ifd(&mut self, entries: &[Entry]) -> usize {
        self.u16(entries.len() as u16);
        for entry in entries {
            self.u16(entry.tag);
            self.u16(entry.field_type);
            self.u32(entry.count);
            match entry.value {
                EntryValue::Short(v) => {
                    self.u16(v);
                    self.u16(0);
                }
                EntryValue::Long(v) => self.u32(v),
            }
        }
        let slot = self.buf.len();
        self.u32(0);
        slot
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

// =============================================================================
// Filesystem Helpers
// =============================================================================

/// Write `data` as `dir/name` and return the path.
pub fn write_slide(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to write slide file");
    path
}

/// The standard test slide: 2048x2048, tissue over the left 1280 columns,
/// 256px native tiles.
pub fn banded_svs() -> Vec<u8> {
    TiffBuilder::svs(&banded_slide(2048, 2048, 1280), 256).build()
}

pub fn is_tiff_magic(data: &[u8]) -> bool {
    data.len() >= 4
        && ((data[0] == b'I' && data[1] == b'I' && data[2] == 42 && data[3] == 0)
            || (data[0] == b'M' && data[1] == b'M' && data[2] == 0 && data[3] == 42))
}
