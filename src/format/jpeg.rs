//! Abbreviated JPEG stream handling.
//!
//! Aperio and many pyramidal TIFF writers store the quantization (DQT) and
//! Huffman (DHT) tables once, in the `JPEGTables` tag, and leave them out of
//! every tile. Such a tile only decodes after the tables are spliced in:
//!
//! ```text
//! tables: SOI DQT.. DHT.. EOI      tile: SOI SOF.. SOS.. EOI
//! merged: SOI DQT.. DHT.. SOF.. SOS.. EOI
//! ```

use bytes::{Bytes, BytesMut};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const DHT: u8 = 0xC4;
const DQT: u8 = 0xDB;
const SOS: u8 = 0xDA;

/// Whether a stream reaches its first scan without defining any tables.
pub fn is_abbreviated_stream(data: &[u8]) -> bool {
    if data.len() < 4 || data[..2] != SOI {
        return false;
    }

    let mut pos = 2;
    while pos + 1 < data.len() {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }
        match data[pos + 1] {
            DQT | DHT => return false,
            SOS => return true,
            // fill bytes, standalone markers
            0xFF => pos += 1,
            0x00 | 0x01 | 0xD0..=0xD9 => pos += 2,
            _ => {
                if pos + 3 >= data.len() {
                    return false;
                }
                let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
                pos += 2 + len;
            }
        }
    }

    false
}

/// Splice `tables` in front of the tile's own segments.
///
/// The EOI of the tables and the SOI of the tile are dropped.
pub fn merge_jpeg_tables(tables: &[u8], tile: &[u8]) -> Bytes {
    if tables.is_empty() {
        return Bytes::copy_from_slice(tile);
    }
    if tile.is_empty() {
        return Bytes::new();
    }

    let tables = tables.strip_suffix(&EOI[..]).unwrap_or(tables);
    let tile = tile.strip_prefix(&SOI[..]).unwrap_or(tile);

    let mut merged = BytesMut::with_capacity(tables.len() + tile.len());
    merged.extend_from_slice(tables);
    merged.extend_from_slice(tile);
    merged.freeze()
}

/// Make raw tile bytes decodable: merge tables only when the tile needs them.
pub fn prepare_tile_jpeg(tables: Option<&[u8]>, tile: &[u8]) -> Bytes {
    match tables {
        Some(tables) if is_abbreviated_stream(tile) => merge_jpeg_tables(tables, tile),
        _ => Bytes::copy_from_slice(tile),
    }
}
