//! PNG encoding of output rasters.
//!
//! Tiles, thumbnails and masks are all written losslessly with maximum
//! compression and adaptive filtering.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ExtendedColorType, GrayImage, ImageEncoder, RgbImage};

use crate::error::EncodeError;

/// Encode an RGB raster to PNG bytes.
pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>, EncodeError> {
    let mut output = Vec::new();
    encode_into(&mut output, image.as_raw(), image.dimensions(), ExtendedColorType::Rgb8)?;
    Ok(output)
}

/// Write an RGB raster to `path` as PNG.
pub fn write_png(path: &Path, image: &RgbImage) -> Result<(), EncodeError> {
    write_raw(path, image.as_raw(), image.dimensions(), ExtendedColorType::Rgb8)
}

/// Write a single-channel raster to `path` as 8-bit grayscale PNG.
pub fn write_gray_png(path: &Path, image: &GrayImage) -> Result<(), EncodeError> {
    write_raw(path, image.as_raw(), image.dimensions(), ExtendedColorType::L8)
}

fn write_raw(
    path: &Path,
    data: &[u8],
    dimensions: (u32, u32),
    color: ExtendedColorType,
) -> Result<(), EncodeError> {
    let file = File::create(path).map_err(|e| EncodeError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    encode_into(&mut writer, data, dimensions, color)?;
    writer.flush().map_err(|e| EncodeError::io(path, e))
}

fn encode_into<W: Write>(
    writer: W,
    data: &[u8],
    (width, height): (u32, u32),
    color: ExtendedColorType,
) -> Result<(), EncodeError> {
    let encoder = PngEncoder::new_with_quality(writer, CompressionType::Best, FilterType::Adaptive);
    encoder.write_image(data, width, height, color)?;
    Ok(())
}
