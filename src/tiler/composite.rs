use image::{DynamicImage, Rgb, RgbImage, RgbaImage};

/// Blend an RGBA raster over an opaque white canvas and drop alpha.
///
/// Opaque pixels keep their colour, fully transparent pixels become white.
pub fn composite_over_white(rgba: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        Rgb(pixel_over_white(rgba.get_pixel(x, y).0))
    })
}

#[inline]
pub(crate) fn pixel_over_white([r, g, b, a]: [u8; 4]) -> [u8; 3] {
    [blend(r, a), blend(g, a), blend(b, a)]
}

/// Any decoded image as RGB, compositing over white when it carries alpha.
pub fn alpha_to_white(image: DynamicImage) -> RgbImage {
    if image.color().has_alpha() {
        composite_over_white(&image.to_rgba8())
    } else {
        image.to_rgb8()
    }
}

#[inline]
fn blend(c: u8, a: u8) -> u8 {
    let (c, a) = (c as u32, a as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}
