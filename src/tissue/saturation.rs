use image::{GrayImage, Luma, RgbImage};

/// HSV saturation of every pixel as an 8-bit channel.
///
/// `S = 255 * (max - min) / max` in OpenCV's 8-bit fixed point, 0 for black
/// pixels. Stained tissue is strongly coloured while glass background is
/// near grey, so S separates the two regardless of brightness.
pub fn saturation_channel(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([saturation(r, g, b)])
    })
}

const SHIFT: u32 = 12;

/// `round((255 << 12) / v)`, 0 for `v = 0`
const SAT_DIV: [u32; 256] = sat_div_table();

const fn sat_div_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut v = 1;
    while v < 256 {
        table[v] = (2 * (255 << SHIFT) + v as u32) / (2 * v as u32);
        v += 1;
    }
    table
}

#[inline]
fn saturation(r: u8, g: u8, b: u8) -> u8 {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = (max - min) as u32;
    ((diff * SAT_DIV[max as usize] + (1 << (SHIFT - 1))) >> SHIFT) as u8
}
