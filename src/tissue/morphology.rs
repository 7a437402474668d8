//! Binary morphology on `{0, 255}` masks.
//!
//! Erosion treats pixels outside the image as foreground and dilation treats
//! them as background, so borders neither grow nor shrink the mask.

use image::{GrayImage, Luma};

/// Structuring element as offsets from its anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kernel {
    offsets: Vec<(i32, i32)>,
}

impl Kernel {
    /// Elliptical element inscribed in a `size x size` square, anchored at
    /// its centre.
    ///
    /// Row `i` covers columns `c - dx ..= c + dx` where
    /// `dx = round(c * sqrt(1 - (i - r)^2 / r^2))`.
    pub fn ellipse(size: u32) -> Self {
        let size = size.max(1) as i32;
        let r = size / 2;
        let c = size / 2;
        let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };

        let mut offsets = Vec::new();
        for i in 0..size {
            let dy = i - r;
            if dy.abs() > r {
                continue;
            }
            let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as i32;
            let j0 = (c - dx).max(0);
            let j1 = (c + dx + 1).min(size);
            for j in j0..j1 {
                offsets.push((j - c, dy));
            }
        }

        Self { offsets }
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    pub fn contains(&self, dx: i32, dy: i32) -> bool {
        self.offsets.contains(&(dx, dy))
    }
}

/// A pixel stays 255 only if every in-bounds neighbour under the kernel is 255.
pub fn erode(mask: &GrayImage, kernel: &Kernel) -> GrayImage {
    apply(mask, kernel, true)
}

/// A pixel becomes 255 if any in-bounds neighbour under the kernel is 255.
pub fn dilate(mask: &GrayImage, kernel: &Kernel) -> GrayImage {
    apply(mask, kernel, false)
}

/// Erosion then dilation: removes specks smaller than the kernel.
pub fn open(mask: &GrayImage, kernel: &Kernel) -> GrayImage {
    dilate(&erode(mask, kernel), kernel)
}

/// Dilation then erosion: fills holes smaller than the kernel.
pub fn close(mask: &GrayImage, kernel: &Kernel) -> GrayImage {
    erode(&dilate(mask, kernel), kernel)
}

/// Opening followed by closing with an elliptical kernel of `size`.
/// A size of 0 returns the mask unchanged.
pub fn open_close(mask: &GrayImage, size: u32) -> GrayImage {
    if size == 0 {
        return mask.clone();
    }
    let kernel = Kernel::ellipse(size);
    close(&open(mask, &kernel), &kernel)
}

fn apply(mask: &GrayImage, kernel: &Kernel, erosion: bool) -> GrayImage {
    let (w, h) = (mask.width() as i32, mask.height() as i32);

    GrayImage::from_fn(mask.width(), mask.height(), |x, y| {
        let (x, y) = (x as i32, y as i32);
        let mut hits = kernel.offsets.iter().filter_map(|&(dx, dy)| {
            let (nx, ny) = (x + dx, y + dy);
            if nx < 0 || ny < 0 || nx >= w || ny >= h {
                None
            } else {
                Some(mask.get_pixel(nx as u32, ny as u32).0[0] == 255)
            }
        });

        let on = if erosion {
            hits.all(|v| v)
        } else {
            hits.any(|v| v)
        };
        Luma([if on { 255 } else { 0 }])
    })
}
