use image::{GrayImage, Luma};

/// Class weights below this count as empty
const EPSILON: f64 = f32::EPSILON as f64;

/// Global threshold that maximizes between-class variance of the histogram.
///
/// Pixels `> t` belong to the upper class. Maximizing between-class
/// variance is equivalent to minimizing the combined intra-class variance.
/// Ties keep the lowest threshold. A constant image yields 0.
pub fn otsu_threshold(channel: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for p in channel.pixels() {
        histogram[p.0[0] as usize] += 1;
    }

    let total = channel.as_raw().len() as f64;
    if total == 0.0 {
        return 0;
    }

    let mean: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &n)| i as f64 * n as f64)
        .sum::<f64>()
        / total;

    let mut best = 0u8;
    let mut best_sigma = 0.0f64;
    let mut weight_low = 0.0f64;
    let mut mean_low = 0.0f64;

    for (i, &count) in histogram.iter().enumerate() {
        let p = count as f64 / total;
        let prev_weight = weight_low;
        weight_low += p;
        let weight_high = 1.0 - weight_low;

        if weight_low < EPSILON || weight_high < EPSILON {
            continue;
        }

        mean_low = (mean_low * prev_weight + i as f64 * p) / weight_low;
        let mean_high = (mean - weight_low * mean_low) / weight_high;
        let sigma = weight_low * weight_high * (mean_low - mean_high).powi(2);

        if sigma > best_sigma {
            best_sigma = sigma;
            best = i as u8;
        }
    }

    best
}

/// `255` where the channel is above `threshold`, `0` elsewhere.
pub fn binarize(channel: &GrayImage, threshold: u8) -> GrayImage {
    GrayImage::from_fn(channel.width(), channel.height(), |x, y| {
        Luma([if channel.get_pixel(x, y).0[0] > threshold { 255 } else { 0 }])
    })
}
