use std::collections::VecDeque;

use image::{GrayImage, Luma};

const NEIGHBOURS: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Minimum component area kept for a fraction of the image area.
pub fn min_region_area(width: u32, height: u32, min_frac: f64) -> u64 {
    (min_frac * width as f64 * height as f64).floor().max(0.0) as u64
}

/// Zero every 8-connected foreground region with fewer than `min_area` pixels.
///
/// Returns the number of regions removed.
pub fn remove_small_regions(mask: &mut GrayImage, min_area: u64) -> usize {
    if min_area <= 1 {
        return 0;
    }

    let (w, h) = mask.dimensions();
    let mut visited = vec![false; w as usize * h as usize];
    let mut queue = VecDeque::new();
    let mut region = Vec::new();
    let mut removed = 0;

    for sy in 0..h {
        for sx in 0..w {
            let start = sy as usize * w as usize + sx as usize;
            if visited[start] || mask.get_pixel(sx, sy).0[0] != 255 {
                continue;
            }

            visited[start] = true;
            queue.push_back((sx, sy));
            region.clear();

            while let Some((x, y)) = queue.pop_front() {
                region.push((x, y));
                for (dx, dy) in NEIGHBOURS {
                    let (nx, ny) = (x as i32 + dx, y as i32 + dy);
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let (nx, ny) = (nx as u32, ny as u32);
                    let idx = ny as usize * w as usize + nx as usize;
                    if !visited[idx] && mask.get_pixel(nx, ny).0[0] == 255 {
                        visited[idx] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }

            if (region.len() as u64) < min_area {
                for &(x, y) in &region {
                    mask.put_pixel(x, y, Luma([0]));
                }
                removed += 1;
            }
        }
    }

    removed
}
