use cv_core::{KeyPoint, KeyPoints};
use image::GrayImage;
use rayon::prelude::*;

/// Bresenham circle of radius 3, clockwise from 12 o'clock.
const CIRCLE: [(i32, i32); 16] = [
    (0, -3),
    (1, -3),
    (2, -2),
    (3, -1),
    (3, 0),
    (3, 1),
    (2, 2),
    (1, 3),
    (0, 3),
    (-1, 3),
    (-2, 2),
    (-3, 1),
    (-3, 0),
    (-3, -1),
    (-2, -2),
    (-1, -3),
];

/// Contiguous arc length required for a corner (FAST-9).
const ARC: usize = 9;
const RADIUS: u32 = 3;

/// FAST-9 corners with 3×3 non-maximum suppression, strongest first.
pub fn fast_detect(image: &GrayImage, threshold: u8, max_keypoints: usize) -> KeyPoints {
    let (width, height) = image.dimensions();
    if width <= 2 * RADIUS || height <= 2 * RADIUS || max_keypoints == 0 {
        return KeyPoints::new();
    }

    let w = width as usize;
    let mut scores = vec![0u32; w * height as usize];
    scores
        .par_chunks_mut(w)
        .enumerate()
        .skip(RADIUS as usize)
        .take((height - 2 * RADIUS) as usize)
        .for_each(|(y, row)| {
            for x in RADIUS..width - RADIUS {
                row[x as usize] = fast_score(image, x, y as u32, threshold);
            }
        });

    let mut corners: Vec<(u32, u32, u32)> = Vec::new();
    for y in RADIUS..height - RADIUS {
        for x in RADIUS..width - RADIUS {
            let s = scores[y as usize * w + x as usize];
            if s > 0 && is_local_maximum(&scores, w, x as usize, y as usize) {
                corners.push((x, y, s));
            }
        }
    }

    // strongest first; raster order breaks ties
    corners.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));
    corners.truncate(max_keypoints);

    corners
        .into_iter()
        .map(|(x, y, s)| KeyPoint::new(x as f64, y as f64).with_response(s as f64))
        .collect()
}

/// Sum of absolute differences beyond `threshold` along the circle when the
/// pixel is a FAST-9 corner, 0 otherwise. The caller keeps `(x, y)` at
/// least 3 pixels from every border.
pub fn fast_score(image: &GrayImage, x: u32, y: u32, threshold: u8) -> u32 {
    let p = image.get_pixel(x, y)[0] as i32;
    let t = threshold as i32;

    let mut ring = [0i32; 16];
    for (v, &(dx, dy)) in ring.iter_mut().zip(CIRCLE.iter()) {
        *v = image.get_pixel((x as i32 + dx) as u32, (y as i32 + dy) as u32)[0] as i32;
    }

    let brighter = longest_arc(&ring, |v| v > p + t);
    let darker = longest_arc(&ring, |v| v < p - t);

    if brighter >= ARC {
        ring.iter().map(|&v| (v - p - t).max(0) as u32).sum()
    } else if darker >= ARC {
        ring.iter().map(|&v| (p - t - v).max(0) as u32).sum()
    } else {
        0
    }
}

/// Longest run of consecutive circle pixels satisfying `pred`, with wrap-around.
fn longest_arc(ring: &[i32; 16], pred: impl Fn(i32) -> bool) -> usize {
    let mut best = 0;
    let mut run = 0;
    for i in 0..32 {
        if pred(ring[i % 16]) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best.min(16)
}

/// Strictly greater than every neighbour, except that among equal scores the
/// first in raster order wins.
fn is_local_maximum(scores: &[u32], w: usize, x: usize, y: usize) -> bool {
    let s = scores[y * w + x];
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let n = scores[(y as i32 + dy) as usize * w + (x as i32 + dx) as usize];
            let earlier = dy < 0 || (dy == 0 && dx < 0);
            if n > s || (n == s && earlier) {
                return false;
            }
        }
    }
    true
}
