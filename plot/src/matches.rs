//! Side-by-side match plots.

use crate::style::Color;
use crate::{PlotError, Result};
use cv_core::{Correspondence, KeyPoints, Raster};

/// Draws `left` and `right` next to each other and connects every matched
/// keypoint pair with a line.
///
/// With an inlier mask, inliers are green and outliers red; without one each
/// match gets its own palette color.
pub fn draw_matches(
    left: &Raster,
    left_kps: &KeyPoints,
    right: &Raster,
    right_kps: &KeyPoints,
    matches: &[Correspondence],
    inliers: Option<&[bool]>,
) -> Result<Raster> {
    if let Some(mask) = inliers {
        if mask.len() != matches.len() {
            return Err(PlotError::InvalidData(format!(
                "inlier mask has {} entries for {} matches",
                mask.len(),
                matches.len()
            )));
        }
    }

    let (w1, h1) = left.dimensions();
    let (w2, h2) = right.dimensions();
    let mut output = Raster::new(w1 + w2, h1.max(h2));
    output.copy_from_clipped(left, 0, 0);
    output.copy_from_clipped(right, w1 as i64, 0);

    for (i, m) in matches.iter().enumerate() {
        let (Some(kp1), Some(kp2)) = (left_kps.get(m.query_idx), right_kps.get(m.train_idx)) else {
            return Err(PlotError::InvalidData(format!(
                "match {} refers to keypoints {}/{} that do not exist",
                i, m.query_idx, m.train_idx
            )));
        };

        let color = match inliers {
            Some(mask) if mask[i] => Color::green(),
            Some(_) => Color::red(),
            None => Color::palette(i),
        };

        let p1 = (kp1.x.round() as i64, kp1.y.round() as i64);
        let p2 = (kp2.x.round() as i64 + w1 as i64, kp2.y.round() as i64);

        draw_line_segment(&mut output, p1, p2, color);
        draw_circle(&mut output, p1, 3, color);
        draw_circle(&mut output, p2, 3, color);
    }

    Ok(output)
}

fn put_clipped(img: &mut Raster, x: i64, y: i64, color: Color) {
    if x >= 0 && y >= 0 && x < img.width() as i64 && y < img.height() as i64 {
        img.put_pixel(x as u32, y as u32, color.to_array());
    }
}

// Bresenham
fn draw_line_segment(img: &mut Raster, p1: (i64, i64), p2: (i64, i64), color: Color) {
    let (mut x0, mut y0) = p1;
    let (x1, y1) = p2;

    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_clipped(img, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

/// Circle outline, one pixel thick.
fn draw_circle(img: &mut Raster, center: (i64, i64), radius: i64, color: Color) {
    let (cx, cy) = center;
    let outer = radius * radius + radius;
    let inner = (radius - 1) * (radius - 1) + (radius - 1);
    for y in -radius..=radius {
        for x in -radius..=radius {
            let d = x * x + y * y;
            if d <= outer && d > inner {
                put_clipped(img, cx + x, cy + y, color);
            }
        }
    }
}
