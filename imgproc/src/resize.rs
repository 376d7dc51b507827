use crate::{ImgprocError, Result};
use cv_core::{Raster, CHANNELS};
use rayon::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    /// Box-filter average over the source footprint; the right choice when
    /// shrinking.
    Area,
}

/// Output size for a proportional resize, never below 1×1.
pub fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = (width as f64 * scale).round().max(1.0) as u32;
    let h = (height as f64 * scale).round().max(1.0) as u32;
    (w, h)
}

/// Proportional resize by `scale ∈ (0, 1]`. `1.0` returns the input untouched.
pub fn scale_raster(src: Raster, scale: f64) -> Result<Raster> {
    if !(scale > 0.0 && scale <= 1.0) {
        return Err(ImgprocError::InvalidParameter(format!(
            "scale must be in (0, 1], got {}",
            scale
        )));
    }
    if scale == 1.0 || src.is_empty() {
        return Ok(src);
    }
    let (w, h) = scaled_dimensions(src.width(), src.height(), scale);
    Ok(resize(&src, w, h, Interpolation::Area))
}

pub fn resize(src: &Raster, width: u32, height: u32, interpolation: Interpolation) -> Raster {
    if width == 0 || height == 0 || src.is_empty() {
        return Raster::new(width, height);
    }
    if src.dimensions() == (width, height) {
        return src.clone();
    }

    match interpolation {
        Interpolation::Linear => resize_linear(src, width, height),
        Interpolation::Area => {
            if width <= src.width() && height <= src.height() {
                resize_area(src, width, height)
            } else {
                resize_linear(src, width, height)
            }
        }
    }
}

fn resize_linear(src: &Raster, width: u32, height: u32) -> Raster {
    let mut dst = Raster::new(width, height);
    let src_w = src.width() as usize;
    let src_h = src.height() as usize;
    let fx = src_w as f64 / width as f64;
    let fy = src_h as f64 / height as f64;
    let raw = src.as_raw();

    dst.as_raw_mut()
        .par_chunks_mut(width as usize * CHANNELS)
        .enumerate()
        .for_each(|(y, row)| {
            let sy = ((y as f64 + 0.5) * fy - 0.5).clamp(0.0, (src_h - 1) as f64);
            let y0 = sy.floor() as usize;
            let y1 = (y0 + 1).min(src_h - 1);
            let dy = sy - y0 as f64;

            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let sx = ((x as f64 + 0.5) * fx - 0.5).clamp(0.0, (src_w - 1) as f64);
                let x0 = sx.floor() as usize;
                let x1 = (x0 + 1).min(src_w - 1);
                let dx = sx - x0 as f64;

                for (c, out) in px.iter_mut().enumerate() {
                    let v00 = raw[(y0 * src_w + x0) * CHANNELS + c] as f64;
                    let v10 = raw[(y0 * src_w + x1) * CHANNELS + c] as f64;
                    let v01 = raw[(y1 * src_w + x0) * CHANNELS + c] as f64;
                    let v11 = raw[(y1 * src_w + x1) * CHANNELS + c] as f64;
                    let top = v00 * (1.0 - dx) + v10 * dx;
                    let bottom = v01 * (1.0 - dx) + v11 * dx;
                    *out = (top * (1.0 - dy) + bottom * dy).round().clamp(0.0, 255.0) as u8;
                }
            }
        });
    dst
}

/// Source pixels overlapping `[start, end)` with their fractional coverage.
fn footprint(start: f64, end: f64, len: usize) -> Vec<(usize, f64)> {
    let first = start.floor() as usize;
    let last = (end.ceil() as usize).min(len);
    (first..last)
        .filter_map(|i| {
            let lo = start.max(i as f64);
            let hi = end.min(i as f64 + 1.0);
            (hi > lo).then_some((i, hi - lo))
        })
        .collect()
}

fn resize_area(src: &Raster, width: u32, height: u32) -> Raster {
    let mut dst = Raster::new(width, height);
    let src_w = src.width() as usize;
    let fx = src.width() as f64 / width as f64;
    let fy = src.height() as f64 / height as f64;
    let raw = src.as_raw();

    let columns: Vec<Vec<(usize, f64)>> = (0..width as usize)
        .map(|x| footprint(x as f64 * fx, (x + 1) as f64 * fx, src_w))
        .collect();

    dst.as_raw_mut()
        .par_chunks_mut(width as usize * CHANNELS)
        .enumerate()
        .for_each(|(y, row)| {
            let rows = footprint(y as f64 * fy, (y + 1) as f64 * fy, src.height() as usize);
            for (px, cols) in row.chunks_exact_mut(CHANNELS).zip(&columns) {
                let mut acc = [0.0f64; CHANNELS];
                let mut total = 0.0;
                for &(sy, wy) in &rows {
                    for &(sx, wx) in cols {
                        let w = wy * wx;
                        let s = (sy * src_w + sx) * CHANNELS;
                        for c in 0..CHANNELS {
                            acc[c] += raw[s + c] as f64 * w;
                        }
                        total += w;
                    }
                }
                if total > 0.0 {
                    for c in 0..CHANNELS {
                        px[c] = (acc[c] / total).round().clamp(0.0, 255.0) as u8;
                    }
                }
            }
        });
    dst
}
