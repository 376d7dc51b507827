use crate::{ImgprocError, Result};
use cv_core::{Homography, Raster, CHANNELS};
use nalgebra::{Matrix3, Vector3};
use rayon::prelude::*;

/// Bilinear sample at a sub-pixel location. Locations outside the pixel
/// footprint `[-0.5, w - 0.5) × [-0.5, h - 0.5)` are transparent (`None`).
pub fn sample_bilinear(src: &Raster, x: f64, y: f64) -> Option<[u8; CHANNELS]> {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return None;
    }
    if !(x >= -0.5 && x < w as f64 - 0.5 && y >= -0.5 && y < h as f64 - 0.5) {
        return None;
    }

    let x = x.clamp(0.0, (w - 1) as f64);
    let y = y.clamp(0.0, (h - 1) as f64);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let raw = src.as_raw();
    let mut out = [0u8; CHANNELS];
    for (c, o) in out.iter_mut().enumerate() {
        let v00 = raw[(y0 * w + x0) * CHANNELS + c] as f64;
        let v10 = raw[(y0 * w + x1) * CHANNELS + c] as f64;
        let v01 = raw[(y1 * w + x0) * CHANNELS + c] as f64;
        let v11 = raw[(y1 * w + x1) * CHANNELS + c] as f64;
        let v0 = v00 * (1.0 - fx) + v10 * fx;
        let v1 = v01 * (1.0 - fx) + v11 * fx;
        *o = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
    }
    Some(out)
}

/// Warps `src` onto a `width × height` canvas. `transform` maps source
/// pixel coordinates to canvas coordinates; each canvas pixel is
/// inverse-mapped and sampled bilinearly. Canvas pixels whose pre-image
/// lies outside `src`, or behind the horizon of `transform`, stay zero.
pub fn warp_perspective(src: &Raster, transform: &Homography, width: u32, height: u32) -> Result<Raster> {
    // unnormalized, so the pre-image's w is 1 / w of the forward map
    let inverse = transform
        .matrix()
        .try_inverse()
        .ok_or_else(|| ImgprocError::DegenerateTransform("warp transform is not invertible".into()))?;
    Ok(warp_perspective_inverse(src, &inverse, width, height))
}

/// Same as [`warp_perspective`] with the canvas→source map given directly.
///
/// `canvas_to_src` must be the exact inverse of a forward map that sends the
/// visible side of the source to positive `w`; pre-images with `w <= 0` are
/// skipped.
pub fn warp_perspective_inverse(
    src: &Raster,
    canvas_to_src: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Raster {
    let mut dst = Raster::new(width, height);
    if width == 0 || height == 0 {
        return dst;
    }

    dst.as_raw_mut()
        .par_chunks_mut(width as usize * CHANNELS)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(CHANNELS).enumerate() {
                let p = canvas_to_src * Vector3::new(x as f64, y as f64, 1.0);
                if p[2] < 1e-12 {
                    continue;
                }
                if let Some(v) = sample_bilinear(src, p[0] / p[2], p[1] / p[2]) {
                    px.copy_from_slice(&v);
                }
            }
        });

    dst
}
