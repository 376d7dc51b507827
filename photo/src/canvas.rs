//! Canvas composition.
//!
//! Sizes a canvas that holds both the warped source and the destination
//! image, bounded by a hard dimension limit, and places both on it as
//! separate layers.

use crate::{Error, Result};
use cv_core::{Homography, Raster, CHANNELS};
use cv_imgproc::warp_perspective;
use tracing::{debug, warn};

const SNAP_EPSILON: f64 = 1e-6;

/// Two co-registered layers on one canvas.
#[derive(Debug, Clone)]
pub struct Composition {
    /// Source raster warped through [`Composition::effective`].
    pub warped: Raster,
    /// Destination raster copied at [`Composition::offset`].
    pub placed: Raster,
    /// Integer translation `(tx, ty)` applied to the destination frame.
    pub offset: (i64, i64),
    /// `T · H`: source pixels to canvas pixels.
    pub effective: Homography,
    /// Size the canvas would have had without the limit; `None` when part
    /// of the source maps to or beyond the line at infinity.
    pub requested: Option<(u64, u64)>,
    pub clamped: bool,
    next_size: (u32, u32),
    max_dimension: u32,
}

impl Composition {
    pub fn dimensions(&self) -> (u32, u32) {
        self.warped.dimensions()
    }

    /// Translation from the destination frame to the canvas frame.
    pub fn canvas_from_next(&self) -> Homography {
        Homography::translation(self.offset.0 as f64, self.offset.1 as f64)
    }

    /// The overflow that forced clamping, if any.
    pub fn overflow(&self) -> Option<Error> {
        if !self.clamped {
            return None;
        }
        let (width, height) = self.requested.unwrap_or((u64::MAX, u64::MAX));
        Some(Error::CanvasOverflow {
            width,
            height,
            max: self.max_dimension,
        })
    }

    /// Destination copied over the warped source, without blending.
    pub fn into_canvas(self) -> Raster {
        let (w, h) = self.warped.dimensions();
        let x0 = self.offset.0.clamp(0, w as i64) as usize;
        let y0 = self.offset.1.clamp(0, h as i64) as usize;
        let x1 = self.offset.0.saturating_add(self.next_size.0 as i64).clamp(0, w as i64) as usize;
        let y1 = self.offset.1.saturating_add(self.next_size.1 as i64).clamp(0, h as i64) as usize;

        let mut canvas = self.warped;
        if x0 < x1 {
            let stride = w as usize * CHANNELS;
            let src = self.placed.as_raw();
            let dst = canvas.as_raw_mut();
            for y in y0..y1 {
                let span = y * stride + x0 * CHANNELS..y * stride + x1 * CHANNELS;
                dst[span.clone()].copy_from_slice(&src[span]);
            }
        }
        canvas
    }
}

/// Composer bound to one canvas limit.
#[derive(Debug, Clone, Copy)]
pub struct CanvasComposer {
    max_canvas_dimension: u32,
}

impl CanvasComposer {
    pub fn new(max_canvas_dimension: u32) -> Self {
        Self {
            max_canvas_dimension,
        }
    }

    pub fn max_canvas_dimension(&self) -> u32 {
        self.max_canvas_dimension
    }

    pub fn compose(&self, source: &Raster, next: &Raster, h: &Homography) -> Result<Composition> {
        compose(source, next, h, self.max_canvas_dimension)
    }
}

/// Warps `source` through `h` into the frame of `next` and places both on a
/// canvas covering the union of their footprints.
pub fn compose(source: &Raster, next: &Raster, h: &Homography, max_canvas_dimension: u32) -> Result<Composition> {
    if next.is_empty() {
        return Err(Error::DimensionMismatch("destination raster is empty".into()));
    }
    if max_canvas_dimension == 0 {
        return Err(Error::InvalidParameter("max_canvas_dimension must be positive".into()));
    }

    let (sw, sh) = (source.width() as f64, source.height() as f64);
    let (nw, nh) = (next.width() as f64, next.height() as f64);

    let mut xs = vec![0.0, nw];
    let mut ys = vec![0.0, nh];
    let mut unbounded = false;
    if !source.is_empty() {
        for (x, y) in [(0.0, 0.0), (sw, 0.0), (sw, sh), (0.0, sh)] {
            // a corner across the horizon projects to a finite but mirrored point
            match h.project(x, y).filter(|_| h.is_in_front(x, y)) {
                Some((u, v)) => {
                    xs.push(snap(u));
                    ys.push(snap(v));
                }
                None => unbounded = true,
            }
        }
    }

    let xmin = xs.iter().copied().fold(f64::INFINITY, f64::min).floor();
    let xmax = xs.iter().copied().fold(f64::NEG_INFINITY, f64::max).ceil();
    let ymin = ys.iter().copied().fold(f64::INFINITY, f64::min).floor();
    let ymax = ys.iter().copied().fold(f64::NEG_INFINITY, f64::max).ceil();

    let full_w = xmax - xmin;
    let full_h = ymax - ymin;
    let limit = max_canvas_dimension as f64;
    let clamped = unbounded || full_w > limit || full_h > limit;
    let width = full_w.min(limit).max(1.0) as u32;
    let height = full_h.min(limit).max(1.0) as u32;

    let requested = (!unbounded).then(|| (saturating_u64(full_w), saturating_u64(full_h)));

    let tx = -xmin;
    let ty = -ymin;
    let effective = Homography::translation(tx, ty).compose(h)?;

    let warped = warp_perspective(source, &effective, width, height)?;
    let mut placed = Raster::new(width, height);
    let offset = (saturating_i64(tx), saturating_i64(ty));
    placed.copy_from_clipped(next, offset.0, offset.1);

    let composition = Composition {
        warped,
        placed,
        offset,
        effective,
        requested,
        clamped,
        next_size: next.dimensions(),
        max_dimension: max_canvas_dimension,
    };

    if let Some(overflow) = composition.overflow() {
        warn!(
            width,
            height,
            "{}; canvas clamped, content beyond the limit is dropped",
            overflow
        );
    } else {
        debug!(width, height, tx, ty, "composed canvas");
    }

    Ok(composition)
}

/// Rounds values within numerical noise of an integer, so a fitted
/// homography that is a pure translation up to rounding does not grow the
/// canvas by a pixel.
fn snap(v: f64) -> f64 {
    let r = v.round();
    if (v - r).abs() < SNAP_EPSILON {
        r
    } else {
        v
    }
}

fn saturating_u64(v: f64) -> u64 {
    if v.is_finite() {
        v.max(0.0) as u64
    } else {
        u64::MAX
    }
}

fn saturating_i64(v: f64) -> i64 {
    // float to int casts saturate
    v as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32, c: [u8; 3]) -> Raster {
        let mut r = Raster::new(w, h);
        for y in 0..h {
            for x in 0..w {
                r.put_pixel(x, y, c);
            }
        }
        r
    }

    #[test]
    fn identity_keeps_dimensions_and_zero_offset() {
        let a = solid(64, 48, [10, 20, 30]);
        let c = compose(&a, &a, &Homography::identity(), 4000).unwrap();
        assert_eq!(c.dimensions(), (64, 48));
        assert_eq!(c.offset, (0, 0));
        assert!(!c.clamped);
        assert_eq!(c.warped, a);
        assert_eq!(c.placed, a);
    }

    #[test]
    fn translation_grows_canvas_and_offsets_next() {
        let a = solid(100, 100, [200, 0, 0]);
        let b = solid(100, 100, [0, 0, 200]);
        // a sits 80 px left of b
        let c = compose(&a, &b, &Homography::translation(-80.0, 0.0), 4000).unwrap();
        assert_eq!(c.dimensions(), (180, 100));
        assert_eq!(c.offset, (80, 0));
        assert_eq!(c.warped.pixel(0, 50), [200, 0, 0]);
        assert_eq!(c.warped.pixel(120, 50), [0, 0, 0]);
        assert_eq!(c.placed.pixel(79, 50), [0, 0, 0]);
        assert_eq!(c.placed.pixel(179, 99), [0, 0, 200]);

        let canvas = c.into_canvas();
        assert_eq!(canvas.pixel(10, 10), [200, 0, 0]);
        assert_eq!(canvas.pixel(90, 10), [0, 0, 200]);
    }

    #[test]
    fn extreme_scale_is_clamped() {
        let a = solid(50, 50, [1, 1, 1]);
        let h = Homography::scaling(1000.0, 1000.0).unwrap();
        let c = compose(&a, &a, &h, 500).unwrap();
        let (w, hgt) = c.dimensions();
        assert!(w <= 500 && hgt <= 500);
        assert!(c.clamped);
        assert!(matches!(
            c.overflow(),
            Some(Error::CanvasOverflow { width: 50000, height: 50000, max: 500 })
        ));
    }

    #[test]
    fn corners_at_infinity_are_clamped() {
        let a = solid(20, 20, [5, 5, 5]);
        // maps x = 20 onto the line at infinity
        let h = Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-0.05, 0.0, 1.0]]).unwrap();
        let c = compose(&a, &a, &h, 300).unwrap();
        assert!(c.clamped);
        let (w, hgt) = c.dimensions();
        assert!(w <= 300 && hgt <= 300);
    }

    #[test]
    fn horizon_through_source_is_clamped() {
        // columns x >= 20 are behind the horizon of h
        let mut a = solid(40, 20, [5, 5, 5]);
        for y in 0..20 {
            for x in 20..40 {
                a.put_pixel(x, y, [200, 0, 0]);
            }
        }
        let b = solid(20, 20, [7, 7, 7]);
        let h = Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-0.05, 0.0, 1.0]]).unwrap();
        let c = compose(&a, &b, &h, 300).unwrap();

        assert!(c.clamped);
        assert!(c.requested.is_none());
        assert!(matches!(c.overflow(), Some(Error::CanvasOverflow { max: 300, .. })));
        let (w, hgt) = c.dimensions();
        assert!(w <= 300 && hgt <= 300);
        for y in 0..hgt {
            for x in 0..w {
                assert_ne!(c.warped.pixel(x, y), [200, 0, 0], "behind-horizon pixel at ({}, {})", x, y);
            }
        }
        assert_eq!(c.warped.pixel(0, 0), [5, 5, 5]);
    }

    #[test]
    fn negative_offsets_shift_next() {
        let a = solid(10, 10, [9, 9, 9]);
        let b = solid(10, 10, [7, 7, 7]);
        let c = compose(&a, &b, &Homography::translation(5.0, -4.0), 100).unwrap();
        assert_eq!(c.dimensions(), (15, 14));
        assert_eq!(c.offset, (0, 4));
        assert_eq!(c.placed.pixel(0, 4), [7, 7, 7]);
        assert_eq!(c.warped.pixel(5, 0), [9, 9, 9]);
    }

    #[test]
    fn fitting_noise_does_not_grow_canvas() {
        let a = solid(100, 100, [3, 3, 3]);
        let h = Homography::from_rows([[1.0, 0.0, -80.000_000_01], [0.0, 1.0, 1e-9], [0.0, 0.0, 1.0]]).unwrap();
        let c = compose(&a, &a, &h, 4000).unwrap();
        assert_eq!(c.dimensions(), (180, 100));
        assert_eq!(c.offset, (80, 0));
    }

    #[test]
    fn empty_destination_is_rejected() {
        let a = solid(4, 4, [1, 1, 1]);
        assert!(compose(&a, &Raster::new(0, 0), &Homography::identity(), 10).is_err());
    }
}
