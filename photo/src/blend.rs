//! Blending of two co-registered layers.
//!
//! A pixel "has content" when any of its channels is non-zero; black is
//! treated as transparent, matching what the warp leaves outside the source.

use crate::{Error, Result};
use cv_core::{Raster, CHANNELS};
use cv_imgproc::gaussian_blur_plane;
use rayon::prelude::*;

pub trait Blender: Send + Sync {
    fn name(&self) -> &'static str;

    /// Merges `a` (underneath) and `b` (on top) into one raster of the same size.
    fn blend(&self, a: &Raster, b: &Raster) -> Result<Raster>;
}

fn check_dimensions(a: &Raster, b: &Raster) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(Error::DimensionMismatch(format!(
            "cannot blend {}x{} with {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    Ok(())
}

fn has_content(px: &[u8]) -> bool {
    px.iter().any(|&v| v != 0)
}

fn to_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Equal weights where both layers have content, otherwise whichever does.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverlapAverage;

impl Blender for OverlapAverage {
    fn name(&self) -> &'static str {
        "overlap-average"
    }

    fn blend(&self, a: &Raster, b: &Raster) -> Result<Raster> {
        check_dimensions(a, b)?;
        let mut out = Raster::new(a.width(), a.height());

        out.as_raw_mut()
            .par_chunks_mut(CHANNELS)
            .zip(a.as_raw().par_chunks(CHANNELS))
            .zip(b.as_raw().par_chunks(CHANNELS))
            .for_each(|((o, pa), pb)| match (has_content(pa), has_content(pb)) {
                (true, true) => {
                    for c in 0..CHANNELS {
                        o[c] = to_u8(0.5 * pa[c] as f32 + 0.5 * pb[c] as f32);
                    }
                }
                (true, false) => o.copy_from_slice(pa),
                (false, true) => o.copy_from_slice(pb),
                (false, false) => {}
            });

        Ok(out)
    }
}

/// Linear weight ramp across the overlap, `out = a·(1 − m) + b·m`.
///
/// The ramp runs from the side where `a`'s content lies to the side where
/// `b`'s lies, so it follows the seam whatever its orientation. Outside the
/// overlap the mask is 0 or 1 depending on which layer has content.
#[derive(Debug, Clone, Copy)]
pub struct FeatherBlend {
    sigma: f32,
}

impl FeatherBlend {
    pub fn new(sigma: f32) -> Self {
        Self { sigma }
    }

    pub fn sigma(&self) -> f32 {
        self.sigma
    }

    /// Weight of `b` per pixel.
    pub fn mask(&self, a: &Raster, b: &Raster) -> Result<Vec<f32>> {
        check_dimensions(a, b)?;
        let (w, h) = (a.width() as usize, a.height() as usize);
        let ca = a.content_mask();
        let cb = b.content_mask();

        let Some(ramp) = Ramp::across_overlap(&ca, &cb, w) else {
            // no overlap: each pixel belongs to whoever has content
            return Ok(cb.iter().map(|&inb| if inb { 1.0 } else { 0.0 }).collect());
        };

        let mut mask: Vec<f32> = (0..w * h)
            .into_par_iter()
            .map(|i| ramp.at((i % w) as f64, (i / w) as f64))
            .collect();
        if self.sigma > 0.0 {
            mask = gaussian_blur_plane(&mask, w, h, self.sigma);
        }

        mask.par_iter_mut().enumerate().for_each(|(i, m)| {
            *m = match (ca[i], cb[i]) {
                (true, true) => m.clamp(0.0, 1.0),
                (false, true) => 1.0,
                _ => 0.0,
            };
        });
        Ok(mask)
    }
}

impl Blender for FeatherBlend {
    fn name(&self) -> &'static str {
        "feathered-linear"
    }

    fn blend(&self, a: &Raster, b: &Raster) -> Result<Raster> {
        let mask = self.mask(a, b)?;
        let mut out = Raster::new(a.width(), a.height());

        out.as_raw_mut()
            .par_chunks_mut(CHANNELS)
            .zip(a.as_raw().par_chunks(CHANNELS))
            .zip(b.as_raw().par_chunks(CHANNELS))
            .zip(mask.par_iter())
            .for_each(|(((o, pa), pb), &m)| {
                for c in 0..CHANNELS {
                    o[c] = to_u8(pa[c] as f32 * (1.0 - m) + pb[c] as f32 * m);
                }
            });

        Ok(out)
    }
}

/// Projection of pixel positions onto the direction from `a`'s content
/// centroid to `b`'s, normalized to [0, 1] over the overlap.
struct Ramp {
    dir: (f64, f64),
    lo: f64,
    hi: f64,
}

impl Ramp {
    fn across_overlap(ca: &[bool], cb: &[bool], w: usize) -> Option<Self> {
        let centroid = |mask: &[bool]| {
            let (mut sx, mut sy, mut n) = (0.0, 0.0, 0usize);
            for (i, &m) in mask.iter().enumerate() {
                if m {
                    sx += (i % w) as f64;
                    sy += (i / w) as f64;
                    n += 1;
                }
            }
            (n > 0).then(|| (sx / n as f64, sy / n as f64))
        };
        let (ax, ay) = centroid(ca)?;
        let (bx, by) = centroid(cb)?;

        let (dx, dy) = (bx - ax, by - ay);
        let len = (dx * dx + dy * dy).sqrt();
        let dir = if len > 1e-9 { (dx / len, dy / len) } else { (1.0, 0.0) };

        let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
        for i in 0..ca.len() {
            if ca[i] && cb[i] {
                let p = (i % w) as f64 * dir.0 + (i / w) as f64 * dir.1;
                lo = lo.min(p);
                hi = hi.max(p);
            }
        }
        (lo <= hi).then_some(Self { dir, lo, hi })
    }

    fn at(&self, x: f64, y: f64) -> f32 {
        if self.hi - self.lo < 1e-9 {
            return 0.5;
        }
        let p = x * self.dir.0 + y * self.dir.1;
        ((p - self.lo) / (self.hi - self.lo)).clamp(0.0, 1.0) as f32
    }
}
