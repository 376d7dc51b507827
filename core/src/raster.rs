//! Fixed-format pixel buffer shared by every pipeline stage.
//!
//! A [`Raster`] is always 8-bit RGB, row-major, interleaved. Sources in other
//! formats are converted once when the raster is built; stages never inspect
//! the channel layout at run time.

use crate::{Error, Result};
use image::{DynamicImage, Rgb, RgbImage};

/// Channels per pixel.
pub const CHANNELS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    image: RgbImage,
}

impl Raster {
    /// All-zero (fully transparent) raster.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbImage::new(width, height),
        }
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * CHANNELS;
        if data.len() != expected {
            return Err(Error::DimensionMismatch(format!(
                "{}x{} raster needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, data).ok_or_else(|| {
            Error::DimensionMismatch(format!("invalid {}x{} buffer", width, height))
        })?;
        Ok(Self { image })
    }

    pub fn from_rgb(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            image: image.into_rgb8(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn channels(&self) -> usize {
        CHANNELS
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn as_raw_mut(&mut self) -> &mut [u8] {
        &mut self.image
    }

    pub fn as_rgb(&self) -> &RgbImage {
        &self.image
    }

    pub fn into_rgb(self) -> RgbImage {
        self.image
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; CHANNELS] {
        self.image.get_pixel(x, y).0
    }

    pub fn put_pixel(&mut self, x: u32, y: u32, value: [u8; CHANNELS]) {
        self.image.put_pixel(x, y, Rgb(value));
    }

    /// A pixel carries content when any channel is non-zero; all-zero pixels
    /// are transparent.
    pub fn has_content(&self, x: u32, y: u32) -> bool {
        self.image.get_pixel(x, y).0.iter().any(|&c| c != 0)
    }

    /// Per-pixel content flags in row-major order.
    pub fn content_mask(&self) -> Vec<bool> {
        self.image
            .as_raw()
            .chunks_exact(CHANNELS)
            .map(|px| px.iter().any(|&c| c != 0))
            .collect()
    }

    /// Copies `src` so that its origin lands at `(offset_x, offset_y)`,
    /// writing only the part that falls inside `self`. Returns the number of
    /// pixels written.
    pub fn copy_from_clipped(&mut self, src: &Raster, offset_x: i64, offset_y: i64) -> usize {
        let dst_w = self.width() as i64;
        let dst_h = self.height() as i64;

        let x0 = offset_x.max(0);
        let y0 = offset_y.max(0);
        let x1 = (offset_x + src.width() as i64).min(dst_w);
        let y1 = (offset_y + src.height() as i64).min(dst_h);
        if x0 >= x1 || y0 >= y1 {
            return 0;
        }

        let row_len = (x1 - x0) as usize * CHANNELS;
        let src_stride = src.width() as usize * CHANNELS;
        let dst_stride = self.width() as usize * CHANNELS;
        let src_raw = src.as_raw();
        let dst_raw = self.as_raw_mut();

        for y in y0..y1 {
            let sy = (y - offset_y) as usize;
            let sx = (x0 - offset_x) as usize;
            let s = sy * src_stride + sx * CHANNELS;
            let d = y as usize * dst_stride + x0 as usize * CHANNELS;
            dst_raw[d..d + row_len].copy_from_slice(&src_raw[s..s + row_len]);
        }

        ((x1 - x0) * (y1 - y0)) as usize
    }
}

impl From<RgbImage> for Raster {
    fn from(image: RgbImage) -> Self {
        Self::from_rgb(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_raw_checks_buffer_length() {
        assert!(Raster::from_raw(2, 2, vec![0; 12]).is_ok());
        let err = Raster::from_raw(2, 2, vec![0; 11]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch(_)));
    }

    #[test]
    fn new_raster_is_transparent() {
        let r = Raster::new(4, 3);
        assert_eq!(r.dimensions(), (4, 3));
        assert!(r.content_mask().iter().all(|&c| !c));
    }

    #[test]
    fn has_content_sees_any_channel() {
        let mut r = Raster::new(2, 1);
        r.put_pixel(1, 0, [0, 0, 7]);
        assert!(!r.has_content(0, 0));
        assert!(r.has_content(1, 0));
    }

    #[test]
    fn copy_from_clipped_crops_to_destination() {
        let mut dst = Raster::new(4, 4);
        let src = Raster::from_raw(3, 3, vec![9; 27]).unwrap();

        let written = dst.copy_from_clipped(&src, 2, -1);

        // columns 2..4, rows 0..2
        assert_eq!(written, 4);
        assert_eq!(dst.pixel(2, 0), [9, 9, 9]);
        assert_eq!(dst.pixel(3, 1), [9, 9, 9]);
        assert_eq!(dst.pixel(1, 0), [0, 0, 0]);
        assert_eq!(dst.pixel(2, 2), [0, 0, 0]);
    }

    #[test]
    fn copy_from_clipped_outside_writes_nothing() {
        let mut dst = Raster::new(4, 4);
        let src = Raster::from_raw(2, 2, vec![1; 12]).unwrap();
        assert_eq!(dst.copy_from_clipped(&src, 10, 0), 0);
        assert_eq!(dst.copy_from_clipped(&src, -2, 0), 0);
    }
}
