//! Image source with header-only probing and deferred decode.

use crate::{Error, Result};
use cv_core::Raster;
use cv_imgproc::{scale_raster, scaled_dimensions};
use image::ImageReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A path whose header has been read but whose pixels have not.
///
/// Opening is cheap, so the estimation and composition passes can share the
/// same handles and decode at whatever scale they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageHandle {
    path: PathBuf,
    width: u32,
    height: u32,
}

impl ImageHandle {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let (width, height) = image::image_dimensions(&path).map_err(|e| load_error(&path, e))?;
        if width == 0 || height == 0 {
            return Err(Error::ImageLoad {
                path,
                reason: "image has no pixels".into(),
            });
        }
        Ok(Self {
            path,
            width,
            height,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Size the raster will have when decoded at `scale`.
    pub fn scaled_dimensions(&self, scale: f64) -> (u32, u32) {
        scaled_dimensions(self.width, self.height, scale)
    }

    /// Full decode to RGB, then a proportional resize by `scale ∈ (0, 1]`.
    pub fn decode(&self, scale: f64) -> Result<Raster> {
        if !(scale > 0.0 && scale <= 1.0) {
            return Err(Error::InvalidParameter(format!(
                "scale must be in (0, 1], got {}",
                scale
            )));
        }

        let dynamic = ImageReader::open(&self.path)
            .map_err(|e| load_error(&self.path, e))?
            .with_guessed_format()
            .map_err(|e| load_error(&self.path, e))?
            .decode()
            .map_err(|e| load_error(&self.path, e))?;

        let raster = scale_raster(Raster::from_dynamic(dynamic), scale)?;
        debug!(
            path = %self.path.display(),
            width = raster.width(),
            height = raster.height(),
            scale,
            "decoded image"
        );
        Ok(raster)
    }
}

/// Opens and decodes `path` at `scale` in one step.
pub fn load(path: impl AsRef<Path>, scale: f64) -> Result<Raster> {
    ImageHandle::open(path)?.decode(scale)
}

fn load_error(path: &Path, e: impl std::fmt::Display) -> Error {
    Error::ImageLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        let img = RgbImage::from_fn(w, h, |x, y| Rgb([(x * 3) as u8, (y * 5) as u8, 90]));
        img.save(&path).unwrap();
        path
    }

    #[test]
    fn open_probes_dimensions_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 40, 24);
        let handle = ImageHandle::open(&path).unwrap();
        assert_eq!(handle.dimensions(), (40, 24));
        assert_eq!(handle.scaled_dimensions(0.25), (10, 6));
    }

    #[test]
    fn decode_full_and_scaled() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "b.png", 40, 24);
        let full = load(&path, 1.0).unwrap();
        assert_eq!(full.dimensions(), (40, 24));
        assert_eq!(full.pixel(2, 3), [6, 15, 90]);

        let half = load(&path, 0.5).unwrap();
        assert_eq!(half.dimensions(), (20, 12));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = load("/definitely/not/here.png", 1.0).unwrap_err();
        assert!(matches!(err, Error::ImageLoad { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn garbage_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.png");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(load(&path, 1.0), Err(Error::ImageLoad { .. })));
    }

    #[test]
    fn bad_scale_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "c.png", 8, 8);
        let handle = ImageHandle::open(&path).unwrap();
        assert!(matches!(handle.decode(0.0), Err(Error::InvalidParameter(_))));
        assert!(matches!(handle.decode(2.0), Err(Error::InvalidParameter(_))));
    }
}
