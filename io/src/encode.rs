use crate::{Error, Result};
use cv_core::Raster;
use image::codecs::jpeg::JpegEncoder;
use image::ImageFormat;
use std::io::Cursor;
use std::path::Path;

pub fn encode_png(raster: &Raster) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    raster
        .as_rgb()
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(buf.into_inner())
}

pub fn encode_jpeg(raster: &Raster, quality: u8) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100))
        .encode_image(raster.as_rgb())
        .map_err(|e| Error::Encoding(e.to_string()))?;
    Ok(buf)
}

/// Writes `raster` to `path`, choosing the format from the extension.
pub fn save_raster(path: impl AsRef<Path>, raster: &Raster) -> Result<()> {
    let path = path.as_ref();
    let format = ImageFormat::from_path(path).map_err(|e| Error::Encoding(e.to_string()))?;
    let bytes = match format {
        ImageFormat::Jpeg => encode_jpeg(raster, 92)?,
        ImageFormat::Png => encode_png(raster)?,
        other => {
            return Err(Error::Encoding(format!(
                "unsupported output format {:?} for {}",
                other,
                path.display()
            )))
        }
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}
