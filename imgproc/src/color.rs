use cv_core::{Raster, CHANNELS};
use image::GrayImage;
use rayon::prelude::*;

/// BT.601 luma, rounded: `0.299 R + 0.587 G + 0.114 B`.
pub fn convert_rgb_to_gray(raster: &Raster) -> GrayImage {
    let (w, h) = raster.dimensions();
    let mut gray = GrayImage::new(w, h);

    gray.as_mut()
        .par_iter_mut()
        .zip(raster.as_raw().par_chunks_exact(CHANNELS))
        .for_each(|(g, px)| {
            let luma = 299 * px[0] as u32 + 587 * px[1] as u32 + 114 * px[2] as u32;
            *g = ((luma + 500) / 1000) as u8;
        });

    gray
}

pub fn convert_gray_to_rgb(gray: &GrayImage) -> Raster {
    let mut raster = Raster::new(gray.width(), gray.height());

    raster
        .as_raw_mut()
        .par_chunks_mut(CHANNELS)
        .zip(gray.as_raw().par_iter())
        .for_each(|(px, &g)| px.fill(g));

    raster
}
