use image::GrayImage;
use rayon::prelude::*;

/// Normalized 1D Gaussian. `size` must be odd.
pub fn gaussian_kernel_1d(sigma: f32, size: usize) -> Vec<f32> {
    assert!(size % 2 == 1, "gaussian kernel size must be odd");
    let mut kernel = Vec::with_capacity(size);
    let center = (size / 2) as isize;
    let sigma2 = sigma * sigma;
    let mut sum = 0.0f32;

    for i in 0..size {
        let x = (i as isize - center) as f32;
        let v = (-(x * x) / (2.0 * sigma2)).exp();
        kernel.push(v);
        sum += v;
    }

    if sum != 0.0 {
        for v in &mut kernel {
            *v /= sum;
        }
    }

    kernel
}

/// Kernel covering ±3σ.
fn kernel_for_sigma(sigma: f32) -> Vec<f32> {
    let size = ((sigma * 6.0).ceil() as usize) | 1;
    gaussian_kernel_1d(sigma, size.max(3))
}

/// Separable convolution of a single-channel f32 plane with replicated borders.
pub fn separable_convolve_plane(plane: &[f32], width: usize, height: usize, kernel: &[f32]) -> Vec<f32> {
    assert_eq!(plane.len(), width * height);
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let radius = (kernel.len() / 2) as isize;

    let mut horizontal = vec![0.0f32; plane.len()];
    horizontal
        .par_chunks_mut(width)
        .zip(plane.par_chunks(width))
        .for_each(|(out, row)| {
            for (x, o) in out.iter_mut().enumerate() {
                let mut acc = 0.0;
                for (k, &w) in kernel.iter().enumerate() {
                    let sx = (x as isize + k as isize - radius).clamp(0, width as isize - 1);
                    acc += row[sx as usize] * w;
                }
                *o = acc;
            }
        });

    let mut out = vec![0.0f32; plane.len()];
    out.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        for (x, o) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for (k, &w) in kernel.iter().enumerate() {
                let sy = (y as isize + k as isize - radius).clamp(0, height as isize - 1);
                acc += horizontal[sy as usize * width + x] * w;
            }
            *o = acc;
        }
    });

    out
}

/// Gaussian blur of an f32 plane (weight masks and the like).
pub fn gaussian_blur_plane(plane: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    if sigma <= 0.0 {
        return plane.to_vec();
    }
    separable_convolve_plane(plane, width, height, &kernel_for_sigma(sigma))
}

pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    if sigma <= 0.0 {
        return image.clone();
    }
    let (w, h) = image.dimensions();
    let plane: Vec<f32> = image.as_raw().iter().map(|&v| v as f32).collect();
    let blurred = separable_convolve_plane(&plane, w as usize, h as usize, &kernel_for_sigma(sigma));

    let mut out = GrayImage::new(w, h);
    out.as_mut()
        .par_iter_mut()
        .zip(blurred.par_iter())
        .for_each(|(o, &v)| *o = v.round().clamp(0.0, 255.0) as u8);
    out
}
