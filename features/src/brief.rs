use cv_core::{Descriptor, KeyPoint};
use image::GrayImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Binary intensity-comparison descriptor over a square patch.
///
/// The comparison pattern is drawn once from a seeded RNG, so two `Brief`
/// instances built with the same parameters produce comparable descriptors.
#[derive(Debug, Clone)]
pub struct Brief {
    bytes: usize,
    pattern: Vec<[(i32, i32); 2]>,
}

impl Brief {
    pub fn new(bytes: usize, patch_size: u32, seed: u64) -> Self {
        let radius = (patch_size.max(3) / 2) as i32;
        // isotropic Gaussian around the centre, σ = S/5 (Calonder et al.)
        let sigma = patch_size.max(3) as f64 / 5.0;
        let mut rng = StdRng::seed_from_u64(seed);

        let draw = |rng: &mut StdRng| -> (i32, i32) {
            let mut coord = || {
                // Box–Muller
                let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
                let u2: f64 = rng.gen_range(0.0..1.0);
                let g = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
                ((g * sigma).round() as i32).clamp(-radius, radius)
            };
            let x = coord();
            (x, coord())
        };

        let pattern = (0..bytes * 8)
            .map(|_| [draw(&mut rng), draw(&mut rng)])
            .collect();

        Self { bytes, pattern }
    }

    pub fn bytes(&self) -> usize {
        self.bytes
    }

    pub fn compute(&self, image: &GrayImage, keypoints: &[KeyPoint]) -> Vec<Descriptor> {
        keypoints
            .iter()
            .map(|kp| Descriptor::Binary(self.compute_single(image, kp)))
            .collect()
    }

    fn compute_single(&self, image: &GrayImage, kp: &KeyPoint) -> Vec<u8> {
        let x = kp.x.round() as i32;
        let y = kp.y.round() as i32;

        let mut descriptor = vec![0u8; self.bytes];

        for (i, pair) in self.pattern.iter().enumerate() {
            let v1 = pixel_replicate(image, x + pair[0].0, y + pair[0].1);
            let v2 = pixel_replicate(image, x + pair[1].0, y + pair[1].1);

            if v1 < v2 {
                descriptor[i / 8] |= 1 << (i % 8);
            }
        }

        descriptor
    }
}

fn pixel_replicate(image: &GrayImage, x: i32, y: i32) -> u8 {
    let x = x.clamp(0, image.width() as i32 - 1);
    let y = y.clamp(0, image.height() as i32 - 1);
    image.get_pixel(x as u32, y as u32)[0]
}
