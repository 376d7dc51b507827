//! Robust Estimation Module
//!
//! Generic random-sample consensus over any model implementing
//! [`RobustModel`]. Sampling is driven by a seeded RNG so repeated runs over
//! the same data give the same model.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use std::marker::PhantomData;

/// Errors at or below this distance always count as inliers, so a zero
/// threshold still accepts exactly consistent data.
pub const INLIER_FLOOR: f64 = 1e-6;

/// Configuration for robust estimation
#[derive(Debug, Clone)]
pub struct RobustConfig {
    pub threshold: f64,
    pub max_iterations: usize,
    pub confidence: f64,
    pub seed: u64,
}

impl Default for RobustConfig {
    fn default() -> Self {
        Self {
            threshold: 4.0,
            max_iterations: 2000,
            confidence: 0.995,
            seed: 0,
        }
    }
}

/// Result of robust estimation
#[derive(Debug, Clone)]
pub struct RobustResult<M> {
    pub model: Option<M>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
    pub iterations: usize,
}

impl<M> RobustResult<M> {
    fn failed(iterations: usize) -> Self {
        Self {
            model: None,
            inliers: Vec::new(),
            num_inliers: 0,
            residual: f64::INFINITY,
            iterations,
        }
    }
}

/// Trait for models that can be estimated robustly
pub trait RobustModel<D> {
    type Model: Clone;

    /// Minimum number of data points required to estimate the model
    fn min_sample_size(&self) -> usize;

    /// Cheap rejection of samples that cannot produce a usable model.
    fn is_degenerate(&self, _sample: &[&D]) -> bool {
        false
    }

    /// Estimate model from a minimal sample
    fn estimate(&self, data: &[&D]) -> Option<Self::Model>;

    /// Re-fit on every inlier of the winning model.
    fn refine(&self, data: &[&D]) -> Option<Self::Model> {
        self.estimate(data)
    }

    /// Compute error for a single data point against the model
    fn compute_error(&self, model: &Self::Model, data: &D) -> f64;
}

/// Generic RANSAC engine
pub struct Ransac<D, M: RobustModel<D>> {
    config: RobustConfig,
    _phantom: PhantomData<(D, M)>,
}

impl<D, M: RobustModel<D>> Ransac<D, M> {
    pub fn new(config: RobustConfig) -> Self {
        Self {
            config,
            _phantom: PhantomData,
        }
    }

    pub fn config(&self) -> &RobustConfig {
        &self.config
    }

    pub fn run(&self, estimator: &M, data: &[D]) -> RobustResult<M::Model> {
        let n = data.len();
        let k = estimator.min_sample_size();

        if n < k || k == 0 {
            return RobustResult::failed(0);
        }

        let threshold = self.config.threshold.max(INLIER_FLOOR);
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut best: Option<(M::Model, Vec<bool>, usize, f64)> = None;
        let mut required = self.config.max_iterations;
        let mut iterations = 0;

        while iterations < required.min(self.config.max_iterations) {
            iterations += 1;

            let picked = sample(&mut rng, n, k);
            let subset: Vec<&D> = picked.iter().map(|i| &data[i]).collect();
            if estimator.is_degenerate(&subset) {
                continue;
            }
            let Some(model) = estimator.estimate(&subset) else {
                continue;
            };

            let (inliers, count, residual) = self.score(estimator, &model, data, threshold);
            let improves = match &best {
                None => count > 0,
                Some((_, _, best_count, best_residual)) => {
                    count > *best_count || (count == *best_count && residual < *best_residual)
                }
            };

            if improves {
                required = adaptive_iterations(count, n, k, self.config.confidence)
                    .unwrap_or(required);
                best = Some((model, inliers, count, residual));
            }
        }

        let Some((model, inliers, count, residual)) = best else {
            return RobustResult::failed(iterations);
        };

        let support: Vec<&D> = data
            .iter()
            .zip(&inliers)
            .filter_map(|(d, &inlier)| inlier.then_some(d))
            .collect();

        if let Some(refined) = estimator.refine(&support) {
            let (r_inliers, r_count, r_residual) = self.score(estimator, &refined, data, threshold);
            if r_count >= count {
                return RobustResult {
                    model: Some(refined),
                    inliers: r_inliers,
                    num_inliers: r_count,
                    residual: r_residual,
                    iterations,
                };
            }
        }

        RobustResult {
            model: Some(model),
            inliers,
            num_inliers: count,
            residual,
            iterations,
        }
    }

    fn score(
        &self,
        estimator: &M,
        model: &M::Model,
        data: &[D],
        threshold: f64,
    ) -> (Vec<bool>, usize, f64) {
        let mut inliers = vec![false; data.len()];
        let mut count = 0;
        let mut total_error = 0.0;

        for (flag, d) in inliers.iter_mut().zip(data) {
            let err = estimator.compute_error(model, d);
            if err <= threshold {
                *flag = true;
                count += 1;
                total_error += err;
            }
        }

        let residual = if count > 0 {
            total_error / count as f64
        } else {
            f64::INFINITY
        };
        (inliers, count, residual)
    }
}

/// Iterations needed to draw one all-inlier sample with the given confidence.
fn adaptive_iterations(inliers: usize, n: usize, k: usize, confidence: f64) -> Option<usize> {
    let w = inliers as f64 / n as f64;
    let p_good = w.powi(k as i32);
    if p_good >= 1.0 - f64::EPSILON {
        return Some(1);
    }
    if p_good <= 0.0 || !(0.0..1.0).contains(&confidence) {
        return None;
    }
    let needed = (1.0 - confidence).ln() / (1.0 - p_good).ln();
    needed.is_finite().then(|| needed.ceil().max(1.0) as usize)
}
