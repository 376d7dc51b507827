//! RANSAC homography estimation.
//!
//! Minimal samples and the final refit both go through the normalized DLT;
//! the sampling loop itself is the generic [`cv_core::Ransac`] engine.

use cv_core::{Correspondence, Homography, KeyPoints, Ransac, RobustConfig, RobustModel};
use nalgebra::{DMatrix, Matrix3, SymmetricEigen};
use tracing::{debug, warn};

pub type RansacConfig = RobustConfig;

/// Points needed for an exact homography.
pub const MIN_CORRESPONDENCES: usize = 4;

/// Relative tolerance under which three points count as collinear.
const COLLINEAR_EPS: f64 = 1e-6;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchPair {
    pub src: (f64, f64),
    pub dst: (f64, f64),
}

impl MatchPair {
    pub fn new(src: (f64, f64), dst: (f64, f64)) -> Self {
        Self { src, dst }
    }
}

pub struct HomographyEstimator;

impl RobustModel<MatchPair> for HomographyEstimator {
    type Model = Homography;

    fn min_sample_size(&self) -> usize {
        MIN_CORRESPONDENCES
    }

    fn is_degenerate(&self, sample: &[&MatchPair]) -> bool {
        let src: Vec<(f64, f64)> = sample.iter().map(|m| m.src).collect();
        let dst: Vec<(f64, f64)> = sample.iter().map(|m| m.dst).collect();
        has_collinear_triple(&src) || has_collinear_triple(&dst)
    }

    fn estimate(&self, data: &[&MatchPair]) -> Option<Homography> {
        dlt_homography(data)
    }

    fn compute_error(&self, model: &Homography, data: &MatchPair) -> f64 {
        match model.project(data.src.0, data.src.1) {
            Some((x, y)) => ((x - data.dst.0).powi(2) + (y - data.dst.1).powi(2)).sqrt(),
            None => f64::INFINITY,
        }
    }
}

/// Outcome of one estimation. On failure `homography` is `None` and
/// `inliers` is empty; otherwise `inliers` is index-aligned with the input
/// correspondences.
#[derive(Debug, Clone)]
pub struct HomographyEstimate {
    pub homography: Option<Homography>,
    pub inliers: Vec<bool>,
    pub num_inliers: usize,
    pub residual: f64,
    pub iterations: usize,
}

impl HomographyEstimate {
    fn failed() -> Self {
        Self {
            homography: None,
            inliers: Vec::new(),
            num_inliers: 0,
            residual: f64::INFINITY,
            iterations: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.homography.is_some()
    }
}

/// Estimate `H` mapping points of `src_kps` onto `dst_kps`.
/// `query_idx` of each correspondence indexes `src_kps`, `train_idx` indexes
/// `dst_kps`.
pub fn estimate_homography(
    src_kps: &KeyPoints,
    dst_kps: &KeyPoints,
    correspondences: &[Correspondence],
    config: &RansacConfig,
) -> HomographyEstimate {
    let mut pairs = Vec::with_capacity(correspondences.len());
    for c in correspondences {
        let (Some(s), Some(d)) = (src_kps.get(c.query_idx), dst_kps.get(c.train_idx)) else {
            warn!(
                query = c.query_idx,
                train = c.train_idx,
                "correspondence refers to a missing keypoint"
            );
            return HomographyEstimate::failed();
        };
        pairs.push(MatchPair::new((s.x, s.y), (d.x, d.y)));
    }
    estimate_from_pairs(&pairs, config)
}

pub fn estimate_from_pairs(pairs: &[MatchPair], config: &RansacConfig) -> HomographyEstimate {
    if pairs.len() < MIN_CORRESPONDENCES {
        debug!(found = pairs.len(), "too few correspondences for a homography");
        return HomographyEstimate::failed();
    }

    let src: Vec<(f64, f64)> = pairs.iter().map(|m| m.src).collect();
    let dst: Vec<(f64, f64)> = pairs.iter().map(|m| m.dst).collect();
    if all_collinear(&src) || all_collinear(&dst) {
        debug!("correspondences are collinear");
        return HomographyEstimate::failed();
    }

    let result = Ransac::new(config.clone()).run(&HomographyEstimator, pairs);
    debug!(
        inliers = result.num_inliers,
        total = pairs.len(),
        iterations = result.iterations,
        "ransac finished"
    );

    HomographyEstimate {
        homography: result.model,
        inliers: result.inliers,
        num_inliers: result.num_inliers,
        residual: result.residual,
        iterations: result.iterations,
    }
}

/// Normalized DLT over at least four pairs. `None` when the system is
/// degenerate or the solution is not an invertible homography.
pub fn dlt_homography(pairs: &[&MatchPair]) -> Option<Homography> {
    let n = pairs.len();
    if n < MIN_CORRESPONDENCES {
        return None;
    }

    let src: Vec<(f64, f64)> = pairs.iter().map(|m| m.src).collect();
    let dst: Vec<(f64, f64)> = pairs.iter().map(|m| m.dst).collect();
    let (t_src, src_n) = normalize_points(&src)?;
    let (t_dst, dst_n) = normalize_points(&dst)?;

    let mut a = DMatrix::zeros(2 * n, 9);
    for i in 0..n {
        let (sx, sy) = src_n[i];
        let (dx, dy) = dst_n[i];

        a[(2 * i, 3)] = -sx;
        a[(2 * i, 4)] = -sy;
        a[(2 * i, 5)] = -1.0;
        a[(2 * i, 6)] = dy * sx;
        a[(2 * i, 7)] = dy * sy;
        a[(2 * i, 8)] = dy;

        a[(2 * i + 1, 0)] = sx;
        a[(2 * i + 1, 1)] = sy;
        a[(2 * i + 1, 2)] = 1.0;
        a[(2 * i + 1, 6)] = -dx * sx;
        a[(2 * i + 1, 7)] = -dx * sy;
        a[(2 * i + 1, 8)] = -dx;
    }

    // h is the eigenvector of AᵀA with the smallest eigenvalue
    let ata = a.transpose() * &a;
    let eig = SymmetricEigen::new(ata);
    let (min_idx, _) = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))?;
    let h = eig.eigenvectors.column(min_idx);
    let h_norm = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], h[8]);

    let t_dst_inv = t_dst.try_inverse()?;
    Homography::new(t_dst_inv * h_norm * t_src).ok()
}

/// Translate to the centroid and scale to mean distance √2.
fn normalize_points(pts: &[(f64, f64)]) -> Option<(Matrix3<f64>, Vec<(f64, f64)>)> {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_dist = pts
        .iter()
        .map(|p| ((p.0 - cx).powi(2) + (p.1 - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    if !(mean_dist.is_finite() && mean_dist > 1e-15) {
        return None;
    }
    let s = std::f64::consts::SQRT_2 / mean_dist;
    let t = Matrix3::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0);
    let normalized = pts.iter().map(|p| (s * (p.0 - cx), s * (p.1 - cy))).collect();
    Some((t, normalized))
}

fn has_collinear_triple(pts: &[(f64, f64)]) -> bool {
    for i in 0..pts.len() {
        for j in i + 1..pts.len() {
            for k in j + 1..pts.len() {
                let (ax, ay) = (pts[j].0 - pts[i].0, pts[j].1 - pts[i].1);
                let (bx, by) = (pts[k].0 - pts[i].0, pts[k].1 - pts[i].1);
                let cross = (ax * by - ay * bx).abs();
                let scale = (ax * ax + ay * ay).sqrt() * (bx * bx + by * by).sqrt();
                if cross <= COLLINEAR_EPS * scale {
                    return true;
                }
            }
        }
    }
    false
}

/// True when the whole point set lies on one line (or one point), judged by
/// the eigenvalue ratio of its scatter matrix.
fn all_collinear(pts: &[(f64, f64)]) -> bool {
    let n = pts.len() as f64;
    let cx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let cy = pts.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxx, mut sxy, mut syy) = (0.0, 0.0, 0.0);
    for p in pts {
        let (dx, dy) = (p.0 - cx, p.1 - cy);
        sxx += dx * dx;
        sxy += dx * dy;
        syy += dy * dy;
    }

    let half_trace = 0.5 * (sxx + syy);
    let det = sxx * syy - sxy * sxy;
    let lambda_max = half_trace + (half_trace * half_trace - det).max(0.0).sqrt();
    if !(lambda_max > 0.0) {
        return true;
    }
    let lambda_min = det / lambda_max;
    lambda_min <= 1e-12 * lambda_max
}
