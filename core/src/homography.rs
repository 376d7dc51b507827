//! Planar projective transforms.
//!
//! A [`Homography`] is a 3×3 matrix normalized so that `H[2][2] = 1` and
//! guaranteed invertible. Construction through [`Homography::new`] is the only
//! way to obtain one, so every value in circulation can be inverted and
//! composed.

use crate::{Error, Result};
use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

/// Smallest |det| accepted for a normalized matrix.
const DET_EPSILON: f64 = 1e-12;
/// Smallest |w| accepted when dehomogenizing a projected point.
const W_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[[f64; 3]; 3]", into = "[[f64; 3]; 3]")]
pub struct Homography {
    m: Matrix3<f64>,
}

impl Homography {
    pub fn new(m: Matrix3<f64>) -> Result<Self> {
        if m.iter().any(|v| !v.is_finite()) {
            return Err(Error::DegenerateHomography);
        }
        let scale = m[(2, 2)];
        if scale.abs() < W_EPSILON {
            return Err(Error::DegenerateHomography);
        }
        let m = m / scale;
        if m.determinant().abs() < DET_EPSILON {
            return Err(Error::DegenerateHomography);
        }
        Ok(Self { m })
    }

    pub fn identity() -> Self {
        Self {
            m: Matrix3::identity(),
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            m: Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0),
        }
    }

    /// A zero factor yields `DegenerateHomography`.
    pub fn scaling(sx: f64, sy: f64) -> Result<Self> {
        Self::new(Matrix3::new(sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0))
    }

    pub fn from_rows(rows: [[f64; 3]; 3]) -> Result<Self> {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_rows(&self) -> [[f64; 3]; 3] {
        let m = &self.m;
        [
            [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
            [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
            [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
        ]
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.m
    }

    /// Maps `(x, y)`; `None` when the point lands on the line at infinity.
    pub fn project(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let p = self.m * Vector3::new(x, y, 1.0);
        if p[2].abs() < W_EPSILON {
            return None;
        }
        let (u, v) = (p[0] / p[2], p[1] / p[2]);
        (u.is_finite() && v.is_finite()).then_some((u, v))
    }

    /// Whether `(x, y)` maps with a positive homogeneous scale. `H[2][2] = 1`
    /// puts the origin on this side, so points with `w <= 0` lie across the
    /// line the transform sends to infinity.
    pub fn is_in_front(&self, x: f64, y: f64) -> bool {
        let m = &self.m;
        m[(2, 0)] * x + m[(2, 1)] * y + m[(2, 2)] > W_EPSILON
    }

    pub fn inverse(&self) -> Result<Self> {
        let inv = self.m.try_inverse().ok_or(Error::DegenerateHomography)?;
        Self::new(inv)
    }

    /// `self · rhs`: applies `rhs` first, then `self`.
    pub fn compose(&self, rhs: &Homography) -> Result<Self> {
        Self::new(self.m * rhs.m)
    }

    /// Re-expresses a transform estimated on rasters resized by `factor`
    /// (`D · H · D⁻¹`, `D = diag(factor, factor, 1)`).
    pub fn rescaled(&self, factor: f64) -> Result<Self> {
        if !(factor.is_finite() && factor > 0.0) {
            return Err(Error::InvalidParameter(format!(
                "rescale factor must be positive, got {}",
                factor
            )));
        }
        let d = Matrix3::new(factor, 0.0, 0.0, 0.0, factor, 0.0, 0.0, 0.0, 1.0);
        let d_inv = Matrix3::new(1.0 / factor, 0.0, 0.0, 0.0, 1.0 / factor, 0.0, 0.0, 0.0, 1.0);
        Self::new(d * self.m * d_inv)
    }

    pub fn translation_part(&self) -> (f64, f64) {
        (self.m[(0, 2)], self.m[(1, 2)])
    }

    pub fn max_abs_diff(&self, other: &Homography) -> f64 {
        (self.m - other.m).abs().max()
    }
}

impl Default for Homography {
    fn default() -> Self {
        Self::identity()
    }
}

impl TryFrom<[[f64; 3]; 3]> for Homography {
    type Error = Error;

    fn try_from(rows: [[f64; 3]; 3]) -> Result<Self> {
        Self::from_rows(rows)
    }
}

impl From<Homography> for [[f64; 3]; 3] {
    fn from(h: Homography) -> Self {
        h.to_rows()
    }
}

impl std::fmt::Display for Homography {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.to_rows() {
            writeln!(f, "[{:>12.6} {:>12.6} {:>12.6}]", row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn perspective() -> Homography {
        Homography::new(Matrix3::new(
            1.1, 0.05, 12.0, //
            -0.03, 0.95, -7.0, //
            0.0002, -0.0001, 1.0,
        ))
        .unwrap()
    }

    #[test]
    fn new_normalizes_bottom_right() {
        let h = Homography::new(Matrix3::identity() * 4.0).unwrap();
        assert_eq!(h.matrix()[(2, 2)], 1.0);
        assert_eq!(h, Homography::identity());
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let m = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert!(matches!(Homography::new(m), Err(Error::DegenerateHomography)));
        assert!(matches!(
            Homography::new(Matrix3::zeros()),
            Err(Error::DegenerateHomography)
        ));
    }

    #[test]
    fn non_finite_matrix_is_rejected() {
        let mut m = Matrix3::identity();
        m[(0, 1)] = f64::NAN;
        assert!(Homography::new(m).is_err());
    }

    #[test]
    fn project_then_inverse_roundtrip() {
        let h = perspective();
        let inv = h.inverse().unwrap();
        for &(x, y) in &[(0.0, 0.0), (50.0, 75.0), (640.0, 10.0), (-20.0, 300.0)] {
            let (u, v) = h.project(x, y).unwrap();
            let (bx, by) = inv.project(u, v).unwrap();
            assert_relative_eq!(bx, x, epsilon = 1e-8);
            assert_relative_eq!(by, y, epsilon = 1e-8);
        }
    }

    #[test]
    fn compose_applies_right_operand_first() {
        let t = Homography::translation(5.0, -3.0);
        let s = Homography::scaling(2.0, 2.0).unwrap();
        let st = s.compose(&t).unwrap();
        assert_eq!(st.project(1.0, 1.0), Some((12.0, -4.0)));
    }

    #[test]
    fn rescaled_translation_scales_offset() {
        let h = Homography::translation(20.0, -4.0);
        let full = h.rescaled(4.0).unwrap();
        let (tx, ty) = full.translation_part();
        assert_relative_eq!(tx, 80.0, epsilon = 1e-12);
        assert_relative_eq!(ty, -16.0, epsilon = 1e-12);
        assert!(h.rescaled(0.0).is_err());
    }

    #[test]
    fn rescaled_commutes_with_point_scaling() {
        let h = perspective();
        let factor = 4.0;
        let full = h.rescaled(factor).unwrap();
        let (u, v) = h.project(10.0, 20.0).unwrap();
        let (fu, fv) = full.project(10.0 * factor, 20.0 * factor).unwrap();
        assert_relative_eq!(fu, u * factor, epsilon = 1e-8);
        assert_relative_eq!(fv, v * factor, epsilon = 1e-8);
    }

    #[test]
    fn points_across_the_horizon_are_behind() {
        // w = 1 - 0.05 x vanishes at x = 20
        let h = Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [-0.05, 0.0, 1.0]]).unwrap();
        assert!(h.is_in_front(0.0, 0.0));
        assert!(h.is_in_front(19.0, 7.0));
        assert!(!h.is_in_front(20.0, 0.0));
        assert!(!h.is_in_front(40.0, 20.0));
        // the finite projection alone does not tell the sides apart
        assert_eq!(h.project(40.0, 0.0), Some((-40.0, 0.0)));
    }

    #[test]
    fn serde_uses_row_arrays() {
        let h = Homography::translation(1.5, 2.0);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, "[[1.0,0.0,1.5],[0.0,1.0,2.0],[0.0,0.0,1.0]]");
        let back: Homography = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
        assert!(serde_json::from_str::<Homography>("[[0,0,0],[0,0,0],[0,0,0]]").is_err());
    }
}
