//! Direct least-squares ellipse fitting (Fitzgibbon, Pilu, Fisher 1999).

use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::conic::conic_to_ellipse;
use crate::eigen::pseudo_eigen;
use crate::ellipse::RotatedEllipse;

/// Fits an ellipse to a closed contour.
pub trait EllipseFitter {
    fn fit(&self, points: &[Point2<f32>]) -> Option<RotatedEllipse>;
}

/// Fitzgibbon direct fit on Hartley-normalized coordinates.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectEllipseFitter {
    /// Minimum number of points accepted (at least 6).
    pub min_points: usize,
}

impl Default for DirectEllipseFitter {
    fn default() -> Self {
        Self { min_points: 6 }
    }
}

impl EllipseFitter for DirectEllipseFitter {
    fn fit(&self, points: &[Point2<f32>]) -> Option<RotatedEllipse> {
        if points.len() < self.min_points.max(6) {
            return None;
        }
        let coeffs = fit_conic_direct(points)?;
        conic_to_ellipse(coeffs)
    }
}

/// Mean and isotropic scale mapping the points to mean distance √2.
fn normalization(points: &[Point2<f32>]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.x as f64).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y as f64).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x as f64 - mx).powi(2) + (p.y as f64 - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mx, my, s)
}

/// Conic coefficients `[A, B, C, D, E, F]` of the best-fit ellipse, in the
/// original pixel frame.
pub fn fit_conic_direct(points: &[Point2<f32>]) -> Option<[f64; 6]> {
    let n = points.len();
    if n < 6 {
        return None;
    }
    let (mx, my, s) = normalization(points);

    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, p) in points.iter().enumerate() {
        let x = (p.x as f64 - mx) * s;
        let y = (p.y as f64 - my) * s;
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }
    let scatter = d.transpose() * &d;
    let s11: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22: Matrix3<f64> = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // Ellipse constraint 4AC - B² = 1 as aᵀ C1 a.
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let s22_inv = s22.try_inverse()?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();
    let system = c1.try_inverse()? * reduced;

    let pe = pseudo_eigen(&system)?;
    let a1: Vector3<f64> = (0..3)
        .filter(|&k| pe.is_real(k))
        .map(|k| (pe.values[k], pe.vectors.column(k).into_owned()))
        .filter(|(_, v)| 4.0 * v[0] * v[2] - v[1] * v[1] > 0.0)
        .min_by(|l, r| l.0.abs().total_cmp(&r.0.abs()))
        .map(|(_, v)| v)?;
    let a2 = -(s22_inv * s12.transpose() * a1);

    Some(denormalize([a1[0], a1[1], a1[2], a2[0], a2[1], a2[2]], mx, my, s))
}

/// Undo `x' = s(x - mx)`, `y' = s(y - my)`.
fn denormalize(c: [f64; 6], mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a_, b_, c_, d_, e_, f_] = c;
    let s2 = s * s;
    [
        a_ * s2,
        b_ * s2,
        c_ * s2,
        -2.0 * a_ * s2 * mx - b_ * s2 * my + d_ * s,
        -b_ * s2 * mx - 2.0 * c_ * s2 * my + e_ * s,
        a_ * s2 * mx * mx + b_ * s2 * mx * my + c_ * s2 * my * my - d_ * s * mx - e_ * s * my
            + f_,
    ]
}
