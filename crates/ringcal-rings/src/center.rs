//! True ring center from a pencil of concentric conics.
//!
//! For two image conics `Ci`, `Cj` of concentric circles with radii `ri > rj`,
//! `Ci⁻¹ Cj` has a double eigenvalue whose eigenspace is the polar line of
//! the center, and a simple eigenvalue whose eigenvector is the projected
//! center in homogeneous coordinates. After scaling by `(rj/ri)²` the double
//! eigenvalue of a perfectly encoded pair is exactly 1, which gives each pair
//! a residual used to pick the best-conditioned one.

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::conic::ConicMatrix;
use crate::eigen::pseudo_eigen;

/// Settings for [`solve_ring_center`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CenterSolverParams {
    /// Two scaled eigenvalues closer than this are treated as the double one.
    pub eigenvalue_tolerance: f64,
    /// Also pair every outer boundary with the innermost one. By default
    /// only the pairs among boundaries 1..=3 are evaluated.
    pub include_innermost: bool,
}

impl Default for CenterSolverParams {
    fn default() -> Self {
        Self {
            eigenvalue_tolerance: 0.2,
            include_innermost: false,
        }
    }
}

/// Center recovered from one ring group.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RingCenter {
    pub center: Point2<f64>,
    /// Squared deviation of the double eigenvalue from 1; lower is better.
    pub score: f64,
    /// `(outer, inner)` boundary indices of the winning pair.
    pub pair: (usize, usize),
}

/// Failures of [`solve_ring_center`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq)]
pub enum CenterSolveError {
    #[error("conic of boundary {boundary} is singular")]
    SingularConic { boundary: usize },
    #[error("no boundary pair produced a finite center")]
    NoFiniteCenter,
    #[error("radii must be positive and strictly increasing")]
    InvalidRadii,
}

/// Boundary pairs `(i, j)`, `i > j`, outer index descending then inner
/// index descending.
pub fn pencil_pairs(include_innermost: bool) -> Vec<(usize, usize)> {
    let lowest = if include_innermost { 0 } else { 1 };
    (1..4)
        .rev()
        .flat_map(|i| (lowest..i).rev().map(move |j| (i, j)))
        .collect()
}

/// Relative singularity test on a (normalized) conic matrix.
fn is_singular(m: &Matrix3<f64>) -> bool {
    let norm = m.norm();
    if !(norm.is_finite() && norm > 0.0) {
        return true;
    }
    let det = m.determinant();
    !det.is_finite() || det.abs() <= 1e-12 * norm * norm * norm
}

/// Inverse of the similarity `N` that moves the center of `outer` to the
/// origin and scales its radius to about 1. Identity when `outer` is not a
/// usable ellipse.
///
/// Pencil eigenvalues are invariant under `C ↦ N⁻ᵀ C N⁻¹`; only the
/// conditioning of the inversions changes.
fn denormalization(outer: &Matrix3<f64>) -> Matrix3<f64> {
    let identity = Matrix3::identity();
    let q = outer.fixed_view::<2, 2>(0, 0).into_owned();
    let Some(q_inv) = q.try_inverse() else {
        return identity;
    };
    let c = -(q_inv * outer.fixed_view::<2, 1>(0, 2));
    let f_center = (q * c).dot(&c) + 2.0 * outer.fixed_view::<2, 1>(0, 2).dot(&c) + outer[(2, 2)];
    let sigma = (0.5 * q.trace() / -f_center).sqrt();
    if !(sigma.is_finite() && sigma > 0.0 && c.iter().all(|v| v.is_finite())) {
        return identity;
    }

    Matrix3::new(1.0 / sigma, 0.0, c[0], 0.0, 1.0 / sigma, c[1], 0.0, 0.0, 1.0)
}

/// Scaled eigen-analysis of one pair; `None` when the pair is unusable.
fn evaluate_pair(
    ci_inv: &Matrix3<f64>,
    cj: &Matrix3<f64>,
    ratio_sq: f64,
    tol: f64,
) -> Option<(Vector3<f64>, f64)> {
    let pe = pseudo_eigen(&(ci_inv * cj))?;
    let l = pe.values * ratio_sq;

    let (column, score) = if (l[0] - l[1]).abs() < tol {
        (2, (l[0] - 1.0).powi(2) + (l[1] - 1.0).powi(2))
    } else if (l[0] - l[2]).abs() < tol {
        (1, (l[0] - 1.0).powi(2) + (l[2] - 1.0).powi(2))
    } else {
        (0, (l[1] - 1.0).powi(2) + (l[2] - 1.0).powi(2))
    };

    score
        .is_finite()
        .then(|| (pe.vectors.column(column).into_owned(), score))
}

/// Recover the center of one ring group.
///
/// `conics` and `radii` are ordered from the innermost to the outermost
/// boundary; `radii` are the physical boundary radii (any unit).
#[cfg_attr(feature = "tracing", instrument(level = "trace", skip_all))]
pub fn solve_ring_center(
    conics: &[ConicMatrix; 4],
    radii: &[f64; 4],
    params: &CenterSolverParams,
) -> Result<RingCenter, CenterSolveError> {
    if radii.iter().any(|r| !(r.is_finite() && *r > 0.0)) || radii.windows(2).any(|w| w[1] <= w[0])
    {
        return Err(CenterSolveError::InvalidRadii);
    }

    let n_inv = denormalization(&conics[3].m);
    let n_inv_t = n_inv.transpose();
    let normalized = conics.map(|c| n_inv_t * c.m * n_inv);

    let mut best: Option<RingCenter> = None;
    for (i, j) in pencil_pairs(params.include_innermost) {
        let ci = &normalized[i];
        if is_singular(ci) {
            return Err(CenterSolveError::SingularConic { boundary: i });
        }
        let ci_inv = ci
            .try_inverse()
            .ok_or(CenterSolveError::SingularConic { boundary: i })?;

        let ratio_sq = (radii[j] / radii[i]).powi(2);
        let Some((v, score)) =
            evaluate_pair(&ci_inv, &normalized[j], ratio_sq, params.eigenvalue_tolerance)
        else {
            log::trace!("pair ({i}, {j}) gave no eigen-decomposition");
            continue;
        };

        let p = n_inv * v;
        let center = Point2::new(p[0] / p[2], p[1] / p[2]);
        if !(center.x.is_finite() && center.y.is_finite()) {
            log::trace!("pair ({i}, {j}) center at infinity");
            continue;
        }

        if best.is_none_or(|b| score < b.score) {
            best = Some(RingCenter {
                center,
                score,
                pair: (i, j),
            });
        }
    }

    best.ok_or(CenterSolveError::NoFiniteCenter)
}
