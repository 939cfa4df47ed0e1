//! Ellipse ⇄ implicit conic conversion.
//!
//! A conic `A x² + B xy + C y² + D x + E y + F = 0` is stored as the
//! symmetric matrix
//!
//! ```text
//! [ A    B/2  D/2 ]
//! [ B/2  C    E/2 ]
//! [ D/2  E/2  F   ]
//! ```
//!
//! acting on homogeneous points `(x, y, 1)`.

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

use crate::ellipse::RotatedEllipse;

/// Symmetric 3×3 conic matrix.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConicMatrix {
    pub m: Matrix3<f64>,
}

impl ConicMatrix {
    pub fn new(m: Matrix3<f64>) -> Self {
        Self { m }
    }

    /// Build from the six polynomial coefficients `[A, B, C, D, E, F]`.
    pub fn from_coefficients(c: [f64; 6]) -> Self {
        let [a, b, cc, d, e, f] = c;
        Self::new(Matrix3::new(
            a,
            b / 2.0,
            d / 2.0,
            b / 2.0,
            cc,
            e / 2.0,
            d / 2.0,
            e / 2.0,
            f,
        ))
    }

    /// Encode a rotated-rectangle ellipse.
    ///
    /// The result is normalized so the boundary evaluates to 0 and the
    /// center to -1.
    pub fn from_ellipse(e: &RotatedEllipse) -> Self {
        let theta = (e.angle_deg as f64).to_radians();
        let (s, c) = theta.sin_cos();
        let a = e.height as f64 / 2.0;
        let b = e.width as f64 / 2.0;
        let (xc, yc) = (e.center.x as f64, e.center.y as f64);
        let (ia2, ib2) = (1.0 / (a * a), 1.0 / (b * b));

        let ca = c * c * ia2 + s * s * ib2;
        let cb = 2.0 * c * s * (ia2 - ib2);
        let cc = s * s * ia2 + c * c * ib2;
        let cd = -2.0 * ca * xc - cb * yc;
        let ce = -2.0 * cc * yc - cb * xc;
        let cf = ca * xc * xc + cb * xc * yc + cc * yc * yc - 1.0;

        Self::from_coefficients([ca, cb, cc, cd, ce, cf])
    }

    /// `[A, B, C, D, E, F]`.
    pub fn coefficients(&self) -> [f64; 6] {
        let m = &self.m;
        [
            m[(0, 0)],
            2.0 * m[(0, 1)],
            m[(1, 1)],
            2.0 * m[(0, 2)],
            2.0 * m[(1, 2)],
            m[(2, 2)],
        ]
    }

    /// Quadratic form at `(x, y, 1)`: 0 on the curve, negative inside a
    /// normalized ellipse.
    #[inline]
    pub fn evaluate(&self, x: f64, y: f64) -> f64 {
        let v = Vector3::new(x, y, 1.0);
        v.dot(&(self.m * v))
    }

    pub fn to_ellipse(&self) -> Option<RotatedEllipse> {
        conic_to_ellipse(self.coefficients())
    }
}

/// Convert conic coefficients to a rotated-rectangle ellipse with the major
/// axis along `angle_deg`.
///
/// Returns `None` for hyperbolas, parabolas, imaginary and degenerate
/// conics.
pub fn conic_to_ellipse(coeffs: [f64; 6]) -> Option<RotatedEllipse> {
    let [a, b, c, d, e, f] = coeffs;
    if !coeffs.iter().all(|v| v.is_finite()) {
        return None;
    }

    let denom = 4.0 * a * c - b * b;
    let scale = a.abs().max(b.abs()).max(c.abs());
    if scale <= 0.0 || denom <= 1e-12 * scale * scale {
        return None;
    }

    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;
    let mut f_center = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;

    // Orient so that the interior is negative.
    let (mut a, mut b, mut c) = (a, b, c);
    if f_center > 0.0 {
        a = -a;
        b = -b;
        c = -c;
        f_center = -f_center;
    }
    if f_center.abs() <= f64::EPSILON * (1.0 + f.abs()) {
        return None;
    }

    let sum = a + c;
    let diff = ((a - c).powi(2) + b * b).sqrt();
    let lambda_big = 0.5 * (sum + diff);
    let lambda_small = 0.5 * (sum - diff);
    if lambda_small <= 0.0 {
        return None;
    }

    let semi_minor = (-f_center / lambda_big).sqrt();
    let semi_major = (-f_center / lambda_small).sqrt();

    // Direction of the larger eigenvalue is the minor axis.
    let minor_dir = 0.5 * b.atan2(a - c);
    let mut major_deg = (minor_dir + std::f64::consts::FRAC_PI_2).to_degrees();
    if major_deg > 90.0 {
        major_deg -= 180.0;
    }

    let ellipse = RotatedEllipse {
        center: Point2::new(cx as f32, cy as f32),
        width: (2.0 * semi_minor) as f32,
        height: (2.0 * semi_major) as f32,
        angle_deg: major_deg as f32,
    };
    ellipse.is_valid().then_some(ellipse)
}
