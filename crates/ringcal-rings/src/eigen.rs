//! Pseudo eigen-decomposition of general real 3×3 matrices.
//!
//! Real eigenvalues get a real eigenvector column. A complex-conjugate pair
//! `re ± i·im` occupies two adjacent columns holding the real and imaginary
//! parts of one complex eigenvector, and both diagonal entries hold `re`, so
//! that `M · V = V · D` with `D` block diagonal:
//!
//! ```text
//! [ re   im ]
//! [ -im  re ]
//! ```

use nalgebra::{Complex, Matrix3, Vector3};

/// Pseudo eigen-decomposition `M · vectors = vectors · D`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PseudoEigen {
    /// Diagonal of the pseudo-eigenvalue matrix `D`.
    pub values: Vector3<f64>,
    /// Imaginary parts: `+im` for the first column of a conjugate pair,
    /// `-im` for the second, 0 for real eigenvalues.
    pub imag: Vector3<f64>,
    /// Eigenvector columns (real/imaginary parts for complex pairs).
    pub vectors: Matrix3<f64>,
}

impl PseudoEigen {
    #[inline]
    pub fn is_real(&self, k: usize) -> bool {
        self.imag[k] == 0.0
    }

    /// Pseudo-eigenvalue matrix `D`.
    pub fn value_matrix(&self) -> Matrix3<f64> {
        let mut d = Matrix3::from_diagonal(&self.values);
        for k in 0..2 {
            if self.imag[k] > 0.0 && self.imag[k + 1] < 0.0 {
                d[(k, k + 1)] = self.imag[k];
                d[(k + 1, k)] = -self.imag[k];
            }
        }
        d
    }
}

const SCHUR_MAX_ITERS: usize = 200;

/// Pseudo eigen-decomposition via the real Schur form.
///
/// Returns `None` for non-finite input or when the Schur iteration does not
/// converge.
pub fn pseudo_eigen(m: &Matrix3<f64>) -> Option<PseudoEigen> {
    if !m.iter().all(|v| v.is_finite()) {
        return None;
    }
    let (_, t) = (*m).try_schur(f64::EPSILON, SCHUR_MAX_ITERS)?.unpack();

    let mut values = Vector3::zeros();
    let mut imag = Vector3::zeros();
    let mut vectors = Matrix3::zeros();

    let scale = t.amax().max(f64::MIN_POSITIVE);
    let mut k = 0;
    while k < 3 {
        let coupled = k < 2 && t[(k + 1, k)].abs() > 1e-12 * scale;
        if !coupled {
            let lambda = t[(k, k)];
            values[k] = lambda;
            vectors.set_column(k, &real_null_vector(&(m - Matrix3::identity() * lambda))?);
            k += 1;
            continue;
        }

        let (a, b) = (t[(k, k)], t[(k, k + 1)]);
        let (c, d) = (t[(k + 1, k)], t[(k + 1, k + 1)]);
        let mid = 0.5 * (a + d);
        let disc = 0.25 * (a - d) * (a - d) + b * c;
        if disc >= 0.0 {
            let root = disc.sqrt();
            for (col, lambda) in [(k, mid + root), (k + 1, mid - root)] {
                values[col] = lambda;
                vectors
                    .set_column(col, &real_null_vector(&(m - Matrix3::identity() * lambda))?);
            }
        } else {
            let im = (-disc).sqrt();
            let v = complex_null_vector(m, Complex::new(mid, im))?;
            values[k] = mid;
            values[k + 1] = mid;
            imag[k] = im;
            imag[k + 1] = -im;
            vectors.set_column(k, &v.map(|z| z.re));
            vectors.set_column(k + 1, &v.map(|z| z.im));
        }
        k += 2;
    }

    vectors
        .iter()
        .all(|v| v.is_finite())
        .then_some(PseudoEigen {
            values,
            imag,
            vectors,
        })
}

/// Right singular vector of the smallest singular value.
fn real_null_vector(a: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let svd = a.svd(false, true);
    let v_t = svd.v_t?;
    let k = svd.singular_values.imin();
    let v = v_t.row(k).transpose();
    let n = v.norm();
    (n > 0.0).then(|| v / n)
}

/// Complex eigenvector of `m` for `lambda`, scaled so its largest component
/// is real.
fn complex_null_vector(m: &Matrix3<f64>, lambda: Complex<f64>) -> Option<Vector3<Complex<f64>>> {
    let a = m.map(|v| Complex::new(v, 0.0)) - Matrix3::identity() * lambda;
    let svd = a.svd(false, true);
    let v_h = svd.v_t?;
    let k = svd.singular_values.imin();
    // Rows of Vᴴ are conjugated right singular vectors.
    let v: Vector3<Complex<f64>> = v_h.row(k).transpose().map(|z| z.conj());

    let pivot = v.iter().copied().max_by(|x, y| x.norm().total_cmp(&y.norm()))?;
    if pivot.norm() <= 0.0 {
        return None;
    }
    let phase = pivot.conj() / pivot.norm();
    Some(v.map(|z| z * phase))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_decomposes(m: &Matrix3<f64>, pe: &PseudoEigen) {
        let lhs = m * pe.vectors;
        let rhs = pe.vectors * pe.value_matrix();
        assert_relative_eq!(lhs, rhs, epsilon = 1e-6);
    }

    #[test]
    fn diagonal_matrix() {
        let m = Matrix3::from_diagonal(&Vector3::new(3.0, -1.0, 0.5));
        let pe = pseudo_eigen(&m).expect("decomposition");
        let mut vals: Vec<f64> = pe.values.iter().copied().collect();
        vals.sort_by(f64::total_cmp);
        assert_relative_eq!(vals.as_slice(), [-1.0, 0.5, 3.0].as_slice(), epsilon = 1e-12);
        assert!((0..3).all(|k| pe.is_real(k)));
        assert_decomposes(&m, &pe);
    }

    #[test]
    fn similar_to_diagonal_recovers_eigenvectors() {
        let p = Matrix3::new(1.0, 0.2, 5.0, -0.3, 1.1, 2.0, 0.001, 0.002, 1.0);
        let d = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, 0.36));
        let m = p * d * p.try_inverse().unwrap();
        let pe = pseudo_eigen(&m).expect("decomposition");
        assert_decomposes(&m, &pe);

        let odd = (0..3)
            .min_by(|&a, &b| pe.values[a].total_cmp(&pe.values[b]))
            .unwrap();
        assert_relative_eq!(pe.values[odd], 0.36, epsilon = 1e-9);
        let v = pe.vectors.column(odd);
        let expected = p.column(2);
        assert_relative_eq!(v[0] / v[2], expected[0] / expected[2], epsilon = 1e-6);
        assert_relative_eq!(v[1] / v[2], expected[1] / expected[2], epsilon = 1e-6);
    }

    #[test]
    fn rotation_block_gives_complex_pair() {
        let (s, c) = 0.7f64.sin_cos();
        let m = Matrix3::new(2.0 * c, -2.0 * s, 0.0, 2.0 * s, 2.0 * c, 0.0, 0.0, 0.0, 0.5);
        let pe = pseudo_eigen(&m).expect("decomposition");
        let complex: Vec<usize> = (0..3).filter(|&k| !pe.is_real(k)).collect();
        assert_eq!(complex.len(), 2);
        for &k in &complex {
            assert_relative_eq!(pe.values[k], 2.0 * c, epsilon = 1e-9);
        }
        assert_relative_eq!(pe.imag[complex[0]].abs(), 2.0 * s, epsilon = 1e-9);
        assert_decomposes(&m, &pe);
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let mut m = Matrix3::identity();
        m[(1, 2)] = f64::NAN;
        assert!(pseudo_eigen(&m).is_none());
    }
}
