//! Dense LU and QR backends.
//!
//! The pattern is expanded into a dense `nalgebra` matrix before
//! factorization, so these backends suit small systems and serve as the
//! reference the sparse backends are tested against.

use nalgebra::linalg::{LU, QR};
use nalgebra::{DMatrix, Dyn};
use sparsity_core::Sparsity;

use crate::backend::LinsolBackend;
use crate::error::{LinsolError, LinsolResult};
use crate::numeric;
use crate::settings::LinsolSettings;

/// Fail unless the smallest pivot is above `pivot_tol` relative to the
/// largest entry of the matrix.
fn check_pivots(pivots: impl Iterator<Item = f64>, matrix: &DMatrix<f64>, pivot_tol: f64) -> LinsolResult<()> {
    let scale = matrix.amax().max(1.0);
    let (mut index, mut min_pivot) = (0, f64::INFINITY);
    for (i, p) in pivots.enumerate() {
        // NaN pivots count as the smallest
        if !(p.abs() >= min_pivot) {
            index = i;
            min_pivot = p.abs();
        }
    }
    if !(min_pivot > pivot_tol * scale) {
        return Err(LinsolError::NumericallySingular(format!(
            "pivot {} is {:.3e} (tolerance {:.3e})",
            index,
            min_pivot,
            pivot_tol * scale
        )));
    }
    Ok(())
}

fn with_columns(x: &mut [f64], n: usize, nrhs: usize, f: impl FnOnce(&mut DMatrix<f64>) -> bool) -> LinsolResult<()> {
    if x.len() != n * nrhs {
        return Err(LinsolError::invalid(format!(
            "right-hand side holds {} values, expected {}x{}",
            x.len(),
            n,
            nrhs
        )));
    }
    let mut b = DMatrix::from_column_slice(n, nrhs, x);
    if !f(&mut b) {
        return Err(LinsolError::NumericallySingular("triangular solve failed".to_string()));
    }
    x.copy_from_slice(b.as_slice());
    Ok(())
}

fn expect_square(sparsity: &Sparsity) -> LinsolResult<usize> {
    if !sparsity.is_square() {
        return Err(LinsolError::DimensionMismatch {
            op: "symbolic_factorization",
            expected: (sparsity.nrow(), sparsity.nrow()),
            got: sparsity.shape(),
        });
    }
    Ok(sparsity.nrow())
}

/// Dense LU with partial pivoting.
pub struct DenseLu {
    n: usize,
    pivot_tol: f64,
    matrix: Option<DMatrix<f64>>,
    lu: Option<LU<f64, Dyn, Dyn>>,
    /// Factorization of Aᵀ, computed on the first transposed solve.
    lu_t: Option<LU<f64, Dyn, Dyn>>,
}

impl DenseLu {
    pub fn new(settings: &LinsolSettings) -> Self {
        Self {
            n: 0,
            pivot_tol: settings.pivot_tol,
            matrix: None,
            lu: None,
            lu_t: None,
        }
    }

    pub fn boxed(settings: &LinsolSettings) -> Box<dyn LinsolBackend> {
        Box::new(Self::new(settings))
    }
}

impl LinsolBackend for DenseLu {
    fn name(&self) -> &str {
        "lu"
    }

    fn symbolic_factorization(&mut self, sparsity: &Sparsity) -> LinsolResult<()> {
        self.n = expect_square(sparsity)?;
        self.matrix = None;
        self.lu = None;
        self.lu_t = None;
        Ok(())
    }

    fn numeric_factorization(&mut self, sparsity: &Sparsity, nonzeros: &[f64]) -> LinsolResult<()> {
        numeric::check_nonzeros(sparsity, nonzeros)?;
        let dense = numeric::to_dense(sparsity, nonzeros);
        let lu = dense.clone().lu();
        let u = lu.u();
        check_pivots(u.diagonal().iter().copied(), &dense, self.pivot_tol)?;
        self.lu = Some(lu);
        self.lu_t = None;
        self.matrix = Some(dense);
        Ok(())
    }

    fn solve(&mut self, x: &mut [f64], nrhs: usize, tr: bool) -> LinsolResult<()> {
        if tr && self.lu_t.is_none() {
            let matrix = self.matrix.as_ref().ok_or(LinsolError::NotFactorized)?;
            self.lu_t = Some(matrix.transpose().lu());
        }
        let lu = if tr { self.lu_t.as_ref() } else { self.lu.as_ref() }.ok_or(LinsolError::NotFactorized)?;
        with_columns(x, self.n, nrhs, |b| lu.solve_mut(b))
    }
}

/// Dense Householder QR.
pub struct DenseQr {
    n: usize,
    pivot_tol: f64,
    qr: Option<QR<f64, Dyn, Dyn>>,
}

impl DenseQr {
    pub fn new(settings: &LinsolSettings) -> Self {
        Self {
            n: 0,
            pivot_tol: settings.pivot_tol,
            qr: None,
        }
    }

    pub fn boxed(settings: &LinsolSettings) -> Box<dyn LinsolBackend> {
        Box::new(Self::new(settings))
    }
}

impl LinsolBackend for DenseQr {
    fn name(&self) -> &str {
        "qr"
    }

    fn symbolic_factorization(&mut self, sparsity: &Sparsity) -> LinsolResult<()> {
        self.n = expect_square(sparsity)?;
        self.qr = None;
        Ok(())
    }

    fn numeric_factorization(&mut self, sparsity: &Sparsity, nonzeros: &[f64]) -> LinsolResult<()> {
        numeric::check_nonzeros(sparsity, nonzeros)?;
        let dense = numeric::to_dense(sparsity, nonzeros);
        let qr = dense.clone().qr();
        let r = qr.r();
        check_pivots(r.diagonal().iter().copied(), &dense, self.pivot_tol)?;
        self.qr = Some(qr);
        Ok(())
    }

    fn solve(&mut self, x: &mut [f64], nrhs: usize, tr: bool) -> LinsolResult<()> {
        let qr = self.qr.as_ref().ok_or(LinsolError::NotFactorized)?;
        if !tr {
            return with_columns(x, self.n, nrhs, |b| qr.solve_mut(b));
        }
        // Aᵀ = Rᵀ Qᵀ: solve with Rᵀ, then multiply by Q
        let r = qr.r();
        let q = qr.q();
        with_columns(x, self.n, nrhs, |b| {
            if !r.tr_solve_upper_triangular_mut(b) {
                return false;
            }
            *b = &q * &*b;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Sparsity, Vec<f64>) {
        // [[4, 1, 0],
        //  [2, 5, 1],
        //  [0, 3, 6]]
        let sp = Sparsity::triplet(3, 3, &[0, 1, 0, 1, 2, 1, 2], &[0, 0, 1, 1, 1, 2, 2]).unwrap();
        (sp, vec![4.0, 2.0, 1.0, 5.0, 3.0, 1.0, 6.0])
    }

    fn residual(sp: &Sparsity, nz: &[f64], x: &[f64], b: &[f64], tr: bool) -> f64 {
        let mut ax = vec![0.0; 3];
        if tr {
            numeric::spmv_transpose(sp, nz, x, &mut ax, 1.0, 0.0);
        } else {
            numeric::spmv(sp, nz, x, &mut ax, 1.0, 0.0);
        }
        ax.iter().zip(b).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
    }

    fn check_backend(mut backend: Box<dyn LinsolBackend>) {
        let (sp, nz) = sample();
        backend.symbolic_factorization(&sp).unwrap();
        backend.numeric_factorization(&sp, &nz).unwrap();
        let b = [1.0, 2.0, 3.0];
        for tr in [false, true] {
            let mut x = b.to_vec();
            backend.solve(&mut x, 1, tr).unwrap();
            assert!(residual(&sp, &nz, &x, &b, tr) < 1e-12, "{} tr={}", backend.name(), tr);
        }
    }

    #[test]
    fn test_dense_lu_solves() {
        check_backend(DenseLu::boxed(&LinsolSettings::default()));
    }

    #[test]
    fn test_dense_qr_solves() {
        check_backend(DenseQr::boxed(&LinsolSettings::default()));
    }

    #[test]
    fn test_multiple_rhs() {
        let (sp, nz) = sample();
        let mut lu = DenseLu::new(&LinsolSettings::default());
        lu.symbolic_factorization(&sp).unwrap();
        lu.numeric_factorization(&sp, &nz).unwrap();
        let mut x = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        lu.solve(&mut x, 2, false).unwrap();
        let mut single = vec![0.0, 1.0, 0.0];
        lu.solve(&mut single, 1, false).unwrap();
        for (a, b) in x[3..].iter().zip(&single) {
            assert!((a - b).abs() < 1e-14);
        }
    }

    #[test]
    fn test_numerically_singular() {
        let sp = Sparsity::dense(2, 2);
        let nz = [1.0, 2.0, 2.0, 4.0];
        for mut backend in [DenseLu::boxed(&LinsolSettings::default()), DenseQr::boxed(&LinsolSettings::default())] {
            backend.symbolic_factorization(&sp).unwrap();
            let err = backend.numeric_factorization(&sp, &nz);
            assert!(matches!(err, Err(LinsolError::NumericallySingular(_))), "{}", backend.name());
        }
    }

    #[test]
    fn test_solve_before_factorize() {
        let mut lu = DenseLu::new(&LinsolSettings::default());
        lu.symbolic_factorization(&Sparsity::diag(2)).unwrap();
        let mut x = vec![1.0, 1.0];
        assert_eq!(lu.solve(&mut x, 1, false), Err(LinsolError::NotFactorized));
        assert_eq!(lu.solve(&mut x, 1, true), Err(LinsolError::NotFactorized));
    }
}
