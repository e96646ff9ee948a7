//! Numeric helpers over a pattern plus its nonzero values.
//!
//! A matrix here is a [`Sparsity`] together with a slice holding one value
//! per structural nonzero, in the pattern's column-major order.

use nalgebra::DMatrix;
use sparsity_core::Sparsity;
use sprs::CsMat;

use crate::error::{LinsolError, LinsolResult};

/// Check that `nonzeros` has one value per nonzero of `sp`.
pub fn check_nonzeros(sp: &Sparsity, nonzeros: &[f64]) -> LinsolResult<()> {
    if nonzeros.len() != sp.nnz() {
        return Err(LinsolError::invalid(format!(
            "{} values for a pattern with {} nonzeros",
            nonzeros.len(),
            sp.nnz()
        )));
    }
    Ok(())
}

/// Sparse matrix in CSC format assembled from a pattern and its values.
pub fn to_csmat(sp: &Sparsity, nonzeros: &[f64]) -> LinsolResult<CsMat<f64>> {
    check_nonzeros(sp, nonzeros)?;
    CsMat::try_new_csc(
        sp.shape(),
        sp.colind().to_vec(),
        sp.row().to_vec(),
        nonzeros.to_vec(),
    )
    .map_err(|(_, _, _, e)| LinsolError::invalid(format!("CSC assembly failed: {:?}", e)))
}

/// Dense copy of a sparse matrix.
pub fn to_dense(sp: &Sparsity, nonzeros: &[f64]) -> DMatrix<f64> {
    let mut dense = DMatrix::zeros(sp.nrow(), sp.ncol());
    for c in 0..sp.ncol() {
        for k in sp.colind()[c]..sp.colind()[c + 1] {
            dense[(sp.row()[k], c)] = nonzeros[k];
        }
    }
    dense
}

/// Sparse matrix-vector product: y = alpha * A * x + beta * y
pub fn spmv(sp: &Sparsity, nonzeros: &[f64], x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    debug_assert_eq!(sp.ncol(), x.len());
    debug_assert_eq!(sp.nrow(), y.len());

    scale(y, beta);
    if alpha != 0.0 {
        for c in 0..sp.ncol() {
            let xc = alpha * x[c];
            for k in sp.colind()[c]..sp.colind()[c + 1] {
                y[sp.row()[k]] += nonzeros[k] * xc;
            }
        }
    }
}

/// Transpose-vector product: y = alpha * A^T * x + beta * y
pub fn spmv_transpose(sp: &Sparsity, nonzeros: &[f64], x: &[f64], y: &mut [f64], alpha: f64, beta: f64) {
    debug_assert_eq!(sp.nrow(), x.len());
    debug_assert_eq!(sp.ncol(), y.len());

    scale(y, beta);
    if alpha != 0.0 {
        for c in 0..sp.ncol() {
            let mut acc = 0.0;
            for k in sp.colind()[c]..sp.colind()[c + 1] {
                acc += nonzeros[k] * x[sp.row()[k]];
            }
            y[c] += alpha * acc;
        }
    }
}

fn scale(y: &mut [f64], beta: f64) {
    if beta == 0.0 {
        y.fill(0.0);
    } else if beta != 1.0 {
        for yi in y.iter_mut() {
            *yi *= beta;
        }
    }
}

/// Accumulate `alpha * U * Vᵀ` onto the nonzeros of `sp` only.
///
/// `u` is `sp.nrow() x m` and `v` is `sp.ncol() x m`, both column major.
pub fn add_outer_on_pattern(sp: &Sparsity, u: &[f64], v: &[f64], m: usize, alpha: f64, out: &mut [f64]) {
    let (nrow, ncol) = sp.shape();
    debug_assert_eq!(u.len(), nrow * m);
    debug_assert_eq!(v.len(), ncol * m);
    for c in 0..ncol {
        for k in sp.colind()[c]..sp.colind()[c + 1] {
            let r = sp.row()[k];
            let dot: f64 = (0..m).map(|j| u[r + nrow * j] * v[c + ncol * j]).sum();
            out[k] += alpha * dot;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Sparsity, Vec<f64>) {
        // [[1, 0, 2],
        //  [0, 3, 0]]
        let sp = Sparsity::triplet(2, 3, &[0, 1, 0], &[0, 1, 2]).unwrap();
        (sp, vec![1.0, 3.0, 2.0])
    }

    #[test]
    fn test_spmv() {
        let (sp, nz) = sample();
        let mut y = vec![1.0, 1.0];
        spmv(&sp, &nz, &[1.0, 2.0, 3.0], &mut y, 1.0, 2.0);
        assert_eq!(y, vec![9.0, 8.0]);
    }

    #[test]
    fn test_spmv_transpose() {
        let (sp, nz) = sample();
        let mut y = vec![0.0; 3];
        spmv_transpose(&sp, &nz, &[1.0, 2.0], &mut y, 1.0, 0.0);
        assert_eq!(y, vec![1.0, 6.0, 2.0]);
    }

    #[test]
    fn test_to_dense_and_csmat_agree() {
        let (sp, nz) = sample();
        let dense = to_dense(&sp, &nz);
        let csc = to_csmat(&sp, &nz).unwrap();
        assert_eq!(csc.nnz(), 3);
        for (&v, (r, c)) in csc.iter() {
            assert_eq!(dense[(r, c)], v);
        }
        assert_eq!(Sparsity::from_csmat(&csc).unwrap(), sp);
        assert!(to_csmat(&sp, &[1.0]).is_err());
    }

    #[test]
    fn test_add_outer_on_pattern() {
        let (sp, _) = sample();
        let mut out = vec![0.0; 3];
        // u = [1, 2]ᵀ, v = [3, 4, 5]ᵀ; only (0,0), (1,1), (0,2) are kept
        add_outer_on_pattern(&sp, &[1.0, 2.0], &[3.0, 4.0, 5.0], 1, -1.0, &mut out);
        assert_eq!(out, vec![-3.0, -8.0, -5.0]);
    }
}
