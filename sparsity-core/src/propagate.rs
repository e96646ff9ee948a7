//! Bit-vector dependency propagation through sparse products.
//!
//! Each nonzero carries a [`Bvec`] whose bits name the inputs it may depend
//! on. Propagation ORs bits along the structural paths of an operation; no
//! numeric values are involved.

use crate::error::{SparsityError, SparsityResult};
use crate::pattern::Sparsity;

/// Dependency bits of one nonzero: 64 independent seeds per sweep.
pub type Bvec = u64;

fn check_len(what: &str, got: usize, expected: usize) -> SparsityResult<()> {
    if got != expected {
        return Err(SparsityError::invalid(format!(
            "{}: {} values for {} nonzeros",
            what, got, expected
        )));
    }
    Ok(())
}

fn check_product(op: &'static str, x_sp: &Sparsity, y_sp: &Sparsity, z_sp: &Sparsity) -> SparsityResult<()> {
    if x_sp.ncol() != y_sp.nrow() {
        return Err(SparsityError::mismatch(op, x_sp.shape(), y_sp.shape()));
    }
    if z_sp.shape() != (x_sp.nrow(), y_sp.ncol()) {
        return Err(SparsityError::mismatch(op, z_sp.shape(), (x_sp.nrow(), y_sp.ncol())));
    }
    Ok(())
}

/// Number of nonzeros of the product `x * a`, without forming it.
pub fn norm_0_mul(x: &Sparsity, a: &Sparsity) -> SparsityResult<usize> {
    if x.ncol() != a.nrow() {
        return Err(SparsityError::mismatch("norm_0_mul", x.shape(), a.shape()));
    }
    // mask[r] == c marks row r as already counted in output column c
    let mut mask = vec![usize::MAX; x.nrow()];
    let mut nnz = 0;
    for c in 0..a.ncol() {
        for &k in a.col_rows(c) {
            for &r in x.col_rows(k) {
                if mask[r] != c {
                    mask[r] = c;
                    nnz += 1;
                }
            }
        }
    }
    Ok(nnz)
}

/// Forward propagation through `z += x * y`: every nonzero of `z` picks up
/// the bits of the entries of `x` and `y` it is computed from.
///
/// `w` is scratch space with at least `z_sp.nrow()` entries.
pub fn mul_sparsity_fwd(
    x: &[Bvec],
    x_sp: &Sparsity,
    y: &[Bvec],
    y_sp: &Sparsity,
    z: &mut [Bvec],
    z_sp: &Sparsity,
    w: &mut [Bvec],
) -> SparsityResult<()> {
    check_product("mul_sparsity_fwd", x_sp, y_sp, z_sp)?;
    check_len("x", x.len(), x_sp.nnz())?;
    check_len("y", y.len(), y_sp.nnz())?;
    check_len("z", z.len(), z_sp.nnz())?;
    if w.len() < z_sp.nrow() {
        return Err(SparsityError::invalid("mul_sparsity_fwd: work buffer too small"));
    }

    for cc in 0..z_sp.ncol() {
        let zk = z_sp.colind()[cc]..z_sp.colind()[cc + 1];
        for k in zk.clone() {
            w[z_sp.row()[k]] = z[k];
        }
        for k in y_sp.colind()[cc]..y_sp.colind()[cc + 1] {
            let rr = y_sp.row()[k];
            let yy = y[k];
            for k1 in x_sp.colind()[rr]..x_sp.colind()[rr + 1] {
                w[x_sp.row()[k1]] |= x[k1] | yy;
            }
        }
        for k in zk {
            z[k] = w[z_sp.row()[k]];
        }
    }
    Ok(())
}

/// Reverse propagation through `z += x * y`: the bits of `z` are pushed back
/// onto the entries of `x` and `y` that feed them, and `z` is cleared.
pub fn mul_sparsity_rev(
    x: &mut [Bvec],
    x_sp: &Sparsity,
    y: &mut [Bvec],
    y_sp: &Sparsity,
    z: &mut [Bvec],
    z_sp: &Sparsity,
    w: &mut [Bvec],
) -> SparsityResult<()> {
    check_product("mul_sparsity_rev", x_sp, y_sp, z_sp)?;
    check_len("x", x.len(), x_sp.nnz())?;
    check_len("y", y.len(), y_sp.nnz())?;
    check_len("z", z.len(), z_sp.nnz())?;
    if w.len() < z_sp.nrow() {
        return Err(SparsityError::invalid("mul_sparsity_rev: work buffer too small"));
    }

    for cc in 0..z_sp.ncol() {
        w[..z_sp.nrow()].fill(0);
        for k in z_sp.colind()[cc]..z_sp.colind()[cc + 1] {
            w[z_sp.row()[k]] = z[k];
            z[k] = 0;
        }
        for k in y_sp.colind()[cc]..y_sp.colind()[cc + 1] {
            let rr = y_sp.row()[k];
            let mut yy = 0;
            for k1 in x_sp.colind()[rr]..x_sp.colind()[rr + 1] {
                let seed = w[x_sp.row()[k1]];
                x[k1] |= seed;
                yy |= seed;
            }
            y[k] |= yy;
        }
    }
    Ok(())
}
