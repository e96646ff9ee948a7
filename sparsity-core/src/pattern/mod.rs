//! Immutable compressed-column sparsity patterns.
//!
//! A [`Sparsity`] describes where the structural nonzeros of an
//! `nrow x ncol` matrix are, without any numeric values. Column `c` owns the
//! entries `colind[c]..colind[c+1]` of `row`, sorted strictly ascending.
//!
//! Patterns are shared handles to interned data: cloning is cheap and two
//! patterns built from the same index arrays are the same instance. Nothing
//! is ever modified in place; operations that "change" a pattern return a new
//! handle and the caller rebinds.

mod concat;
mod construct;
mod transform;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::cache;
use crate::error::{SparsityError, SparsityResult};

pub use construct::SparsityInfo;
pub use transform::{FROM_LHS, FROM_RHS};

/// Interned pattern storage.
pub(crate) struct PatternData {
    pub(crate) nrow: usize,
    pub(crate) ncol: usize,
    pub(crate) colind: Vec<usize>,
    pub(crate) row: Vec<usize>,
    pub(crate) hash: u64,
}

impl PatternData {
    pub(crate) fn same_structure(&self, other: &PatternData) -> bool {
        self.nrow == other.nrow
            && self.ncol == other.ncol
            && self.colind == other.colind
            && self.row == other.row
    }
}

/// Shared handle to a canonical compressed-column sparsity pattern.
#[derive(Clone)]
pub struct Sparsity(Arc<PatternData>);

impl Sparsity {
    pub(crate) fn from_arc(inner: Arc<PatternData>) -> Self {
        Sparsity(inner)
    }

    /// Build from arrays the caller guarantees to be canonical.
    ///
    /// Invariants are checked in debug builds only.
    pub(crate) fn from_parts(nrow: usize, ncol: usize, colind: Vec<usize>, row: Vec<usize>) -> Self {
        debug_assert_eq!(colind.len(), ncol + 1);
        debug_assert_eq!(colind[0], 0);
        debug_assert_eq!(colind[ncol], row.len());
        debug_assert!(colind.windows(2).all(|w| w[0] <= w[1]));
        debug_assert!((0..ncol).all(|c| {
            let col = &row[colind[c]..colind[c + 1]];
            col.windows(2).all(|w| w[0] < w[1]) && col.iter().all(|&r| r < nrow)
        }));

        if nrow == 0 && ncol == 0 {
            return Self::empty();
        }
        if nrow == 1 && ncol == 1 {
            return Self::scalar(!row.is_empty());
        }
        let hash = cache::hash_pattern(nrow, ncol, &colind, &row);
        cache::intern(PatternData {
            nrow,
            ncol,
            colind,
            row,
            hash,
        })
    }

    /// True if both handles point at the same interned instance.
    pub fn ptr_eq(a: &Sparsity, b: &Sparsity) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    /// Number of rows.
    pub fn nrow(&self) -> usize {
        self.0.nrow
    }

    /// Number of columns.
    pub fn ncol(&self) -> usize {
        self.0.ncol
    }

    /// Alias of [`nrow`](Self::nrow).
    pub fn size1(&self) -> usize {
        self.0.nrow
    }

    /// Alias of [`ncol`](Self::ncol).
    pub fn size2(&self) -> usize {
        self.0.ncol
    }

    /// (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.0.nrow, self.0.ncol)
    }

    /// Number of elements, structural zeros included.
    pub fn numel(&self) -> usize {
        self.0.nrow * self.0.ncol
    }

    /// Number of structural nonzeros.
    pub fn nnz(&self) -> usize {
        self.0.row.len()
    }

    /// Fraction of elements that are structurally nonzero.
    pub fn density(&self) -> f64 {
        let numel = self.numel();
        if numel == 0 {
            0.0
        } else {
            self.nnz() as f64 / numel as f64
        }
    }

    /// Column offsets, length `ncol + 1`.
    pub fn colind(&self) -> &[usize] {
        &self.0.colind
    }

    /// Row index of every nonzero.
    pub fn row(&self) -> &[usize] {
        &self.0.row
    }

    /// Row indices of column `c`.
    pub fn col_rows(&self, c: usize) -> &[usize] {
        &self.0.row[self.0.colind[c]..self.0.colind[c + 1]]
    }

    /// Structural hash used for interning.
    pub fn hash_value(&self) -> u64 {
        self.0.hash
    }

    pub fn is_dense(&self) -> bool {
        self.nnz() == self.numel()
    }

    /// True if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.0.nrow == 0 || self.0.ncol == 0
    }

    /// True for a 0x0 pattern.
    pub fn is_empty_both(&self) -> bool {
        self.0.nrow == 0 && self.0.ncol == 0
    }

    /// 1x1, optionally requiring the single entry to be present.
    pub fn is_scalar(&self, require_dense: bool) -> bool {
        self.0.nrow == 1 && self.0.ncol == 1 && (!require_dense || self.nnz() == 1)
    }

    pub fn is_square(&self) -> bool {
        self.0.nrow == self.0.ncol
    }

    pub fn is_row(&self) -> bool {
        self.0.nrow == 1
    }

    pub fn is_column(&self) -> bool {
        self.0.ncol == 1
    }

    pub fn is_vector(&self) -> bool {
        self.is_row() || self.is_column()
    }

    /// Every nonzero lies on the main diagonal (of a square pattern).
    pub fn is_diag(&self) -> bool {
        if !self.is_square() {
            return false;
        }
        (0..self.ncol()).all(|c| self.col_rows(c).iter().all(|&r| r == c))
    }

    /// No nonzero below the diagonal.
    pub fn is_triu(&self) -> bool {
        (0..self.ncol()).all(|c| self.col_rows(c).last().map_or(true, |&r| r <= c))
    }

    /// No nonzero above the diagonal.
    pub fn is_tril(&self) -> bool {
        (0..self.ncol()).all(|c| self.col_rows(c).first().map_or(true, |&r| r >= c))
    }

    /// Square and equal to its own transpose.
    pub fn is_symmetric(&self) -> bool {
        self.is_square() && self.is_transpose(self)
    }

    /// Value equality; interned patterns make this a pointer check in practice.
    pub fn is_equal(&self, other: &Sparsity) -> bool {
        Sparsity::ptr_eq(self, other) || self.0.same_structure(&other.0)
    }

    /// Number of nonzeros strictly (or non-strictly) above the diagonal.
    pub fn nnz_upper(&self, strictly: bool) -> usize {
        (0..self.ncol())
            .map(|c| {
                self.col_rows(c)
                    .iter()
                    .filter(|&&r| r < c || (!strictly && r == c))
                    .count()
            })
            .sum()
    }

    /// Number of nonzeros strictly (or non-strictly) below the diagonal.
    pub fn nnz_lower(&self, strictly: bool) -> usize {
        (0..self.ncol())
            .map(|c| {
                self.col_rows(c)
                    .iter()
                    .filter(|&&r| r > c || (!strictly && r == c))
                    .count()
            })
            .sum()
    }

    /// Number of nonzeros on the diagonal.
    pub fn nnz_diag(&self) -> usize {
        (0..self.ncol().min(self.nrow()))
            .filter(|&c| self.col_rows(c).binary_search(&c).is_ok())
            .count()
    }

    /// Upper half-bandwidth: largest `c - r` over nonzeros above the diagonal.
    pub fn bw_upper(&self) -> usize {
        (0..self.ncol())
            .filter_map(|c| self.col_rows(c).first().map(|&r| c.saturating_sub(r)))
            .max()
            .unwrap_or(0)
    }

    /// Lower half-bandwidth: largest `r - c` over nonzeros below the diagonal.
    pub fn bw_lower(&self) -> usize {
        (0..self.ncol())
            .filter_map(|c| self.col_rows(c).last().map(|&r| r.saturating_sub(c)))
            .max()
            .unwrap_or(0)
    }

    /// Column index of every nonzero.
    pub fn get_col(&self) -> Vec<usize> {
        let mut col = Vec::with_capacity(self.nnz());
        for c in 0..self.ncol() {
            let len = self.colind()[c + 1] - self.colind()[c];
            col.extend(std::iter::repeat(c).take(len));
        }
        col
    }

    /// Row and column index of every nonzero, in storage order.
    pub fn get_triplet(&self) -> (Vec<usize>, Vec<usize>) {
        (self.row().to_vec(), self.get_col())
    }

    /// Column-major linear index `r + c*nrow` of every nonzero.
    pub fn find(&self) -> Vec<usize> {
        let nrow = self.nrow();
        let mut out = Vec::with_capacity(self.nnz());
        for c in 0..self.ncol() {
            out.extend(self.col_rows(c).iter().map(|&r| r + c * nrow));
        }
        out
    }

    /// Row index of every nonzero.
    pub fn get_row(&self) -> Vec<usize> {
        self.row().to_vec()
    }

    /// Column offsets.
    pub fn get_colind(&self) -> Vec<usize> {
        self.colind().to_vec()
    }

    /// Storage indices of the nonzeros on or below the diagonal.
    pub fn get_lower(&self) -> Vec<usize> {
        self.nz_where(|r, c| r >= c)
    }

    /// Storage indices of the nonzeros on or above the diagonal.
    pub fn get_upper(&self) -> Vec<usize> {
        self.nz_where(|r, c| r <= c)
    }

    fn nz_where<F: Fn(usize, usize) -> bool>(&self, pred: F) -> Vec<usize> {
        let mut out = Vec::new();
        for c in 0..self.ncol() {
            for k in self.colind()[c]..self.colind()[c + 1] {
                if pred(self.row()[k], c) {
                    out.push(k);
                }
            }
        }
        out
    }

    /// True if `self` is `n` copies of `block` placed side by side.
    pub fn is_stacked(&self, block: &Sparsity, n: usize) -> bool {
        if self.nrow() != block.nrow() || self.ncol() != block.ncol() * n {
            return false;
        }
        if self.nnz() != block.nnz() * n {
            return false;
        }
        (0..n).all(|k| {
            (0..block.ncol()).all(|c| self.col_rows(k * block.ncol() + c) == block.col_rows(c))
        })
    }

    /// Compressed-row view as `(rowind, col)`: the pattern of the transpose.
    pub fn get_crs(&self) -> (Vec<usize>, Vec<usize>) {
        let t = self.t();
        (t.colind().to_vec(), t.row().to_vec())
    }

    fn wrap_index(index: isize, len: usize) -> SparsityResult<usize> {
        let wrapped = if index < 0 {
            index + len as isize
        } else {
            index
        };
        if wrapped < 0 || wrapped as usize >= len {
            return Err(SparsityError::OutOfRange { index, len });
        }
        Ok(wrapped as usize)
    }

    /// Storage index of entry `(r, c)` if it is a structural nonzero.
    ///
    /// Negative indices count from the end.
    pub fn get_nz(&self, r: isize, c: isize) -> SparsityResult<Option<usize>> {
        let r = Self::wrap_index(r, self.nrow())?;
        let c = Self::wrap_index(c, self.ncol())?;
        let start = self.colind()[c];
        Ok(self.col_rows(c).binary_search(&r).ok().map(|k| start + k))
    }

    /// True if `(r, c)` is a structural nonzero.
    pub fn has_nz(&self, r: isize, c: isize) -> SparsityResult<bool> {
        Ok(self.get_nz(r, c)?.is_some())
    }

    /// Storage indices for a list of column-major linear indices.
    pub fn get_nz_linear(&self, indices: &[usize]) -> SparsityResult<Vec<Option<usize>>> {
        let nrow = self.nrow();
        indices
            .iter()
            .map(|&k| {
                if k >= self.numel() {
                    return Err(SparsityError::OutOfRange {
                        index: k as isize,
                        len: self.numel(),
                    });
                }
                let (r, c) = (k % nrow, k / nrow);
                let start = self.colind()[c];
                Ok(self.col_rows(c).binary_search(&r).ok().map(|p| start + p))
            })
            .collect()
    }

    /// Make `(r, c)` a structural nonzero.
    ///
    /// Returns the pattern with the entry present (the same instance if it
    /// already was) and the storage index of the entry in that pattern.
    pub fn add_nz(&self, r: isize, c: isize) -> SparsityResult<(Sparsity, usize)> {
        let ri = Self::wrap_index(r, self.nrow())?;
        let ci = Self::wrap_index(c, self.ncol())?;
        let start = self.colind()[ci];
        let pos = match self.col_rows(ci).binary_search(&ri) {
            Ok(k) => return Ok((self.clone(), start + k)),
            Err(k) => start + k,
        };

        let mut row = Vec::with_capacity(self.nnz() + 1);
        row.extend_from_slice(&self.row()[..pos]);
        row.push(ri);
        row.extend_from_slice(&self.row()[pos..]);
        let mut colind = self.colind().to_vec();
        for v in colind.iter_mut().skip(ci + 1) {
            *v += 1;
        }
        Ok((Sparsity::from_parts(self.nrow(), self.ncol(), colind, row), pos))
    }

    /// `"3x4"`, or `"3x4,5nz"` when `with_nz` is set and the pattern is not dense.
    pub fn dim(&self, with_nz: bool) -> String {
        let mut s = format!("{}x{}", self.nrow(), self.ncol());
        if with_nz && !self.is_dense() {
            s.push_str(&format!(",{}nz", self.nnz()));
        }
        s
    }

    /// Text picture of the pattern: `*` for nonzeros, `.` otherwise.
    pub fn spy(&self) -> String {
        let mut grid = vec![vec!['.'; self.ncol()]; self.nrow()];
        for c in 0..self.ncol() {
            for &r in self.col_rows(c) {
                grid[r][c] = '*';
            }
        }
        let mut out = String::with_capacity(self.nrow() * (self.ncol() + 1));
        for line in grid {
            out.extend(line);
            out.push('\n');
        }
        out
    }
}

impl PartialEq for Sparsity {
    fn eq(&self, other: &Self) -> bool {
        self.is_equal(other)
    }
}

impl Eq for Sparsity {}

impl Hash for Sparsity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.0.hash);
    }
}

impl fmt::Debug for Sparsity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sparsity")
            .field("nrow", &self.nrow())
            .field("ncol", &self.ncol())
            .field("colind", &self.colind())
            .field("row", &self.row())
            .finish()
    }
}

impl fmt::Display for Sparsity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dim(true))
    }
}

impl Default for Sparsity {
    fn default() -> Self {
        Sparsity::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag(n: usize) -> Sparsity {
        Sparsity::banded(n, 1)
    }

    #[test]
    fn test_queries() {
        let sp = Sparsity::dense(3, 4);
        assert_eq!(sp.nnz(), 12);
        assert!(sp.is_dense());
        assert!(!sp.is_square());
        assert!((sp.density() - 1.0).abs() < 1e-12);
        assert_eq!(sp.dim(true), "3x4");

        let d = Sparsity::diag(3);
        assert!(d.is_diag());
        assert!(d.is_triu() && d.is_tril() && d.is_symmetric());
        assert_eq!(d.dim(true), "3x3,3nz");
    }

    #[test]
    fn test_get_nz_negative_indices() {
        let sp = tridiag(4);
        assert_eq!(sp.get_nz(0, 0).unwrap(), Some(0));
        assert_eq!(sp.get_nz(-1, -1).unwrap(), sp.get_nz(3, 3).unwrap());
        assert_eq!(sp.get_nz(0, 3).unwrap(), None);
        assert!(matches!(
            sp.get_nz(4, 0),
            Err(SparsityError::OutOfRange { index: 4, len: 4 })
        ));
        assert!(sp.get_nz(-5, 0).is_err());
        assert!(sp.has_nz(1, 2).unwrap());
        assert!(!sp.has_nz(0, 2).unwrap());
    }

    #[test]
    fn test_add_nz() {
        let sp = Sparsity::diag(3);
        let (sp2, k) = sp.add_nz(0, 2).unwrap();
        assert_eq!(sp2.nnz(), 4);
        assert_eq!(k, 2);
        assert_eq!(sp2.get_nz(0, 2).unwrap(), Some(2));
        assert_eq!(sp.nnz(), 3);

        let (same, k) = sp2.add_nz(1, 1).unwrap();
        assert!(Sparsity::ptr_eq(&same, &sp2));
        assert_eq!(k, 1);
    }

    #[test]
    fn test_bandwidth_and_counts() {
        let sp = tridiag(5);
        assert_eq!(sp.bw_upper(), 1);
        assert_eq!(sp.bw_lower(), 1);
        assert_eq!(sp.nnz_diag(), 5);
        assert_eq!(sp.nnz_upper(true), 4);
        assert_eq!(sp.nnz_lower(false), 9);
    }

    #[test]
    fn test_find_and_spy() {
        let sp = Sparsity::triplet(2, 2, &[0, 1], &[0, 1]).unwrap();
        assert_eq!(sp.find(), vec![0, 3]);
        assert_eq!(sp.spy(), "*.\n.*\n");
        assert_eq!(sp.get_nz_linear(&[0, 1, 3]).unwrap(), vec![Some(0), None, Some(1)]);
    }

    #[test]
    fn test_singletons() {
        assert!(Sparsity::ptr_eq(&Sparsity::dense(0, 0), &Sparsity::empty()));
        assert!(Sparsity::ptr_eq(&Sparsity::dense(1, 1), &Sparsity::scalar(true)));
        let sparse_scalar = Sparsity::new(1, 1, vec![0, 0], vec![]).unwrap();
        assert!(Sparsity::ptr_eq(&sparse_scalar, &Sparsity::scalar(false)));
    }

    #[test]
    fn test_triangle_nonzero_lists() {
        let sp = tridiag(3);
        assert_eq!(sp.get_lower(), vec![0, 1, 3, 4, 6]);
        assert_eq!(sp.get_upper(), vec![0, 2, 3, 5, 6]);
        assert_eq!(sp.get_colind(), vec![0, 2, 5, 7]);
        assert_eq!(sp.get_row(), vec![0, 1, 0, 1, 2, 1, 2]);
    }

    #[test]
    fn test_is_stacked() {
        let d = Sparsity::diag(2);
        let dd = Sparsity::horzcat(&[d.clone(), d.clone()]).unwrap();
        assert!(dd.is_stacked(&d, 2));
        assert!(!dd.is_stacked(&Sparsity::dense(2, 2), 2));
        assert!(!dd.is_stacked(&d, 1));
    }
}
