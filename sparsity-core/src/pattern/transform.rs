//! Pattern-to-pattern transformations: transpose, set algebra, products,
//! permutations, slicing and reshaping.

use std::ops::{Add, Mul};

use super::Sparsity;
use crate::error::{SparsityError, SparsityResult};

/// Origin of a nonzero in the result of [`Sparsity::combine`].
pub const FROM_LHS: u8 = 1;
/// See [`FROM_LHS`].
pub const FROM_RHS: u8 = 2;

fn check_index_list(indices: &[usize], len: usize) -> SparsityResult<()> {
    match indices.iter().find(|&&i| i >= len) {
        Some(&i) => Err(SparsityError::OutOfRange {
            index: i as isize,
            len,
        }),
        None => Ok(()),
    }
}

fn check_permutation(p: &[usize], n: usize) -> SparsityResult<()> {
    if p.len() != n {
        return Err(SparsityError::invalid(format!(
            "permutation has length {}, expected {}",
            p.len(),
            n
        )));
    }
    let mut seen = vec![false; n];
    for &i in p {
        if i >= n || seen[i] {
            return Err(SparsityError::invalid("not a permutation"));
        }
        seen[i] = true;
    }
    Ok(())
}

impl Sparsity {
    /// Transposed pattern.
    pub fn t(&self) -> Sparsity {
        self.transpose_with_mapping(false).0
    }

    /// Transposed pattern together with a nonzero mapping.
    ///
    /// Without `invert_mapping`, `mapping[k]` is the nonzero of `self` stored
    /// at slot `k` of the transpose; with it, `mapping[k]` is the slot in the
    /// transpose of nonzero `k` of `self`.
    pub fn transpose_with_mapping(&self, invert_mapping: bool) -> (Sparsity, Vec<usize>) {
        let (nrow, ncol, nnz) = (self.nrow(), self.ncol(), self.nnz());
        let mut colind_t = vec![0usize; nrow + 1];
        for &r in self.row() {
            colind_t[r + 1] += 1;
        }
        for r in 0..nrow {
            colind_t[r + 1] += colind_t[r];
        }
        let mut next = colind_t[..nrow].to_vec();
        let mut row_t = vec![0usize; nnz];
        let mut mapping = vec![0usize; nnz];
        for c in 0..ncol {
            for k in self.colind()[c]..self.colind()[c + 1] {
                let r = self.row()[k];
                let el = next[r];
                next[r] += 1;
                row_t[el] = c;
                if invert_mapping {
                    mapping[k] = el;
                } else {
                    mapping[el] = k;
                }
            }
        }
        (Sparsity::from_parts(ncol, nrow, colind_t, row_t), mapping)
    }

    /// True if `self` is the transpose of `other`.
    pub fn is_transpose(&self, other: &Sparsity) -> bool {
        if self.nrow() != other.ncol() || self.ncol() != other.nrow() || self.nnz() != other.nnz() {
            return false;
        }
        self.is_equal(&other.t())
    }

    /// True if `other` has the same nonzeros after a column-major reshape.
    pub fn is_reshape(&self, other: &Sparsity) -> bool {
        self.numel() == other.numel() && self.nnz() == other.nnz() && self.find() == other.find()
    }

    /// Entrywise combination of two patterns of equal shape.
    ///
    /// Entries present in both operands are always kept. Entries present in
    /// only one operand are dropped when the corresponding flag says the
    /// combining function is zero there. Returns the pattern and, per result
    /// nonzero, a bit set of [`FROM_LHS`]/[`FROM_RHS`].
    pub fn combine(
        &self,
        other: &Sparsity,
        drop_lhs_only: bool,
        drop_rhs_only: bool,
    ) -> SparsityResult<(Sparsity, Vec<u8>)> {
        if self.shape() != other.shape() {
            return Err(SparsityError::mismatch("combine", self.shape(), other.shape()));
        }
        if Sparsity::ptr_eq(self, other) {
            return Ok((self.clone(), vec![FROM_LHS | FROM_RHS; self.nnz()]));
        }

        let mut colind = Vec::with_capacity(self.ncol() + 1);
        let mut row = Vec::with_capacity(self.nnz().max(other.nnz()));
        let mut origin = Vec::with_capacity(row.capacity());
        colind.push(0);
        for c in 0..self.ncol() {
            let (a, b) = (self.col_rows(c), other.col_rows(c));
            let (mut i, mut j) = (0, 0);
            while i < a.len() || j < b.len() {
                let ra = a.get(i).copied().unwrap_or(usize::MAX);
                let rb = b.get(j).copied().unwrap_or(usize::MAX);
                if ra == rb {
                    row.push(ra);
                    origin.push(FROM_LHS | FROM_RHS);
                    i += 1;
                    j += 1;
                } else if ra < rb {
                    if !drop_lhs_only {
                        row.push(ra);
                        origin.push(FROM_LHS);
                    }
                    i += 1;
                } else {
                    if !drop_rhs_only {
                        row.push(rb);
                        origin.push(FROM_RHS);
                    }
                    j += 1;
                }
            }
            colind.push(row.len());
        }
        Ok((Sparsity::from_parts(self.nrow(), self.ncol(), colind, row), origin))
    }

    /// Union of two patterns.
    pub fn unite(&self, other: &Sparsity) -> SparsityResult<Sparsity> {
        Ok(self.combine(other, false, false)?.0)
    }

    /// Intersection of two patterns.
    pub fn intersect(&self, other: &Sparsity) -> SparsityResult<Sparsity> {
        Ok(self.combine(other, true, true)?.0)
    }

    /// Keep the entries satisfying `keep(r, c)`, with the kept nonzero indices.
    fn filter_entries<F: Fn(usize, usize) -> bool>(&self, keep: F) -> (Sparsity, Vec<usize>) {
        let mut colind = Vec::with_capacity(self.ncol() + 1);
        let mut row = Vec::new();
        let mut mapping = Vec::new();
        colind.push(0);
        for c in 0..self.ncol() {
            for k in self.colind()[c]..self.colind()[c + 1] {
                let r = self.row()[k];
                if keep(r, c) {
                    row.push(r);
                    mapping.push(k);
                }
            }
            colind.push(row.len());
        }
        (Sparsity::from_parts(self.nrow(), self.ncol(), colind, row), mapping)
    }

    /// Upper triangular part.
    pub fn triu(&self, include_diagonal: bool) -> Sparsity {
        self.triu_with_mapping(include_diagonal).0
    }

    /// Upper triangular part and the original index of each kept nonzero.
    pub fn triu_with_mapping(&self, include_diagonal: bool) -> (Sparsity, Vec<usize>) {
        self.filter_entries(|r, c| r < c || (include_diagonal && r == c))
    }

    /// Lower triangular part.
    pub fn tril(&self, include_diagonal: bool) -> Sparsity {
        self.tril_with_mapping(include_diagonal).0
    }

    /// Lower triangular part and the original index of each kept nonzero.
    pub fn tril_with_mapping(&self, include_diagonal: bool) -> (Sparsity, Vec<usize>) {
        self.filter_entries(|r, c| r > c || (include_diagonal && r == c))
    }

    /// Change the shape, dropping entries that fall outside.
    pub fn resize(&self, nrow: usize, ncol: usize) -> Sparsity {
        if self.shape() == (nrow, ncol) {
            return self.clone();
        }
        let mut colind = Vec::with_capacity(ncol + 1);
        let mut row = Vec::new();
        colind.push(0);
        for c in 0..ncol {
            if c < self.ncol() {
                row.extend(self.col_rows(c).iter().copied().filter(|&r| r < nrow));
            }
            colind.push(row.len());
        }
        Sparsity::from_parts(nrow, ncol, colind, row)
    }

    /// Embed into a larger `nrow x ncol` pattern, moving row `i` to `rr[i]`
    /// and column `j` to `cc[j]`. Both lists must be strictly increasing.
    pub fn enlarge(&self, nrow: usize, ncol: usize, rr: &[usize], cc: &[usize]) -> SparsityResult<Sparsity> {
        if rr.len() != self.nrow() || cc.len() != self.ncol() {
            return Err(SparsityError::invalid(format!(
                "enlarge: index lists of length {}x{} for a {} pattern",
                rr.len(),
                cc.len(),
                self.dim(false)
            )));
        }
        check_index_list(rr, nrow)?;
        check_index_list(cc, ncol)?;
        if rr.windows(2).any(|w| w[0] >= w[1]) || cc.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SparsityError::invalid("enlarge: index lists must be strictly increasing"));
        }
        let mut colind = vec![0usize; ncol + 1];
        for c in 0..self.ncol() {
            colind[cc[c] + 1] = self.colind()[c + 1] - self.colind()[c];
        }
        for c in 0..ncol {
            colind[c + 1] += colind[c];
        }
        let row = self.row().iter().map(|&r| rr[r]).collect();
        Ok(Sparsity::from_parts(nrow, ncol, colind, row))
    }

    /// Remove every entry `(rr[i], cc[j])`; returns the indices of the kept nonzeros.
    pub fn erase(&self, rr: &[usize], cc: &[usize]) -> SparsityResult<(Sparsity, Vec<usize>)> {
        check_index_list(rr, self.nrow())?;
        check_index_list(cc, self.ncol())?;
        let mut row_hit = vec![false; self.nrow()];
        let mut col_hit = vec![false; self.ncol()];
        rr.iter().for_each(|&r| row_hit[r] = true);
        cc.iter().for_each(|&c| col_hit[c] = true);
        Ok(self.filter_entries(|r, c| !(row_hit[r] && col_hit[c])))
    }

    /// Submatrix `A(rr, cc)` with, per result nonzero, its index in `self`.
    ///
    /// Index lists may be unsorted and may repeat entries.
    pub fn sub(&self, rr: &[usize], cc: &[usize]) -> SparsityResult<(Sparsity, Vec<usize>)> {
        check_index_list(rr, self.nrow())?;
        check_index_list(cc, self.ncol())?;
        Ok(self.submatrix(rr, cc))
    }

    /// [`sub`](Self::sub) for index lists already known to be in range.
    pub(crate) fn submatrix(&self, rr: &[usize], cc: &[usize]) -> (Sparsity, Vec<usize>) {
        let mut targets: Vec<Vec<usize>> = vec![Vec::new(); self.nrow()];
        for (i, &r) in rr.iter().enumerate() {
            targets[r].push(i);
        }

        let mut colind = Vec::with_capacity(cc.len() + 1);
        let mut row = Vec::new();
        let mut mapping = Vec::new();
        let mut column: Vec<(usize, usize)> = Vec::new();
        colind.push(0);
        for &c in cc {
            column.clear();
            for k in self.colind()[c]..self.colind()[c + 1] {
                for &i in &targets[self.row()[k]] {
                    column.push((i, k));
                }
            }
            column.sort_unstable();
            for &(i, k) in &column {
                row.push(i);
                mapping.push(k);
            }
            colind.push(row.len());
        }
        (Sparsity::from_parts(rr.len(), cc.len(), colind, row), mapping)
    }

    /// Diagonal extraction or construction.
    ///
    /// A square pattern yields the column vector of its diagonal; a row or
    /// column vector yields the diagonal matrix it describes. The mapping
    /// gives the source nonzero of each result nonzero.
    pub fn get_diag(&self) -> SparsityResult<(Sparsity, Vec<usize>)> {
        if self.is_square() {
            let n = self.ncol();
            let mut row = Vec::new();
            let mut mapping = Vec::new();
            for c in 0..n {
                if let Ok(k) = self.col_rows(c).binary_search(&c) {
                    row.push(c);
                    mapping.push(self.colind()[c] + k);
                }
            }
            let colind = vec![0, row.len()];
            return Ok((Sparsity::from_parts(n, 1, colind, row), mapping));
        }
        if self.is_vector() {
            let n = self.numel();
            let lin = self.find();
            let (rows, cols): (Vec<usize>, Vec<usize>) = lin.iter().map(|&i| (i, i)).unzip();
            let sp = Sparsity::triplet(n, n, &rows, &cols)?;
            return Ok((sp, (0..lin.len()).collect()));
        }
        Err(SparsityError::invalid(format!(
            "get_diag needs a square or vector pattern, got {}",
            self.dim(false)
        )))
    }

    /// Column-major reshape.
    pub fn reshape(&self, nrow: usize, ncol: usize) -> SparsityResult<Sparsity> {
        if nrow * ncol != self.numel() {
            return Err(SparsityError::mismatch("reshape", self.shape(), (nrow, ncol)));
        }
        if self.shape() == (nrow, ncol) {
            return Ok(self.clone());
        }
        Sparsity::nonzeros(nrow, ncol, &self.find())
    }

    /// Tile `n` copies vertically and `m` horizontally.
    pub fn repmat(&self, n: usize, m: usize) -> SparsityResult<Sparsity> {
        let column = Sparsity::vertcat(&vec![self.clone(); n])?;
        Sparsity::horzcat(&vec![column; m])
    }

    /// Permute rows and/or columns: entry `(r, c)` moves to `(p[r], p[c])`,
    /// or through the inverse permutation when `invert` is set.
    pub fn pmult(&self, p: &[usize], permute_rows: bool, permute_cols: bool, invert: bool) -> SparsityResult<Sparsity> {
        if permute_rows {
            check_permutation(p, self.nrow())?;
        }
        if permute_cols {
            check_permutation(p, self.ncol())?;
        }
        let pp: Vec<usize> = if invert {
            let mut inv = vec![0usize; p.len()];
            for (k, &i) in p.iter().enumerate() {
                inv[i] = k;
            }
            inv
        } else {
            p.to_vec()
        };
        let (mut rows, mut cols) = self.get_triplet();
        if permute_rows {
            rows.iter_mut().for_each(|r| *r = pp[*r]);
        }
        if permute_cols {
            cols.iter_mut().for_each(|c| *c = pp[*c]);
        }
        Sparsity::triplet(self.nrow(), self.ncol(), &rows, &cols)
    }

    /// Complement: structural zeros become nonzeros and vice versa.
    pub fn pattern_inverse(&self) -> Sparsity {
        let mut colind = Vec::with_capacity(self.ncol() + 1);
        let mut row = Vec::with_capacity(self.numel() - self.nnz());
        colind.push(0);
        for c in 0..self.ncol() {
            let present = self.col_rows(c);
            let mut k = 0;
            for r in 0..self.nrow() {
                if k < present.len() && present[k] == r {
                    k += 1;
                } else {
                    row.push(r);
                }
            }
            colind.push(row.len());
        }
        Sparsity::from_parts(self.nrow(), self.ncol(), colind, row)
    }

    /// Dense pattern of the same shape, with the dense slot of each nonzero.
    pub fn make_dense(&self) -> (Sparsity, Vec<usize>) {
        (Sparsity::dense(self.nrow(), self.ncol()), self.find())
    }

    /// Append the rows of `other` below `self`.
    pub fn append(&self, other: &Sparsity) -> SparsityResult<Sparsity> {
        if other.is_empty_both() {
            return Ok(self.clone());
        }
        if self.is_empty_both() {
            return Ok(other.clone());
        }
        if self.ncol() != other.ncol() {
            return Err(SparsityError::mismatch("append", self.shape(), other.shape()));
        }
        Sparsity::vertcat(&[self.clone(), other.clone()])
    }

    /// Append the columns of `other` to the right of `self`.
    pub fn append_columns(&self, other: &Sparsity) -> SparsityResult<Sparsity> {
        if other.is_empty_both() {
            return Ok(self.clone());
        }
        if self.is_empty_both() {
            return Ok(other.clone());
        }
        if self.nrow() != other.nrow() {
            return Err(SparsityError::mismatch("append_columns", self.shape(), other.shape()));
        }
        Sparsity::horzcat(&[self.clone(), other.clone()])
    }

    /// Kronecker product pattern.
    pub fn kron(a: &Sparsity, b: &Sparsity) -> Sparsity {
        let (nrow, ncol) = (a.nrow() * b.nrow(), a.ncol() * b.ncol());
        if a.is_dense() && b.is_dense() {
            return Sparsity::dense(nrow, ncol);
        }
        let mut colind = Vec::with_capacity(ncol + 1);
        let mut row = Vec::with_capacity(a.nnz() * b.nnz());
        colind.push(0);
        for ja in 0..a.ncol() {
            for jb in 0..b.ncol() {
                for &ra in a.col_rows(ja) {
                    row.extend(b.col_rows(jb).iter().map(|&rb| ra * b.nrow() + rb));
                }
                colind.push(row.len());
            }
        }
        Sparsity::from_parts(nrow, ncol, colind, row)
    }

    /// Structural pattern of the product `x * y`.
    pub fn mtimes(x: &Sparsity, y: &Sparsity) -> SparsityResult<Sparsity> {
        if x.ncol() != y.nrow() {
            return Err(SparsityError::mismatch("mtimes", x.shape(), y.shape()));
        }
        if x.is_dense() && y.is_dense() {
            return Ok(Sparsity::dense(x.nrow(), y.ncol()));
        }
        let mut mark = vec![usize::MAX; x.nrow()];
        let mut colind = Vec::with_capacity(y.ncol() + 1);
        let mut row = Vec::new();
        colind.push(0);
        for j in 0..y.ncol() {
            let start = row.len();
            for &k in y.col_rows(j) {
                for &r in x.col_rows(k) {
                    if mark[r] != j {
                        mark[r] = j;
                        row.push(r);
                    }
                }
            }
            row[start..].sort_unstable();
            colind.push(row.len());
        }
        Ok(Sparsity::from_parts(x.nrow(), y.ncol(), colind, row))
    }
}

impl Add for &Sparsity {
    type Output = SparsityResult<Sparsity>;

    fn add(self, rhs: &Sparsity) -> Self::Output {
        self.unite(rhs)
    }
}

impl Mul for &Sparsity {
    type Output = SparsityResult<Sparsity>;

    fn mul(self, rhs: &Sparsity) -> Self::Output {
        self.intersect(rhs)
    }
}
