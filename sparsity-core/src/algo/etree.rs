//! Elimination trees and symbolic factorizations.
//!
//! Parents are `Option<usize>`: `None` marks a root. Work arrays inside the
//! kernels use [`NONE`] as the unset marker so they stay flat `usize` vectors.

use super::NONE;
use crate::error::{SparsityError, SparsityResult};
use crate::pattern::Sparsity;

/// Elimination tree of `sp` (`ata = false`, symmetric use of the upper
/// triangle) or of `spᵀ·sp` (`ata = true`) without forming the product.
pub fn elimination_tree(sp: &Sparsity, ata: bool) -> Vec<Option<usize>> {
    let (m, n) = sp.shape();
    let mut parent = vec![None; n];
    let mut ancestor: Vec<Option<usize>> = vec![None; n];
    // Most recent column seen in each row (ata only)
    let mut prev: Vec<Option<usize>> = vec![None; if ata { m } else { 0 }];

    for k in 0..n {
        for &r in sp.col_rows(k) {
            let mut i = if ata { prev[r] } else { Some(r) };
            while let Some(node) = i {
                if node >= k {
                    break;
                }
                let next = ancestor[node];
                ancestor[node] = Some(k);
                if next.is_none() {
                    parent[node] = Some(k);
                }
                i = next;
            }
            if ata {
                prev[r] = Some(k);
            }
        }
    }
    parent
}

/// Postorder of a forest given by parent pointers. Children are visited in
/// ascending order.
pub fn postorder(parent: &[Option<usize>]) -> Vec<usize> {
    let n = parent.len();
    let mut head = vec![NONE; n];
    let mut next = vec![NONE; n];
    for j in (0..n).rev() {
        if let Some(p) = parent[j] {
            next[j] = head[p];
            head[p] = j;
        }
    }

    let mut post = Vec::with_capacity(n);
    let mut stack = Vec::with_capacity(n);
    for root in 0..n {
        if parent[root].is_some() {
            continue;
        }
        stack.push(root);
        while let Some(&p) = stack.last() {
            let child = head[p];
            if child == NONE {
                stack.pop();
                post.push(p);
            } else {
                head[p] = next[child];
                stack.push(child);
            }
        }
    }
    post
}

/// Whether `j` is a leaf of the row subtree of `i`, and if so the least
/// common ancestor with the previous leaf.
///
/// Returns `(q, jleaf)` where `jleaf` is 0 (not a leaf), 1 (first leaf) or
/// 2 (subsequent leaf, `q` is the LCA).
fn leaf(
    i: usize,
    j: usize,
    first: &[usize],
    maxfirst: &mut [usize],
    prevleaf: &mut [usize],
    ancestor: &mut [usize],
) -> (usize, u8) {
    if i <= j || (maxfirst[i] != NONE && first[j] <= maxfirst[i]) {
        return (NONE, 0);
    }
    maxfirst[i] = first[j];
    let jprev = prevleaf[i];
    prevleaf[i] = j;
    if jprev == NONE {
        return (i, 1);
    }
    let mut q = jprev;
    while q != ancestor[q] {
        q = ancestor[q];
    }
    let mut s = jprev;
    while s != q {
        let sparent = ancestor[s];
        ancestor[s] = q;
        s = sparent;
    }
    (q, 2)
}

/// Column counts of the Cholesky factor of `sp` (or of `spᵀ·sp` when `ata`),
/// diagonal included.
pub fn column_counts(sp: &Sparsity, parent: &[Option<usize>], post: &[usize], ata: bool) -> Vec<usize> {
    let (m, n) = sp.shape();
    let at = sp.t();
    let mut ancestor: Vec<usize> = (0..n).collect();
    let mut maxfirst = vec![NONE; n];
    let mut prevleaf = vec![NONE; n];
    let mut first = vec![NONE; n];
    let mut delta = vec![0isize; n];

    for (k, &node) in post.iter().enumerate() {
        let mut j = node;
        delta[j] = if first[j] == NONE { 1 } else { 0 };
        while first[j] == NONE {
            first[j] = k;
            match parent[j] {
                Some(p) => j = p,
                None => break,
            }
        }
    }

    // Each row of A goes into the list of its earliest column in postorder
    let (head, next) = if ata {
        let mut w = vec![0usize; n];
        for (k, &j) in post.iter().enumerate() {
            w[j] = k;
        }
        let mut head = vec![NONE; n + 1];
        let mut next = vec![NONE; m];
        for i in 0..m {
            let k = at.col_rows(i).iter().map(|&c| w[c]).min().unwrap_or(n);
            next[i] = head[k];
            head[k] = i;
        }
        (head, next)
    } else {
        (Vec::new(), Vec::new())
    };

    for (k, &j) in post.iter().enumerate() {
        if let Some(p) = parent[j] {
            delta[p] -= 1;
        }
        let mut jj = if ata { head[k] } else { j };
        while jj != NONE {
            for &i in at.col_rows(jj) {
                let (q, jleaf) = leaf(i, j, &first, &mut maxfirst, &mut prevleaf, &mut ancestor);
                if jleaf >= 1 {
                    delta[j] += 1;
                }
                if jleaf == 2 {
                    delta[q] -= 1;
                }
            }
            jj = if ata { next[jj] } else { NONE };
        }
        if let Some(p) = parent[j] {
            ancestor[j] = p;
        }
    }

    for j in 0..n {
        if let Some(p) = parent[j] {
            delta[p] += delta[j];
        }
    }
    delta.into_iter().map(|d| d.max(0) as usize).collect()
}

/// Row assignment for sparse QR: returns `(pinv, leftmost, nrow_ext, v_nnz)`.
///
/// Rows are assigned to the column where their Householder vector starts;
/// columns without a row get a fictitious one, so `pinv` has `nrow_ext >= m`
/// entries.
fn vcount(sp: &Sparsity, parent: &[Option<usize>]) -> (Vec<usize>, Vec<Option<usize>>, usize, usize) {
    let (m, n) = sp.shape();
    let mut leftmost = vec![None; m];
    for k in (0..n).rev() {
        for &r in sp.col_rows(k) {
            leftmost[r] = Some(k);
        }
    }

    let mut next = vec![NONE; m];
    let mut head = vec![NONE; n];
    let mut tail = vec![NONE; n];
    let mut nque = vec![0isize; n];
    let mut pinv = vec![NONE; m + n];
    for i in (0..m).rev() {
        let Some(k) = leftmost[i] else { continue };
        if nque[k] == 0 {
            tail[k] = i;
        }
        nque[k] += 1;
        next[i] = head[k];
        head[k] = i;
    }

    let mut v_nnz = 0;
    let mut m2 = m;
    for k in 0..n {
        let mut i = head[k];
        v_nnz += 1;
        if i == NONE {
            i = m2;
            m2 += 1;
        }
        pinv[i] = k;
        nque[k] -= 1;
        if nque[k] <= 0 {
            continue;
        }
        v_nnz += nque[k] as usize;
        if let Some(pa) = parent[k] {
            if nque[pa] == 0 {
                tail[pa] = tail[k];
            }
            next[tail[k]] = head[pa];
            head[pa] = next[i];
            nque[pa] += nque[k];
        }
    }

    let mut k = n;
    for slot in pinv.iter_mut().take(m) {
        if *slot == NONE {
            *slot = k;
            k += 1;
        }
    }
    pinv.truncate(m2);
    (pinv, leftmost, m2, v_nnz)
}

/// Symbolic sparse QR factorization.
#[derive(Debug, Clone)]
pub struct QrSparsity {
    /// Householder vectors, `nrow_ext x ncol`
    pub v: Sparsity,
    /// Upper triangular factor, `ncol x ncol`
    pub r: Sparsity,
    /// Row permutation: row `i` of the input becomes row `prinv[i]` of V
    pub prinv: Vec<usize>,
    /// Column permutation applied before factorizing
    pub pc: Vec<usize>,
}

/// Symbolic factorization summary from [`Sparsity::symbfact`].
#[derive(Debug, Clone)]
pub struct SymbolicFactor {
    pub parent: Vec<Option<usize>>,
    pub post: Vec<usize>,
    /// Column counts of the factor, diagonal included
    pub counts: Vec<usize>,
    /// Factor pattern (lower triangle with diagonal); not formed for `ata`
    pub l: Option<Sparsity>,
}

impl Sparsity {
    /// Elimination tree, see [`elimination_tree`].
    pub fn etree(&self, ata: bool) -> Vec<Option<usize>> {
        elimination_tree(self, ata)
    }

    /// Symbolic LDLᵀ factorization of a symmetric pattern.
    ///
    /// Returns the pattern of Lᵀ with the unit diagonal left out (strictly
    /// upper triangular) together with the symmetric permutation that was
    /// applied first: the identity, or an approximate minimum degree
    /// ordering when `amd` is set.
    pub fn ldl(&self, amd: bool) -> SparsityResult<(Sparsity, Vec<usize>)> {
        if !self.is_symmetric() {
            return Err(SparsityError::NotSymmetric("ldl"));
        }
        let n = self.ncol();
        if amd {
            let p = self.amd()?;
            let (permuted, _) = self.submatrix(&p, &p);
            let (lt, _) = permuted.ldl(false)?;
            return Ok((lt, p));
        }

        let mut parent: Vec<Option<usize>> = vec![None; n];
        let mut visited = vec![NONE; n];
        let mut counts = vec![0usize; n];
        for c in 0..n {
            visited[c] = c;
            for &r0 in self.col_rows(c) {
                if r0 >= c {
                    break;
                }
                let mut r = r0;
                while visited[r] != c {
                    if parent[r].is_none() {
                        parent[r] = Some(c);
                    }
                    counts[r] += 1;
                    visited[r] = c;
                    match parent[r] {
                        Some(p) => r = p,
                        None => break,
                    }
                }
            }
        }

        // Strictly lower L in compressed-column form: column r lists rows c
        let mut colind = vec![0usize; n + 1];
        for r in 0..n {
            colind[r + 1] = colind[r] + counts[r];
        }
        let mut fill = colind[..n].to_vec();
        let mut row = vec![0usize; colind[n]];
        visited.fill(NONE);
        for c in 0..n {
            visited[c] = c;
            for &r0 in self.col_rows(c) {
                if r0 >= c {
                    break;
                }
                let mut r = r0;
                while visited[r] != c {
                    row[fill[r]] = c;
                    fill[r] += 1;
                    visited[r] = c;
                    match parent[r] {
                        Some(p) => r = p,
                        None => break,
                    }
                }
            }
        }
        let l = Sparsity::from_parts(n, n, colind, row);
        Ok((l.t(), (0..n).collect()))
    }

    /// Symbolic sparse QR factorization.
    ///
    /// With `amd` the columns are first ordered by an approximate minimum
    /// degree ordering of `AᵀA`.
    pub fn qr_sparse(&self, amd: bool) -> SparsityResult<QrSparsity> {
        if amd {
            let ata = Sparsity::mtimes(&self.t(), self)?;
            let pc = ata.amd()?;
            let rows: Vec<usize> = (0..self.nrow()).collect();
            let (permuted, _) = self.submatrix(&rows, &pc);
            let mut qr = permuted.qr_sparse(false)?;
            qr.pc = pc;
            return Ok(qr);
        }

        let n = self.ncol();
        let parent = elimination_tree(self, true);
        let (pinv, leftmost, m2, v_nnz) = vcount(self, &parent);

        let mut w = vec![-1isize; m2];
        let mut s = vec![0usize; n];
        let mut v_colind = Vec::with_capacity(n + 1);
        let mut v_row = Vec::with_capacity(v_nnz);
        let mut r_colind = Vec::with_capacity(n + 1);
        let mut r_row = Vec::new();
        v_colind.push(0);
        r_colind.push(0);

        for k in 0..n {
            let kk = k as isize;
            let v_start = v_row.len();
            let r_start = r_row.len();
            w[k] = kk;
            v_row.push(k);
            let mut top = n;
            for &ai in self.col_rows(k) {
                // Path from the leftmost column of row ai up to k
                if let Some(mut i) = leftmost[ai] {
                    let mut len = 0;
                    while w[i] != kk {
                        s[len] = i;
                        len += 1;
                        w[i] = kk;
                        match parent[i] {
                            Some(p) => i = p,
                            None => break,
                        }
                    }
                    while len > 0 {
                        top -= 1;
                        len -= 1;
                        s[top] = s[len];
                    }
                }
                let i = pinv[ai];
                if i > k && w[i] < kk {
                    v_row.push(i);
                    w[i] = kk;
                }
            }
            for &i in &s[top..n] {
                r_row.push(i);
                if parent[i] == Some(k) {
                    for q in v_colind[i]..v_colind[i + 1] {
                        let vi = v_row[q];
                        if w[vi] < kk {
                            w[vi] = kk;
                            v_row.push(vi);
                        }
                    }
                }
            }
            r_row.push(k);
            v_row[v_start..].sort_unstable();
            r_row[r_start..].sort_unstable();
            v_colind.push(v_row.len());
            r_colind.push(r_row.len());
        }
        debug_assert_eq!(v_row.len(), v_nnz);

        Ok(QrSparsity {
            v: Sparsity::from_parts(m2, n, v_colind, v_row),
            r: Sparsity::from_parts(n, n, r_colind, r_row),
            prinv: pinv,
            pc: (0..n).collect(),
        })
    }

    /// Elimination tree, postorder and factor column counts in one pass.
    ///
    /// With `ata` the counts are those of the Cholesky factor of `AᵀA`
    /// (equivalently the row counts of R in a QR factorization). Otherwise
    /// the pattern must be symmetric and the factor pattern is also returned.
    pub fn symbfact(&self, ata: bool) -> SparsityResult<SymbolicFactor> {
        if !ata && !self.is_symmetric() {
            return Err(SparsityError::NotSymmetric("symbfact"));
        }
        let parent = elimination_tree(self, ata);
        let post = postorder(&parent);
        let counts = column_counts(self, &parent, &post, ata);
        let l = if ata {
            None
        } else {
            let (lt, _) = self.ldl(false)?;
            Some(lt.t().unite(&Sparsity::diag(self.ncol()))?)
        };
        Ok(SymbolicFactor {
            parent,
            post,
            counts,
            l,
        })
    }
}
