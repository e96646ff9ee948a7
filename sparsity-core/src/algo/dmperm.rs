//! Maximum matching, strongly connected components and the
//! Dulmage-Mendelsohn decomposition.
//!
//! The graph of a pattern has an edge `j -> i` for every nonzero `(i, j)`.
//! All searches run on explicit stacks.

use std::collections::VecDeque;

use super::NONE;
use crate::error::{SparsityError, SparsityResult};
use crate::pattern::Sparsity;

/// Row and column permutations with block boundaries.
///
/// Block `b` consists of rows `rowperm[rowblock[b]..rowblock[b+1]]` and
/// columns `colperm[colblock[b]..colblock[b+1]]`.
///
/// The coarse boundaries split the permuted rows into `R1 R2 R3 R0` and the
/// permuted columns into `C0 C1 C2 C3`: `C0` are unmatched columns, `R0`
/// unmatched rows, and `A(R2, C2)` is the square, perfectly matched part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dmperm {
    pub rowperm: Vec<usize>,
    pub colperm: Vec<usize>,
    pub rowblock: Vec<usize>,
    pub colblock: Vec<usize>,
    pub coarse_rowblock: [usize; 5],
    pub coarse_colblock: [usize; 5],
}

impl Dmperm {
    /// Number of fine blocks.
    pub fn nblocks(&self) -> usize {
        self.rowblock.len().saturating_sub(1)
    }
}

fn neighbors<'a>(sp: &'a Sparsity, pinv: Option<&[Option<usize>]>, j: usize) -> &'a [usize] {
    match pinv {
        None => sp.col_rows(j),
        Some(pinv) => match pinv[j] {
            Some(jn) => sp.col_rows(jn),
            None => &[],
        },
    }
}

/// Depth-first search from `start`, appending every newly reached node to
/// `finished` once all of its successors are done.
///
/// With `pinv`, node `j` is expanded through column `pinv[j]` of the pattern
/// (nodes mapped to `None` have no successors).
pub fn dfs(
    sp: &Sparsity,
    start: usize,
    marked: &mut [bool],
    pinv: Option<&[Option<usize>]>,
    finished: &mut Vec<usize>,
) {
    if marked[start] {
        return;
    }
    let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
    marked[start] = true;
    while let Some(top) = stack.last_mut() {
        let (j, pos) = *top;
        let succ = neighbors(sp, pinv, j);
        match succ[pos..].iter().position(|&i| !marked[i]) {
            Some(offset) => {
                let i = succ[pos + offset];
                top.1 = pos + offset + 1;
                marked[i] = true;
                stack.push((i, 0));
            }
            None => {
                stack.pop();
                finished.push(j);
            }
        }
    }
}

/// Strongly connected components of a square pattern.
///
/// Returns `(p, r)`: node order `p` grouping each component contiguously,
/// and component boundaries `r`. Each component is listed in ascending
/// order and the components come in topological order of the condensed
/// graph.
pub fn strongly_connected_components(sp: &Sparsity) -> (Vec<usize>, Vec<usize>) {
    let n = sp.ncol();
    let at = sp.t();
    let mut marked = vec![false; n];
    let mut finish = Vec::with_capacity(n);
    for i in 0..n {
        dfs(sp, i, &mut marked, None, &mut finish);
    }

    marked.fill(false);
    let mut components: Vec<Vec<usize>> = Vec::new();
    for &i in finish.iter().rev() {
        if marked[i] {
            continue;
        }
        let mut comp = Vec::new();
        dfs(&at, i, &mut marked, None, &mut comp);
        components.push(comp);
    }
    components.reverse();

    let mut p = Vec::with_capacity(n);
    let mut r = Vec::with_capacity(components.len() + 1);
    r.push(0);
    for mut comp in components {
        comp.sort_unstable();
        p.extend(comp);
        r.push(p.len());
    }
    (p, r)
}

/// Work arrays of the augmenting path search.
struct Augment {
    cheap: Vec<usize>,
    visited: Vec<usize>,
    js: Vec<usize>,
    is: Vec<usize>,
    ps: Vec<usize>,
}

impl Augment {
    /// Try to match column `k` by an augmenting path from it.
    fn run(&mut self, k: usize, sp: &Sparsity, jmatch: &mut [Option<usize>]) {
        let colind = sp.colind();
        let row = sp.row();
        let mut found = false;
        let mut head: isize = 0;
        self.js[0] = k;
        while head >= 0 {
            let h = head as usize;
            let j = self.js[h];
            if self.visited[j] != k {
                // First visit: try a cheap assignment
                self.visited[j] = k;
                let mut p = self.cheap[j];
                let mut i = NONE;
                while p < colind[j + 1] && !found {
                    i = row[p];
                    found = jmatch[i].is_none();
                    p += 1;
                }
                self.cheap[j] = p;
                if found {
                    self.is[h] = i;
                    break;
                }
                self.ps[h] = colind[j];
            }

            let end = colind[j + 1];
            let mut p = self.ps[h];
            while p < end {
                let i = row[p];
                let Some(next) = jmatch[i] else {
                    p += 1;
                    continue;
                };
                if self.visited[next] == k {
                    p += 1;
                    continue;
                }
                self.ps[h] = p + 1;
                self.is[h] = i;
                head += 1;
                self.js[head as usize] = next;
                break;
            }
            if p == end {
                head -= 1;
            }
        }
        if found {
            for h in (0..=head as usize).rev() {
                jmatch[self.is[h]] = Some(self.js[h]);
            }
        }
    }
}

/// Match every column it can, returning `(jmatch, imatch)` for `sp` itself.
fn match_columns(sp: &Sparsity) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let (m, n) = sp.shape();
    let mut jmatch = vec![None; m];
    let mut work = Augment {
        cheap: sp.colind()[..n].to_vec(),
        visited: vec![NONE; n],
        js: vec![0; n],
        is: vec![0; n],
        ps: vec![0; n],
    };
    for k in 0..n {
        work.run(k, sp, &mut jmatch);
    }
    let mut imatch = vec![None; n];
    for (i, j) in jmatch.iter().enumerate() {
        if let Some(j) = *j {
            imatch[j] = Some(i);
        }
    }
    (jmatch, imatch)
}

/// Maximum transversal.
///
/// Returns `(jmatch, imatch)`: row `i` is matched to column `jmatch[i]` and
/// column `j` to row `imatch[j]`.
pub fn maxtrans(sp: &Sparsity) -> (Vec<Option<usize>>, Vec<Option<usize>>) {
    let (m, n) = sp.shape();
    let mut diag = 0;
    let mut n2 = 0;
    let mut row_hit = vec![false; m];
    for j in 0..n {
        let rows = sp.col_rows(j);
        if !rows.is_empty() {
            n2 += 1;
        }
        for &i in rows {
            row_hit[i] = true;
            if i == j {
                diag += 1;
            }
        }
    }
    if diag == m.min(n) {
        let jmatch = (0..m).map(|i| (i < diag).then_some(i)).collect();
        let imatch = (0..n).map(|j| (j < diag).then_some(j)).collect();
        return (jmatch, imatch);
    }
    let m2 = row_hit.iter().filter(|&&hit| hit).count();
    if m2 < n2 {
        let (jm, im) = match_columns(&sp.t());
        (im, jm)
    } else {
        match_columns(sp)
    }
}

/// Breadth-first search from the unmatched columns of `sp`, alternating
/// between nonzeros and matching edges. Reached rows and columns get `mark`.
fn bfs(
    sp: &Sparsity,
    wi: &mut [isize],
    wj: &mut [isize],
    imatch: &[Option<usize>],
    jmatch: &[Option<usize>],
    mark: isize,
) {
    let mut queue = VecDeque::new();
    for j in 0..sp.ncol() {
        if imatch[j].is_none() {
            wj[j] = 0;
            queue.push_back(j);
        }
    }
    while let Some(j) = queue.pop_front() {
        for &i in sp.col_rows(j) {
            if wi[i] >= 0 {
                continue;
            }
            wi[i] = mark;
            let Some(j2) = jmatch[i] else { continue };
            if wj[j2] >= 0 {
                continue;
            }
            wj[j2] = mark;
            queue.push_back(j2);
        }
    }
}

impl Sparsity {
    /// Depth-first search, see [`dfs`].
    pub fn dfs(
        &self,
        start: usize,
        marked: &mut [bool],
        pinv: Option<&[Option<usize>]>,
        finished: &mut Vec<usize>,
    ) -> SparsityResult<()> {
        if start >= marked.len() || marked.len() < self.ncol().max(self.nrow()) {
            return Err(SparsityError::OutOfRange {
                index: start as isize,
                len: marked.len(),
            });
        }
        dfs(self, start, marked, pinv, finished);
        Ok(())
    }

    /// Strongly connected components, see [`strongly_connected_components`].
    pub fn scc(&self) -> SparsityResult<(Vec<usize>, Vec<usize>)> {
        if !self.is_square() {
            return Err(SparsityError::invalid(format!(
                "scc: expected a square pattern, got {}",
                self.dim(false)
            )));
        }
        Ok(strongly_connected_components(self))
    }

    /// Dulmage-Mendelsohn decomposition into block upper triangular form.
    pub fn dulmage_mendelsohn(&self) -> Dmperm {
        let (m, n) = self.shape();
        let (jmatch, imatch) = maxtrans(self);

        // Coarse decomposition
        let mut wi = vec![-1isize; m];
        let mut wj = vec![-1isize; n];
        bfs(self, &mut wi, &mut wj, &imatch, &jmatch, 1);
        bfs(&self.t(), &mut wj, &mut wi, &jmatch, &imatch, 3);

        let mut p = Vec::with_capacity(m);
        let mut q = Vec::with_capacity(n);
        let mut cc = [0usize; 5];
        let mut rr = [0usize; 5];
        q.extend((0..n).filter(|&j| wj[j] == 0));
        cc[1] = q.len();
        for (set, mark) in [(1, 1isize), (2, -1), (3, 3)] {
            for j in 0..n {
                if wj[j] != mark {
                    continue;
                }
                if let Some(i) = imatch[j] {
                    p.push(i);
                    q.push(j);
                }
            }
            cc[set + 1] = q.len();
            rr[set] = p.len();
        }
        p.extend((0..m).filter(|&i| wi[i] == 0));
        rr[4] = p.len();
        debug_assert_eq!((p.len(), q.len()), (m, n));

        // Fine decomposition of the square part
        let (fine, _) = self.submatrix(&p[rr[1]..rr[2]], &q[cc[2]..cc[3]]);
        let (ps, rs) = strongly_connected_components(&fine);
        let permuted_cols: Vec<usize> = ps.iter().map(|&k| q[cc[2] + k]).collect();
        q[cc[2]..cc[3]].copy_from_slice(&permuted_cols);
        let permuted_rows: Vec<usize> = ps.iter().map(|&k| p[rr[1] + k]).collect();
        p[rr[1]..rr[2]].copy_from_slice(&permuted_rows);

        let nfine = rs.len() - 1;
        let mut rowblock = Vec::with_capacity(nfine + 3);
        let mut colblock = Vec::with_capacity(nfine + 3);
        if cc[2] > 0 {
            rowblock.push(0);
            colblock.push(0);
        }
        for &r in &rs[..nfine] {
            rowblock.push(r + rr[1]);
            colblock.push(r + cc[2]);
        }
        if rr[2] < m {
            rowblock.push(rr[2]);
            colblock.push(cc[3]);
        }
        rowblock.push(m);
        colblock.push(n);

        Dmperm {
            rowperm: p,
            colperm: q,
            rowblock,
            colblock,
            coarse_rowblock: rr,
            coarse_colblock: cc,
        }
    }

    /// Block lower triangular form: the Dulmage-Mendelsohn decomposition of
    /// the transpose with rows and columns swapped back.
    pub fn btf(&self) -> Dmperm {
        let d = self.t().dulmage_mendelsohn();
        Dmperm {
            rowperm: d.colperm,
            colperm: d.rowperm,
            rowblock: d.colblock,
            colblock: d.rowblock,
            coarse_rowblock: d.coarse_colblock,
            coarse_colblock: d.coarse_rowblock,
        }
    }

    /// Structural rank: the size of a maximum matching.
    pub fn sprank(&self) -> usize {
        self.btf().coarse_colblock[3]
    }

    /// True if a square pattern is structurally rank deficient.
    pub fn is_singular(&self) -> SparsityResult<bool> {
        if !self.is_square() {
            return Err(SparsityError::invalid(format!(
                "is_singular: expected a square pattern, got {}",
                self.dim(false)
            )));
        }
        Ok(self.sprank() != self.ncol())
    }
}
