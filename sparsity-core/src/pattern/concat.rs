//! Concatenation and splitting.
//!
//! A pattern with zero extent in the dimension that must agree is treated
//! as absent and skipped, so empty placeholders can be mixed freely with
//! real blocks.

use super::Sparsity;
use crate::error::{SparsityError, SparsityResult};

fn check_offsets(offsets: &[usize], total: usize, what: &str) -> SparsityResult<()> {
    if offsets.is_empty() {
        return Err(SparsityError::invalid(format!("{}: offset list is empty", what)));
    }
    if offsets[0] != 0 {
        return Err(SparsityError::invalid(format!("{}: first offset must be 0", what)));
    }
    if offsets.windows(2).any(|w| w[0] > w[1]) {
        return Err(SparsityError::invalid(format!("{}: offsets must be monotone", what)));
    }
    if offsets[offsets.len() - 1] != total {
        return Err(SparsityError::invalid(format!(
            "{}: last offset is {}, expected {}",
            what,
            offsets[offsets.len() - 1],
            total
        )));
    }
    Ok(())
}

impl Sparsity {
    /// Side-by-side concatenation.
    pub fn horzcat(parts: &[Sparsity]) -> SparsityResult<Sparsity> {
        let nrow = parts.iter().map(Sparsity::nrow).find(|&n| n > 0).unwrap_or(0);
        let mut ncol = 0;
        let mut colind = vec![0usize];
        let mut row = Vec::new();
        for sp in parts {
            if sp.nrow() != nrow {
                if sp.nrow() == 0 {
                    continue;
                }
                return Err(SparsityError::mismatch("horzcat", (nrow, ncol), sp.shape()));
            }
            let offset = row.len();
            row.extend_from_slice(sp.row());
            colind.extend(sp.colind()[1..].iter().map(|&k| k + offset));
            ncol += sp.ncol();
        }
        Ok(Sparsity::from_parts(nrow, ncol, colind, row))
    }

    /// Stacked concatenation.
    pub fn vertcat(parts: &[Sparsity]) -> SparsityResult<Sparsity> {
        let ncol = parts.iter().map(Sparsity::ncol).find(|&n| n > 0).unwrap_or(0);
        let mut blocks: Vec<(&Sparsity, usize)> = Vec::with_capacity(parts.len());
        let mut nrow = 0;
        for sp in parts {
            if sp.ncol() != ncol {
                if sp.ncol() == 0 {
                    continue;
                }
                return Err(SparsityError::mismatch("vertcat", (nrow, ncol), sp.shape()));
            }
            blocks.push((sp, nrow));
            nrow += sp.nrow();
        }
        let mut colind = Vec::with_capacity(ncol + 1);
        let mut row = Vec::with_capacity(blocks.iter().map(|(sp, _)| sp.nnz()).sum());
        colind.push(0);
        for c in 0..ncol {
            for &(sp, offset) in &blocks {
                row.extend(sp.col_rows(c).iter().map(|&r| r + offset));
            }
            colind.push(row.len());
        }
        Ok(Sparsity::from_parts(nrow, ncol, colind, row))
    }

    /// Block-diagonal concatenation.
    pub fn diagcat(parts: &[Sparsity]) -> Sparsity {
        let nrow: usize = parts.iter().map(Sparsity::nrow).sum();
        let mut colind = vec![0usize];
        let mut row = Vec::with_capacity(parts.iter().map(Sparsity::nnz).sum());
        let mut row_offset = 0;
        for sp in parts {
            let nz_offset = row.len();
            row.extend(sp.row().iter().map(|&r| r + row_offset));
            colind.extend(sp.colind()[1..].iter().map(|&k| k + nz_offset));
            row_offset += sp.nrow();
        }
        let ncol = colind.len() - 1;
        Sparsity::from_parts(nrow, ncol, colind, row)
    }

    /// Grid concatenation: each inner list is a block row.
    pub fn blockcat(grid: &[Vec<Sparsity>]) -> SparsityResult<Sparsity> {
        let rows = grid
            .iter()
            .map(|blocks| Sparsity::horzcat(blocks))
            .collect::<SparsityResult<Vec<_>>>()?;
        Sparsity::vertcat(&rows)
    }

    /// Split into column blocks `offsets[i]..offsets[i+1]`.
    pub fn horzsplit(&self, offsets: &[usize]) -> SparsityResult<Vec<Sparsity>> {
        check_offsets(offsets, self.ncol(), "horzsplit")?;
        Ok(offsets
            .windows(2)
            .map(|w| {
                let (c0, c1) = (w[0], w[1]);
                let base = self.colind()[c0];
                let colind = self.colind()[c0..=c1].iter().map(|&k| k - base).collect();
                let row = self.row()[base..self.colind()[c1]].to_vec();
                Sparsity::from_parts(self.nrow(), c1 - c0, colind, row)
            })
            .collect())
    }

    /// Split into row blocks `offsets[i]..offsets[i+1]`.
    pub fn vertsplit(&self, offsets: &[usize]) -> SparsityResult<Vec<Sparsity>> {
        check_offsets(offsets, self.nrow(), "vertsplit")?;
        Ok(self
            .t()
            .horzsplit(offsets)?
            .iter()
            .map(Sparsity::t)
            .collect())
    }

    /// Split into diagonal blocks with row offsets `offset1` and column offsets `offset2`.
    pub fn diagsplit(&self, offset1: &[usize], offset2: &[usize]) -> SparsityResult<Vec<Sparsity>> {
        check_offsets(offset1, self.nrow(), "diagsplit")?;
        check_offsets(offset2, self.ncol(), "diagsplit")?;
        if offset1.len() != offset2.len() {
            return Err(SparsityError::invalid(format!(
                "diagsplit: {} row offsets but {} column offsets",
                offset1.len(),
                offset2.len()
            )));
        }
        offset1
            .windows(2)
            .zip(offset2.windows(2))
            .map(|(r, c)| {
                let rr: Vec<usize> = (r[0]..r[1]).collect();
                let cc: Vec<usize> = (c[0]..c[1]).collect();
                Ok(self.sub(&rr, &cc)?.0)
            })
            .collect()
    }
}
