//! Factory functions: every way of obtaining a pattern.

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sprs::CsMat;

use super::{PatternData, Sparsity};
use crate::cache;
use crate::error::{SparsityError, SparsityResult};

/// Key-value view of a pattern, for diagnostics and generic containers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SparsityInfo {
    pub nrow: usize,
    pub ncol: usize,
    pub colind: Vec<usize>,
    pub row: Vec<usize>,
}

/// Column offsets of length `ncol + 1`, starting at 0, non-decreasing and
/// ending at `nnz`. Every column range then lies inside the row array.
fn check_offsets(ncol: usize, colind: &[usize], nnz: usize) -> SparsityResult<()> {
    let expected = ncol
        .checked_add(1)
        .ok_or_else(|| SparsityError::invalid(format!("{} columns overflow the offset array", ncol)))?;
    if colind.len() != expected {
        return Err(SparsityError::invalid(format!(
            "colind has length {}, expected {}",
            colind.len(),
            expected
        )));
    }
    if colind[0] != 0 {
        return Err(SparsityError::invalid("colind must start at 0"));
    }
    if colind[ncol] != nnz {
        return Err(SparsityError::invalid(format!(
            "colind ends at {} but there are {} row indices",
            colind[ncol], nnz
        )));
    }
    if let Some(c) = colind.windows(2).position(|w| w[0] > w[1]) {
        return Err(SparsityError::invalid(format!("colind decreases at column {}", c)));
    }
    Ok(())
}

fn singleton(nrow: usize, ncol: usize, colind: Vec<usize>, row: Vec<usize>) -> Sparsity {
    let hash = cache::hash_pattern(nrow, ncol, &colind, &row);
    Sparsity::from_arc(std::sync::Arc::new(PatternData {
        nrow,
        ncol,
        colind,
        row,
        hash,
    }))
}

impl Sparsity {
    /// The 0x0 pattern.
    pub fn empty() -> Sparsity {
        static EMPTY: OnceLock<Sparsity> = OnceLock::new();
        EMPTY.get_or_init(|| singleton(0, 0, vec![0], vec![])).clone()
    }

    /// The 1x1 pattern, with or without its single entry.
    pub fn scalar(dense: bool) -> Sparsity {
        static DENSE: OnceLock<Sparsity> = OnceLock::new();
        static SPARSE: OnceLock<Sparsity> = OnceLock::new();
        if dense {
            DENSE.get_or_init(|| singleton(1, 1, vec![0, 1], vec![0])).clone()
        } else {
            SPARSE.get_or_init(|| singleton(1, 1, vec![0, 0], vec![])).clone()
        }
    }

    /// Validated construction from compressed-column arrays.
    pub fn new(nrow: usize, ncol: usize, colind: Vec<usize>, row: Vec<usize>) -> SparsityResult<Sparsity> {
        check_offsets(ncol, &colind, row.len())?;
        for c in 0..ncol {
            let col = &row[colind[c]..colind[c + 1]];
            if let Some(&r) = col.iter().find(|&&r| r >= nrow) {
                return Err(SparsityError::invalid(format!(
                    "row index {} out of bounds for {} rows (column {})",
                    r, nrow, c
                )));
            }
            if col.windows(2).any(|w| w[0] >= w[1]) {
                return Err(SparsityError::invalid(format!(
                    "row indices of column {} are not strictly increasing",
                    c
                )));
            }
        }
        Ok(Sparsity::from_parts(nrow, ncol, colind, row))
    }

    /// Fully populated pattern.
    pub fn dense(nrow: usize, ncol: usize) -> Sparsity {
        let colind = (0..=ncol).map(|c| c * nrow).collect();
        let mut row = Vec::with_capacity(nrow * ncol);
        for _ in 0..ncol {
            row.extend(0..nrow);
        }
        Sparsity::from_parts(nrow, ncol, colind, row)
    }

    /// Pattern without any nonzeros.
    pub fn zeros(nrow: usize, ncol: usize) -> Sparsity {
        Sparsity::from_parts(nrow, ncol, vec![0; ncol + 1], Vec::new())
    }

    /// Square diagonal pattern.
    pub fn diag(n: usize) -> Sparsity {
        Sparsity::diag_rect(n, n)
    }

    /// Diagonal of a rectangular pattern.
    pub fn diag_rect(nrow: usize, ncol: usize) -> Sparsity {
        let m = nrow.min(ncol);
        let colind = (0..=ncol).map(|c| c.min(m)).collect();
        Sparsity::from_parts(nrow, ncol, colind, (0..m).collect())
    }

    /// Upper triangular including the diagonal.
    pub fn upper(n: usize) -> Sparsity {
        let mut colind = Vec::with_capacity(n + 1);
        let mut row = Vec::with_capacity(n * (n + 1) / 2);
        colind.push(0);
        for c in 0..n {
            row.extend(0..=c);
            colind.push(row.len());
        }
        Sparsity::from_parts(n, n, colind, row)
    }

    /// Lower triangular including the diagonal.
    pub fn lower(n: usize) -> Sparsity {
        let mut colind = Vec::with_capacity(n + 1);
        let mut row = Vec::with_capacity(n * (n + 1) / 2);
        colind.push(0);
        for c in 0..n {
            row.extend(c..n);
            colind.push(row.len());
        }
        Sparsity::from_parts(n, n, colind, row)
    }

    /// A single band of an `n x n` pattern.
    ///
    /// `p = 0` is the diagonal, `p > 0` the p-th subdiagonal (entries
    /// `(i + p, i)`), `p < 0` the superdiagonal.
    pub fn band(n: usize, p: isize) -> SparsityResult<Sparsity> {
        let offset = p.unsigned_abs();
        if offset >= n.max(1) {
            return Err(SparsityError::invalid(format!(
                "band offset {} must be smaller than the size {}",
                p, n
            )));
        }
        let nc = n - offset.min(n);
        let row_offset = if p > 0 { offset } else { 0 };
        let row = (0..nc).map(|i| i + row_offset).collect();
        let shift = if p < 0 { offset as isize } else { 0 };
        let colind = (0..=n)
            .map(|i| (i as isize - shift).clamp(0, nc as isize) as usize)
            .collect();
        Ok(Sparsity::from_parts(n, n, colind, row))
    }

    /// All bands within distance `p` of the diagonal.
    pub fn banded(n: usize, p: usize) -> Sparsity {
        let mut colind = Vec::with_capacity(n + 1);
        let mut row = Vec::new();
        colind.push(0);
        for c in 0..n {
            row.extend(c.saturating_sub(p)..(c + p + 1).min(n));
            colind.push(row.len());
        }
        Sparsity::from_parts(n, n, colind, row)
    }

    /// Column vector of length `n` with a single entry at `el`.
    pub fn unit(n: usize, el: usize) -> SparsityResult<Sparsity> {
        if el >= n {
            return Err(SparsityError::OutOfRange {
                index: el as isize,
                len: n,
            });
        }
        Ok(Sparsity::from_parts(n, 1, vec![0, 1], vec![el]))
    }

    /// Every combination of the given rows and columns.
    pub fn rowcol(rows: &[usize], cols: &[usize], nrow: usize, ncol: usize) -> SparsityResult<Sparsity> {
        let mut rr = Vec::with_capacity(rows.len() * cols.len());
        let mut cc = Vec::with_capacity(rows.len() * cols.len());
        for &c in cols {
            for &r in rows {
                rr.push(r);
                cc.push(c);
            }
        }
        Sparsity::triplet(nrow, ncol, &rr, &cc)
    }

    /// Pattern from column-major linear indices.
    pub fn nonzeros(nrow: usize, ncol: usize, nz: &[usize]) -> SparsityResult<Sparsity> {
        let numel = nrow * ncol;
        let mut rr = Vec::with_capacity(nz.len());
        let mut cc = Vec::with_capacity(nz.len());
        for &k in nz {
            if k >= numel {
                return Err(SparsityError::OutOfRange {
                    index: k as isize,
                    len: numel,
                });
            }
            rr.push(k % nrow);
            cc.push(k / nrow);
        }
        Sparsity::triplet(nrow, ncol, &rr, &cc)
    }

    /// Pattern from (possibly unsorted, possibly repeated) coordinates.
    pub fn triplet(nrow: usize, ncol: usize, rows: &[usize], cols: &[usize]) -> SparsityResult<Sparsity> {
        Ok(Sparsity::triplet_with_mapping(nrow, ncol, rows, cols, false)?.0)
    }

    /// Like [`triplet`](Self::triplet), also returning a nonzero mapping.
    ///
    /// With `invert_mapping` the mapping has one entry per input coordinate
    /// giving its storage slot; repeated coordinates share a slot. Without
    /// it, the mapping has one entry per storage slot giving the first input
    /// coordinate that landed there.
    pub fn triplet_with_mapping(
        nrow: usize,
        ncol: usize,
        rows: &[usize],
        cols: &[usize],
        invert_mapping: bool,
    ) -> SparsityResult<(Sparsity, Vec<usize>)> {
        if rows.len() != cols.len() {
            return Err(SparsityError::invalid(format!(
                "triplet: {} row indices but {} column indices",
                rows.len(),
                cols.len()
            )));
        }
        for (k, (&r, &c)) in rows.iter().zip(cols).enumerate() {
            if r >= nrow || c >= ncol {
                return Err(SparsityError::invalid(format!(
                    "triplet: entry {} at ({}, {}) is outside a {}x{} pattern",
                    k, r, c, nrow, ncol
                )));
            }
        }

        let mut order: Vec<usize> = (0..rows.len()).collect();
        order.sort_by_key(|&k| (cols[k], rows[k]));

        let mut colind = vec![0usize; ncol + 1];
        let mut row = Vec::with_capacity(rows.len());
        let mut slot_of_input = vec![0usize; rows.len()];
        let mut first_input = Vec::with_capacity(rows.len());
        let mut last: Option<(usize, usize)> = None;
        for &k in &order {
            let key = (cols[k], rows[k]);
            if last != Some(key) {
                row.push(rows[k]);
                colind[cols[k] + 1] += 1;
                first_input.push(k);
                last = Some(key);
            }
            slot_of_input[k] = row.len() - 1;
        }
        for c in 0..ncol {
            colind[c + 1] += colind[c];
        }

        let sp = Sparsity::from_parts(nrow, ncol, colind, row);
        let mapping = if invert_mapping { slot_of_input } else { first_input };
        Ok((sp, mapping))
    }

    /// Decode the flat `[nrow, ncol, colind..., row...]` representation.
    ///
    /// A buffer whose first column offset is 1, or whose nonzero count equals
    /// `nrow * ncol` with no row indices stored, denotes the dense pattern.
    pub fn compressed(v: &[usize]) -> SparsityResult<Sparsity> {
        if v.len() < 2 {
            return Err(SparsityError::invalid("compressed pattern needs at least nrow and ncol"));
        }
        let (nrow, ncol) = (v[0], v[1]);
        let numel = nrow
            .checked_mul(ncol)
            .ok_or_else(|| SparsityError::invalid(format!("{}x{} pattern is too large", nrow, ncol)))?;
        if v.len() >= 3 && v[2] == 1 {
            return Ok(Sparsity::dense(nrow, ncol));
        }
        let header = ncol
            .checked_add(3)
            .ok_or_else(|| SparsityError::invalid(format!("{} columns overflow the offset array", ncol)))?;
        if v.len() < header {
            return Err(SparsityError::invalid(format!(
                "compressed pattern of {} columns needs {} column offsets",
                ncol,
                ncol + 1
            )));
        }
        let colind = &v[2..header];
        let nnz = colind[ncol];
        if v.len() == header && nnz == numel {
            if colind.iter().enumerate().any(|(c, &k)| k != c * nrow) {
                return Err(SparsityError::invalid("dense compressed pattern has irregular column offsets"));
            }
            return Ok(Sparsity::dense(nrow, ncol));
        }
        let expected = header
            .checked_add(nnz)
            .ok_or_else(|| SparsityError::invalid(format!("{} nonzeros overflow the buffer length", nnz)))?;
        if v.len() != expected {
            return Err(SparsityError::invalid(format!(
                "compressed pattern has length {}, expected {}",
                v.len(),
                expected
            )));
        }
        Sparsity::new(nrow, ncol, colind.to_vec(), v[header..].to_vec())
    }

    /// Flat representation; dense patterns omit their row indices.
    pub fn compress(&self) -> Vec<usize> {
        let mut v = Vec::with_capacity(3 + self.ncol() + self.nnz());
        v.push(self.nrow());
        v.push(self.ncol());
        v.extend_from_slice(self.colind());
        if !self.is_dense() {
            v.extend_from_slice(self.row());
        }
        v
    }

    pub fn info(&self) -> SparsityInfo {
        SparsityInfo {
            nrow: self.nrow(),
            ncol: self.ncol(),
            colind: self.colind().to_vec(),
            row: self.row().to_vec(),
        }
    }

    pub fn from_info(info: &SparsityInfo) -> SparsityResult<Sparsity> {
        Sparsity::new(info.nrow, info.ncol, info.colind.clone(), info.row.clone())
    }

    /// True if the row indices of every column are non-decreasing, or
    /// strictly increasing with `strictly`.
    ///
    /// Works on raw compressed-column arrays that need not be canonical yet.
    pub fn rows_sequential(colind: &[usize], row: &[usize], strictly: bool) -> bool {
        colind.windows(2).all(|w| match row.get(w[0]..w[1]) {
            Some(col) => col.windows(2).all(|p| p[0] < p[1] || (!strictly && p[0] == p[1])),
            None => false,
        })
    }

    /// Canonical pattern from compressed-column arrays whose columns may
    /// repeat a row index.
    ///
    /// Rows must be non-decreasing within each column. Repeated entries
    /// collapse to the first; the returned mapping gives, for each kept
    /// nonzero, its position in the input `row`.
    pub fn remove_duplicates(
        nrow: usize,
        ncol: usize,
        colind: &[usize],
        row: &[usize],
    ) -> SparsityResult<(Sparsity, Vec<usize>)> {
        check_offsets(ncol, colind, row.len())?;
        if !Sparsity::rows_sequential(colind, row, false) {
            return Err(SparsityError::invalid("row indices must be non-decreasing within each column"));
        }
        if let Some(&r) = row.iter().find(|&&r| r >= nrow) {
            return Err(SparsityError::invalid(format!("row index {} out of bounds for {} rows", r, nrow)));
        }

        let mut new_colind = Vec::with_capacity(ncol + 1);
        let mut new_row = Vec::with_capacity(row.len());
        let mut mapping = Vec::with_capacity(row.len());
        new_colind.push(0);
        for c in 0..ncol {
            let mut last = None;
            for k in colind[c]..colind[c + 1] {
                if last != Some(row[k]) {
                    last = Some(row[k]);
                    new_row.push(row[k]);
                    mapping.push(k);
                }
            }
            new_colind.push(new_row.len());
        }
        Ok((Sparsity::from_parts(nrow, ncol, new_colind, new_row), mapping))
    }

    /// Pattern of a `sprs` matrix in either storage order.
    pub fn from_csmat<N: Clone + Default>(m: &CsMat<N>) -> SparsityResult<Sparsity> {
        let owned;
        let csc = if m.is_csc() {
            m
        } else {
            owned = m.to_other_storage();
            &owned
        };
        let indptr = csc.indptr();
        Sparsity::new(
            csc.rows(),
            csc.cols(),
            indptr.raw_storage().to_vec(),
            csc.indices().to_vec(),
        )
    }
}
