//! The linear solve operation `X = A \ B` over a fixed pattern.
//!
//! A [`Linsol`] is built once for a square, structurally nonsingular
//! pattern and a number of right-hand sides. Construction computes the
//! block triangular form used for dependency propagation; numeric work
//! happens in a [`LinsolMemory`] that owns one backend instance.

use sparsity_core::{Bvec, Dmperm, Sparsity};

use crate::backend::LinsolBackend;
use crate::error::{LinsolError, LinsolResult};
use crate::numeric;
use crate::registry;
use crate::settings::LinsolSettings;

/// Inputs of the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinsolInput {
    /// Right-hand sides, dense `n x nrhs`
    B,
    /// Coefficient matrix on the solver's pattern
    A,
}

/// One forward direction: perturbations of `B` and of the nonzeros of `A`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinsolSeed {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

/// Adjoint accumulators for `B` and the nonzeros of `A`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinsolAdjoint {
    pub b: Vec<f64>,
    pub a: Vec<f64>,
}

impl LinsolAdjoint {
    /// Zero accumulators sized for `linsol`.
    pub fn zeros(linsol: &Linsol) -> Self {
        Self {
            b: vec![0.0; linsol.neq() * linsol.nrhs()],
            a: vec![0.0; linsol.sparsity().nnz()],
        }
    }
}

/// Numeric state of one solver use: the backend instance and how far it got.
pub struct LinsolMemory {
    backend: Box<dyn LinsolBackend>,
    analyzed: bool,
    factorized: bool,
}

impl LinsolMemory {
    /// Whether a numeric factorization is available.
    pub fn is_factorized(&self) -> bool {
        self.factorized
    }

    pub fn backend(&self) -> &dyn LinsolBackend {
        self.backend.as_ref()
    }
}

/// Linear solver bound to a pattern, a backend name and a right-hand side count.
#[derive(Debug, Clone)]
pub struct Linsol {
    solver: String,
    sparsity: Sparsity,
    nrhs: usize,
    btf: Dmperm,
    settings: LinsolSettings,
}

impl Linsol {
    /// Create a solver with default settings.
    pub fn new(solver: &str, sparsity: &Sparsity, nrhs: usize) -> LinsolResult<Self> {
        Self::with_settings(solver, sparsity, nrhs, LinsolSettings::default())
    }

    /// Create a solver.
    ///
    /// Fails with `DimensionMismatch` for a non-square pattern and with
    /// `SingularMatrix` when the structural rank is below the dimension.
    pub fn with_settings(
        solver: &str,
        sparsity: &Sparsity,
        nrhs: usize,
        settings: LinsolSettings,
    ) -> LinsolResult<Self> {
        if !sparsity.is_square() {
            return Err(LinsolError::DimensionMismatch {
                op: "Linsol::new",
                expected: (sparsity.nrow(), sparsity.nrow()),
                got: sparsity.shape(),
            });
        }
        if nrhs == 0 {
            return Err(LinsolError::invalid("at least one right-hand side is required"));
        }
        if !registry::has_backend(solver) {
            return Err(LinsolError::UnknownBackend(solver.to_string()));
        }

        let n = sparsity.ncol();
        let btf = sparsity.btf();
        let rank = btf.coarse_colblock[3];
        if rank < n {
            return Err(LinsolError::SingularMatrix { rank, expected: n });
        }

        if settings.verbose {
            log::info!(
                "linsol {:?}: {} with {} blocks, {} right-hand side(s)",
                solver,
                sparsity.dim(true),
                btf.nblocks(),
                nrhs
            );
        } else {
            log::debug!("linsol {:?}: {} with {} blocks", solver, sparsity.dim(true), btf.nblocks());
        }

        Ok(Self {
            solver: solver.to_string(),
            sparsity: sparsity.clone(),
            nrhs,
            btf,
            settings,
        })
    }

    /// Backend name.
    pub fn solver(&self) -> &str {
        &self.solver
    }

    pub fn sparsity(&self) -> &Sparsity {
        &self.sparsity
    }

    pub fn nrhs(&self) -> usize {
        self.nrhs
    }

    /// Number of equations.
    pub fn neq(&self) -> usize {
        self.sparsity.ncol()
    }

    /// Block triangular decomposition of the pattern.
    pub fn btf(&self) -> &Dmperm {
        &self.btf
    }

    pub fn settings(&self) -> &LinsolSettings {
        &self.settings
    }

    pub fn sparsity_in(&self, input: LinsolInput) -> Sparsity {
        match input {
            LinsolInput::B => Sparsity::dense(self.neq(), self.nrhs),
            LinsolInput::A => self.sparsity.clone(),
        }
    }

    /// Pattern of the solution `X`, dense `n x nrhs`.
    pub fn sparsity_out(&self) -> Sparsity {
        Sparsity::dense(self.neq(), self.nrhs)
    }

    /// Fresh numeric state with its own backend instance.
    pub fn memory(&self) -> LinsolResult<LinsolMemory> {
        Ok(LinsolMemory {
            backend: registry::create_backend(&self.solver, &self.settings)?,
            analyzed: false,
            factorized: false,
        })
    }

    fn check_len(&self, what: &str, got: usize, expected: usize) -> LinsolResult<()> {
        if got != expected {
            return Err(LinsolError::invalid(format!("{}: {} values, expected {}", what, got, expected)));
        }
        Ok(())
    }

    /// Numeric factorization of `a`, the nonzeros of the solver's pattern.
    ///
    /// Symbolic analysis runs on the first call for a memory only.
    pub fn factorize(&self, mem: &mut LinsolMemory, a: &[f64]) -> LinsolResult<()> {
        self.check_len("A", a.len(), self.sparsity.nnz())?;
        if self.settings.check_finite {
            if let Some(k) = a.iter().position(|v| !v.is_finite()) {
                return Err(LinsolError::invalid(format!("nonzero {} is {}", k, a[k])));
            }
        }
        if self.neq() == 0 {
            // Nothing to factorize; backends are never handed an empty matrix
            mem.analyzed = true;
            mem.factorized = true;
            return Ok(());
        }
        if !mem.analyzed {
            mem.backend.symbolic_factorization(&self.sparsity)?;
            mem.analyzed = true;
        }
        mem.factorized = false;
        mem.backend.numeric_factorization(&self.sparsity, a)?;
        mem.factorized = true;
        if self.settings.verbose {
            log::info!("linsol {:?}: factorized, {} dynamic bumps", self.solver, mem.backend.dynamic_bumps());
        }
        Ok(())
    }

    fn check_factorized(&self, mem: &LinsolMemory, x: &[f64], nrhs: usize) -> LinsolResult<()> {
        if !mem.factorized {
            return Err(LinsolError::NotFactorized);
        }
        self.check_len("right-hand side", x.len(), self.neq() * nrhs)
    }

    /// Overwrite `x` (n x nrhs, column major) with `A \ x`, or `Aᵀ \ x`.
    pub fn solve(&self, mem: &mut LinsolMemory, x: &mut [f64], nrhs: usize, tr: bool) -> LinsolResult<()> {
        self.check_factorized(mem, x, nrhs)?;
        if self.neq() == 0 {
            return Ok(());
        }
        mem.backend.solve(x, nrhs, tr)
    }

    /// Solve with the triangular factor only, see [`LinsolBackend::solve_l`].
    pub fn solve_l(&self, mem: &mut LinsolMemory, x: &mut [f64], nrhs: usize, tr: bool) -> LinsolResult<()> {
        self.check_factorized(mem, x, nrhs)?;
        if self.neq() == 0 {
            return Ok(());
        }
        mem.backend.solve_l(x, nrhs, tr)
    }

    /// Pattern of the Cholesky factor; available after symbolic analysis.
    pub fn cholesky_sparsity(&self, mem: &mut LinsolMemory, tr: bool) -> LinsolResult<Sparsity> {
        if !mem.analyzed {
            mem.backend.symbolic_factorization(&self.sparsity)?;
            mem.analyzed = true;
        }
        mem.backend.cholesky_sparsity(tr)
    }

    /// Values of the Cholesky factor on [`cholesky_sparsity`](Self::cholesky_sparsity).
    pub fn cholesky(&self, mem: &LinsolMemory, tr: bool) -> LinsolResult<Vec<f64>> {
        if !mem.factorized {
            return Err(LinsolError::NotFactorized);
        }
        mem.backend.cholesky(tr)
    }

    /// Evaluate `x = A \ b`.
    ///
    /// A missing `a` fills `x` with NaN; a missing `b` means a zero
    /// right-hand side and fills `x` with zeros without factorizing.
    pub fn eval(&self, mem: &mut LinsolMemory, a: Option<&[f64]>, b: Option<&[f64]>, x: &mut [f64]) -> LinsolResult<()> {
        self.check_len("X", x.len(), self.neq() * self.nrhs)?;
        let Some(a) = a else {
            x.fill(f64::NAN);
            return Ok(());
        };
        let Some(b) = b else {
            x.fill(0.0);
            return Ok(());
        };
        self.check_len("B", b.len(), x.len())?;
        self.factorize(mem, a)?;
        x.copy_from_slice(b);
        self.solve(mem, x, self.nrhs, false)
    }

    // ------------------------------------------------------------------
    // Dependency propagation
    // ------------------------------------------------------------------

    /// Structural solve: OR into `x` the bits of `b` that can reach each
    /// unknown of `A x = b` (or `Aᵀ x = b`).
    ///
    /// Works block by block over the block triangular form; `x` and `b`
    /// hold one entry per equation.
    pub fn spsolve(&self, x: &mut [Bvec], b: &[Bvec], tr: bool) -> LinsolResult<()> {
        let n = self.neq();
        self.check_len("spsolve x", x.len(), n)?;
        self.check_len("spsolve b", b.len(), n)?;
        let sp = &self.sparsity;
        let d = &self.btf;

        if !tr {
            // Equations of later blocks collect what earlier blocks feed them
            let mut row_dep = b.to_vec();
            for blk in 0..d.nblocks() {
                let mut block_dep: Bvec = 0;
                for &r in &d.rowperm[d.rowblock[blk]..d.rowblock[blk + 1]] {
                    block_dep |= row_dep[r];
                }
                let cols = &d.colperm[d.colblock[blk]..d.colblock[blk + 1]];
                for &c in cols {
                    block_dep |= x[c];
                }
                for &c in cols {
                    x[c] |= block_dep;
                    for &r in sp.col_rows(c) {
                        row_dep[r] |= block_dep;
                    }
                }
            }
        } else {
            for blk in (0..d.nblocks()).rev() {
                let mut block_dep: Bvec = 0;
                for &c in &d.colperm[d.colblock[blk]..d.colblock[blk + 1]] {
                    block_dep |= b[c];
                    for &r in sp.col_rows(c) {
                        block_dep |= x[r];
                    }
                }
                for &r in &d.rowperm[d.rowblock[blk]..d.rowblock[blk + 1]] {
                    x[r] |= block_dep;
                }
            }
        }
        Ok(())
    }

    /// Forward propagation through `X = A \ B`: `x` receives, per column,
    /// the bits of `b` and of the nonzeros of `a`.
    pub fn sp_forward(&self, b: &[Bvec], a: &[Bvec], x: &mut [Bvec], tr: bool) -> LinsolResult<()> {
        let n = self.neq();
        self.check_len("B", b.len(), n * self.nrhs)?;
        self.check_len("A", a.len(), self.sparsity.nnz())?;
        self.check_len("X", x.len(), n * self.nrhs)?;

        // A nonzero at (r, c) enters equation r, or equation c transposed
        let mut a_dep = vec![0; n];
        for c in 0..n {
            for k in self.sparsity.colind()[c]..self.sparsity.colind()[c + 1] {
                a_dep[if tr { c } else { self.sparsity.row()[k] }] |= a[k];
            }
        }
        let mut tmp = vec![0; n];
        for (bcol, xcol) in b.chunks(n.max(1)).zip(x.chunks_mut(n.max(1))) {
            for i in 0..n {
                tmp[i] = bcol[i] | a_dep[i];
            }
            xcol.fill(0);
            self.spsolve(xcol, &tmp, tr)?;
        }
        Ok(())
    }

    /// Reverse propagation through `X = A \ B`: the bits of `x` move onto
    /// `b` and the nonzeros of `a`, and `x` is cleared.
    pub fn sp_reverse(&self, b: &mut [Bvec], a: &mut [Bvec], x: &mut [Bvec], tr: bool) -> LinsolResult<()> {
        let n = self.neq();
        self.check_len("B", b.len(), n * self.nrhs)?;
        self.check_len("A", a.len(), self.sparsity.nnz())?;
        self.check_len("X", x.len(), n * self.nrhs)?;

        let mut tmp = vec![0; n];
        for (bcol, xcol) in b.chunks_mut(n.max(1)).zip(x.chunks_mut(n.max(1))) {
            tmp.fill(0);
            self.spsolve(&mut tmp, xcol, !tr)?;
            xcol.fill(0);
            for i in 0..n {
                bcol[i] |= tmp[i];
            }
            for c in 0..n {
                for k in self.sparsity.colind()[c]..self.sparsity.colind()[c + 1] {
                    a[k] |= tmp[if tr { c } else { self.sparsity.row()[k] }];
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Derivatives
    // ------------------------------------------------------------------

    /// Forward derivatives of `X = A \ B` at the solution `x`.
    ///
    /// Direction `d` yields `A \ (B̂ - Â X)` (`Aᵀ` and `Âᵀ` when `tr`); all
    /// directions are solved together with one multi-column solve against
    /// the factorization held by `mem`.
    pub fn forward(
        &self,
        mem: &mut LinsolMemory,
        a: &[f64],
        x: &[f64],
        seeds: &[LinsolSeed],
        tr: bool,
    ) -> LinsolResult<Vec<Vec<f64>>> {
        let n = self.neq();
        let block = n * self.nrhs;
        self.check_len("A", a.len(), self.sparsity.nnz())?;
        self.check_len("X", x.len(), block)?;

        let mut rhs = Vec::with_capacity(block * seeds.len());
        for seed in seeds {
            self.check_len("seed B", seed.b.len(), block)?;
            self.check_len("seed A", seed.a.len(), self.sparsity.nnz())?;
            let start = rhs.len();
            rhs.extend_from_slice(&seed.b);
            for (rcol, xcol) in rhs[start..].chunks_mut(n.max(1)).zip(x.chunks(n.max(1))) {
                if tr {
                    numeric::spmv_transpose(&self.sparsity, &seed.a, xcol, rcol, -1.0, 1.0);
                } else {
                    numeric::spmv(&self.sparsity, &seed.a, xcol, rcol, -1.0, 1.0);
                }
            }
        }
        if !seeds.is_empty() {
            self.solve(mem, &mut rhs, self.nrhs * seeds.len(), tr)?;
        }
        Ok((0..seeds.len()).map(|d| rhs[d * block..(d + 1) * block].to_vec()).collect())
    }

    /// Reverse derivatives of `X = A \ B` at the solution `x`.
    ///
    /// For every adjoint seed `X̄`, `Z = A⁻ᵀ X̄` (`A⁻¹ X̄` when `tr`) is added
    /// to the `B` accumulator and `-Z Xᵀ` (`-X Zᵀ` when `tr`), restricted to
    /// the pattern of `A`, to the `A` accumulator. The seeds are solved
    /// together.
    pub fn reverse(
        &self,
        mem: &mut LinsolMemory,
        x: &[f64],
        seeds: &[Vec<f64>],
        sens: &mut [LinsolAdjoint],
        tr: bool,
    ) -> LinsolResult<()> {
        let n = self.neq();
        let block = n * self.nrhs;
        self.check_len("X", x.len(), block)?;
        if sens.len() != seeds.len() {
            return Err(LinsolError::invalid(format!(
                "{} adjoint seeds but {} accumulators",
                seeds.len(),
                sens.len()
            )));
        }

        let mut rhs = Vec::with_capacity(block * seeds.len());
        for seed in seeds {
            self.check_len("adjoint seed", seed.len(), block)?;
            rhs.extend_from_slice(seed);
        }
        for s in sens.iter() {
            self.check_len("B accumulator", s.b.len(), block)?;
            self.check_len("A accumulator", s.a.len(), self.sparsity.nnz())?;
        }
        if seeds.is_empty() {
            return Ok(());
        }
        self.solve(mem, &mut rhs, self.nrhs * seeds.len(), !tr)?;

        for (z, s) in rhs.chunks(block.max(1)).zip(sens.iter_mut()) {
            for (acc, v) in s.b.iter_mut().zip(z) {
                *acc += v;
            }
            if tr {
                numeric::add_outer_on_pattern(&self.sparsity, x, z, self.nrhs, -1.0, &mut s.a);
            } else {
                numeric::add_outer_on_pattern(&self.sparsity, z, x, self.nrhs, -1.0, &mut s.a);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lower2() -> Sparsity {
        Sparsity::triplet(2, 2, &[0, 1, 1], &[0, 0, 1]).unwrap()
    }

    #[test]
    fn test_rejects_non_square() {
        let err = Linsol::new("lu", &Sparsity::dense(2, 3), 1).unwrap_err();
        assert!(matches!(err, LinsolError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejects_zero_rhs_and_unknown_backend() {
        assert!(matches!(Linsol::new("lu", &lower2(), 0), Err(LinsolError::InvalidArgument(_))));
        assert!(matches!(Linsol::new("nope", &lower2(), 1), Err(LinsolError::UnknownBackend(_))));
    }

    #[test]
    fn test_io_sparsities() {
        let linsol = Linsol::new("lu", &lower2(), 3).unwrap();
        assert_eq!(linsol.sparsity_in(LinsolInput::A), lower2());
        assert_eq!(linsol.sparsity_in(LinsolInput::B), Sparsity::dense(2, 3));
        assert_eq!(linsol.sparsity_out(), Sparsity::dense(2, 3));
        assert_eq!(linsol.neq(), 2);
    }

    #[test]
    fn test_spsolve_lower_and_upper() {
        let lower = Linsol::new("lu", &lower2(), 1).unwrap();
        let mut x = [0; 2];
        lower.spsolve(&mut x, &[1, 0], false).unwrap();
        assert_eq!(x, [1, 1]);

        let upper = Linsol::new("lu", &lower2().t(), 1).unwrap();
        let mut x = [0; 2];
        upper.spsolve(&mut x, &[1, 0], false).unwrap();
        assert_eq!(x, [1, 0]);

        // Transposed lower behaves like upper
        let mut x = [0; 2];
        lower.spsolve(&mut x, &[1, 0], true).unwrap();
        assert_eq!(x, [1, 0]);
    }

    #[test]
    fn test_solve_requires_factorization() {
        let linsol = Linsol::new("lu", &lower2(), 1).unwrap();
        let mut mem = linsol.memory().unwrap();
        let mut x = vec![1.0, 2.0];
        assert_eq!(linsol.solve(&mut mem, &mut x, 1, false), Err(LinsolError::NotFactorized));
        assert!(!mem.is_factorized());
    }

    #[test]
    fn test_factorize_rejects_non_finite() {
        let linsol = Linsol::new("lu", &lower2(), 1).unwrap();
        let mut mem = linsol.memory().unwrap();
        let err = linsol.factorize(&mut mem, &[1.0, f64::NAN, 1.0]);
        assert!(matches!(err, Err(LinsolError::InvalidArgument(_))));
        assert!(linsol.factorize(&mut mem, &[1.0, 2.0]).is_err());
        linsol.factorize(&mut mem, &[1.0, 2.0, 1.0]).unwrap();
        assert!(mem.is_factorized());
    }
}
