//! Capability interface implemented by every concrete solver.

use sparsity_core::Sparsity;

use crate::error::{LinsolError, LinsolResult};
use crate::settings::LinsolSettings;

/// A concrete linear solver.
///
/// The caller drives the two phases: `symbolic_factorization` once per
/// pattern, then `numeric_factorization` for every new set of values of
/// that pattern. `solve` works in place on `nrhs` column-major right-hand
/// sides and uses the most recent numeric factorization.
///
/// The triangular operations are optional; the defaults report
/// [`LinsolError::Unsupported`].
pub trait LinsolBackend: Send {
    /// Registered name, used in diagnostics.
    fn name(&self) -> &str;

    /// Analyze the pattern; values are not available yet.
    fn symbolic_factorization(&mut self, sparsity: &Sparsity) -> LinsolResult<()>;

    /// Factorize `nonzeros` laid out on `sparsity`.
    fn numeric_factorization(&mut self, sparsity: &Sparsity, nonzeros: &[f64]) -> LinsolResult<()>;

    /// Overwrite `x` (n x nrhs, column major) with `A \ x`, or `Aᵀ \ x`.
    fn solve(&mut self, x: &mut [f64], nrhs: usize, tr: bool) -> LinsolResult<()>;

    /// Solve with the triangular factor only: `L \ x`, or `Lᵀ \ x`.
    fn solve_l(&mut self, _x: &mut [f64], _nrhs: usize, _tr: bool) -> LinsolResult<()> {
        Err(LinsolError::unsupported(self.name(), "solve_l"))
    }

    /// Pattern of the lower Cholesky factor `L` of the reordered matrix,
    /// diagonal included, or of `Lᵀ` when `tr` is set.
    fn cholesky_sparsity(&self, _tr: bool) -> LinsolResult<Sparsity> {
        Err(LinsolError::unsupported(self.name(), "cholesky_sparsity"))
    }

    /// Values of the Cholesky factor on [`cholesky_sparsity`](Self::cholesky_sparsity).
    fn cholesky(&self, _tr: bool) -> LinsolResult<Vec<f64>> {
        Err(LinsolError::unsupported(self.name(), "cholesky"))
    }

    /// Number of pivots replaced by dynamic regularization in the last factorization.
    fn dynamic_bumps(&self) -> u64 {
        0
    }
}

/// Creates a fresh backend instance for one solver memory.
pub type BackendConstructor = fn(&LinsolSettings) -> Box<dyn LinsolBackend>;
