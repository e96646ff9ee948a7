//! Sparse LDLᵀ backend built on the `ldl` crate.
//!
//! The matrix is reordered with AMD (optional), then its upper triangle is
//! factorized as `P A Pᵀ = L D Lᵀ`. Symbolic analysis (ordering, elimination
//! tree, column counts) runs once per pattern; every numeric factorization
//! reuses it.
//!
//! Registered twice: `"ldl"` accepts any quasi-definite matrix and applies
//! optional static and dynamic regularization, `"cholesky"` requires a
//! positive definite matrix and additionally exposes the Cholesky factor
//! `L √D` through `solve_l`, `cholesky_sparsity` and `cholesky`.

use sparsity_core::Sparsity;

use crate::backend::LinsolBackend;
use crate::error::{LinsolError, LinsolResult};
use crate::numeric;
use crate::settings::{diagnostics_enabled, LinsolSettings};

/// Symbolic analysis of one pattern.
struct LdlSymbolic {
    /// Row/column `i` of the reordered matrix is `perm[i]` of the original
    perm: Vec<usize>,
    /// Upper triangle (with diagonal) of the reordered matrix
    upper: Sparsity,
    /// Nonzero of the original matrix feeding each nonzero of `upper`
    source: Vec<usize>,
    diag_positions: Vec<Option<usize>>,
    etree: Vec<Option<usize>>,
    l_nz: Vec<usize>,
    /// Pattern of L with its diagonal, in the reordered numbering
    l_pattern: Sparsity,
}

struct LdlFactorData {
    l_p: Vec<usize>,
    l_i: Vec<usize>,
    l_x: Vec<f64>,
    d: Vec<f64>,
    d_inv: Vec<f64>,
}

/// Sparse LDLᵀ / Cholesky solver.
pub struct SparseLdl {
    positive_definite: bool,
    amd: bool,
    static_reg: f64,
    dynamic_reg_min_pivot: f64,
    dynamic_bumps: u64,

    n: usize,
    symbolic: Option<LdlSymbolic>,
    factorization: Option<LdlFactorData>,

    // Workspaces
    a_x_work: Vec<f64>,
    bwork: Vec<ldl::Marker>,
    iwork: Vec<usize>,
    fwork: Vec<f64>,
    rhs_work: Vec<f64>,
}

impl SparseLdl {
    /// Create a solver; `positive_definite` selects the Cholesky variant.
    pub fn new(settings: &LinsolSettings, positive_definite: bool) -> Self {
        Self {
            positive_definite,
            amd: settings.amd,
            static_reg: settings.static_reg.max(0.0),
            dynamic_reg_min_pivot: settings.dynamic_reg_min_pivot.max(0.0),
            dynamic_bumps: 0,
            n: 0,
            symbolic: None,
            factorization: None,
            a_x_work: Vec::new(),
            bwork: Vec::new(),
            iwork: Vec::new(),
            fwork: Vec::new(),
            rhs_work: Vec::new(),
        }
    }

    pub fn boxed_ldl(settings: &LinsolSettings) -> Box<dyn LinsolBackend> {
        Box::new(Self::new(settings, false))
    }

    pub fn boxed_cholesky(settings: &LinsolSettings) -> Box<dyn LinsolBackend> {
        Box::new(Self::new(settings, true))
    }

    /// Diagonal D of the most recent factorization.
    pub fn d_values(&self) -> Option<&[f64]> {
        self.factorization.as_ref().map(|f| f.d.as_slice())
    }

    fn require_cholesky(&self, operation: &'static str) -> LinsolResult<()> {
        if !self.positive_definite {
            return Err(LinsolError::unsupported(self.name(), operation));
        }
        Ok(())
    }

    fn failure(&self, message: impl Into<String>) -> LinsolError {
        LinsolError::BackendFailure {
            backend: self.name().to_string(),
            message: message.into(),
        }
    }

    fn check_rhs(&self, x: &[f64], nrhs: usize) -> LinsolResult<()> {
        if x.len() != self.n * nrhs {
            return Err(LinsolError::invalid(format!(
                "right-hand side holds {} values, expected {}x{}",
                x.len(),
                self.n,
                nrhs
            )));
        }
        Ok(())
    }

    fn parts(&self) -> LinsolResult<(&LdlSymbolic, &LdlFactorData)> {
        match (&self.symbolic, &self.factorization) {
            (Some(sym), Some(f)) => Ok((sym, f)),
            _ => Err(LinsolError::NotFactorized),
        }
    }
}

impl LinsolBackend for SparseLdl {
    fn name(&self) -> &str {
        if self.positive_definite {
            "cholesky"
        } else {
            "ldl"
        }
    }

    fn symbolic_factorization(&mut self, sparsity: &Sparsity) -> LinsolResult<()> {
        if !sparsity.is_square() {
            return Err(LinsolError::DimensionMismatch {
                op: "symbolic_factorization",
                expected: (sparsity.nrow(), sparsity.nrow()),
                got: sparsity.shape(),
            });
        }
        let n = sparsity.nrow();

        // Symmetry is checked here; lt is the strictly upper Lᵀ of A(perm, perm)
        let (lt, perm) = sparsity.ldl(self.amd)?;
        let (permuted, to_original) = sparsity.sub(&perm, &perm)?;
        let (upper, to_permuted) = permuted.triu_with_mapping(true);
        let source: Vec<usize> = to_permuted.iter().map(|&k| to_original[k]).collect();

        let diag_positions: Vec<Option<usize>> = (0..n)
            .map(|c| {
                upper
                    .col_rows(c)
                    .binary_search(&c)
                    .ok()
                    .map(|offset| upper.colind()[c] + offset)
            })
            .collect();

        let mut work = vec![0; n];
        let mut l_nz = vec![0; n];
        let mut etree = vec![None; n];
        if ldl::etree(n, upper.colind(), upper.row(), &mut work, &mut l_nz, &mut etree).is_err() {
            return Err(self.failure("elimination tree failed"));
        }
        debug_assert_eq!(l_nz.iter().sum::<usize>(), lt.nnz());

        let l_pattern = lt.t().unite(&Sparsity::diag(n))?;
        log::debug!(
            "{}: symbolic analysis n={} nnz(A)={} nnz(L)={} amd={}",
            self.name(),
            n,
            sparsity.nnz(),
            l_pattern.nnz(),
            self.amd
        );

        self.n = n;
        self.a_x_work = vec![0.0; upper.nnz()];
        self.bwork = vec![ldl::Marker::Unused; n];
        self.iwork = vec![0; 3 * n];
        self.fwork = vec![0.0; n];
        self.rhs_work = vec![0.0; n];
        self.factorization = None;
        self.symbolic = Some(LdlSymbolic {
            perm,
            upper,
            source,
            diag_positions,
            etree,
            l_nz,
            l_pattern,
        });
        Ok(())
    }

    fn numeric_factorization(&mut self, sparsity: &Sparsity, nonzeros: &[f64]) -> LinsolResult<()> {
        if self.symbolic.is_none() {
            self.symbolic_factorization(sparsity)?;
        }
        numeric::check_nonzeros(sparsity, nonzeros)?;
        let n = self.n;
        let name = self.name().to_string();
        let Some(sym) = self.symbolic.as_ref() else {
            return Err(LinsolError::NotFactorized);
        };

        for (dst, &k) in self.a_x_work.iter_mut().zip(&sym.source) {
            *dst = nonzeros[k];
        }
        if self.static_reg > 0.0 {
            for idx in sym.diag_positions.iter().flatten() {
                self.a_x_work[*idx] += self.static_reg;
            }
        }
        let a_p = sym.upper.colind();
        let a_i = sym.upper.row();
        let a_x = &self.a_x_work[..];

        let nnz_l: usize = sym.l_nz.iter().sum();
        let f = self.factorization.get_or_insert_with(|| LdlFactorData {
            l_p: Vec::new(),
            l_i: Vec::new(),
            l_x: Vec::new(),
            d: Vec::new(),
            d_inv: Vec::new(),
        });
        f.l_p.resize(n + 1, 0);
        f.l_i.resize(nnz_l, 0);
        f.l_x.resize(nnz_l, 0.0);
        f.d.resize(n, 0.0);
        f.d_inv.resize(n, 0.0);

        // Reset workspaces (ldl expects clean markers)
        self.bwork.fill(ldl::Marker::Unused);
        self.iwork.fill(0);
        self.fwork.fill(0.0);

        let result = ldl::factor(
            n,
            a_p,
            a_i,
            a_x,
            &mut f.l_p,
            &mut f.l_i,
            &mut f.l_x,
            &mut f.d,
            &mut f.d_inv,
            &sym.l_nz,
            &sym.etree,
            &mut self.bwork,
            &mut self.iwork,
            &mut self.fwork,
        );
        if result.is_err() {
            self.factorization = None;
            return Err(LinsolError::NumericallySingular(format!("{}: zero pivot", name)));
        }

        if self.positive_definite {
            let bad_pivot = f.d.iter().copied().enumerate().find(|&(_, d)| !(d > 0.0));
            if let Some((i, d)) = bad_pivot {
                self.factorization = None;
                return Err(LinsolError::NumericallySingular(format!(
                    "matrix is not positive definite: pivot {} is {:.3e}",
                    i, d
                )));
            }
        } else if self.dynamic_reg_min_pivot > 0.0 {
            let replacement = (self.dynamic_reg_min_pivot * 2e6).min(1e-6);
            self.dynamic_bumps = 0;
            for i in 0..n {
                if f.d[i].abs() < self.dynamic_reg_min_pivot {
                    f.d[i] = if f.d[i] >= 0.0 { replacement } else { -replacement };
                    f.d_inv[i] = 1.0 / f.d[i];
                    self.dynamic_bumps += 1;
                }
            }
        }

        if diagnostics_enabled() {
            let min_d = f.d.iter().map(|d| d.abs()).fold(f64::INFINITY, f64::min);
            log::debug!(
                "{}: factorized n={} nnz(L)={} min|d|={:.3e} bumps={}",
                name,
                n,
                nnz_l,
                min_d,
                self.dynamic_bumps
            );
        }
        Ok(())
    }

    fn solve(&mut self, x: &mut [f64], nrhs: usize, _tr: bool) -> LinsolResult<()> {
        self.check_rhs(x, nrhs)?;
        let n = self.n;
        let mut t = std::mem::take(&mut self.rhs_work);
        let result = self.parts().map(|(sym, f)| {
            for col in x.chunks_mut(n.max(1)).take(nrhs) {
                for (i, &p) in sym.perm.iter().enumerate() {
                    t[i] = col[p];
                }
                ldl::solve(n, &f.l_p, &f.l_i, &f.l_x, &f.d_inv, &mut t);
                for (i, &p) in sym.perm.iter().enumerate() {
                    col[p] = t[i];
                }
            }
        });
        self.rhs_work = t;
        result
    }

    fn solve_l(&mut self, x: &mut [f64], nrhs: usize, tr: bool) -> LinsolResult<()> {
        self.require_cholesky("solve_l")?;
        self.check_rhs(x, nrhs)?;
        let n = self.n;
        let mut t = std::mem::take(&mut self.rhs_work);
        let result = self.parts().map(|(sym, f)| {
            for col in x.chunks_mut(n.max(1)).take(nrhs) {
                if !tr {
                    // t = (L √D)⁻¹ P x
                    for (i, &p) in sym.perm.iter().enumerate() {
                        t[i] = col[p];
                    }
                    for j in 0..n {
                        for k in f.l_p[j]..f.l_p[j + 1] {
                            t[f.l_i[k]] -= f.l_x[k] * t[j];
                        }
                    }
                    for j in 0..n {
                        col[j] = t[j] / f.d[j].sqrt();
                    }
                } else {
                    // x = Pᵀ (L √D)⁻ᵀ x
                    for j in 0..n {
                        t[j] = col[j] / f.d[j].sqrt();
                    }
                    for j in (0..n).rev() {
                        for k in f.l_p[j]..f.l_p[j + 1] {
                            t[j] -= f.l_x[k] * t[f.l_i[k]];
                        }
                    }
                    for (i, &p) in sym.perm.iter().enumerate() {
                        col[p] = t[i];
                    }
                }
            }
        });
        self.rhs_work = t;
        result
    }

    fn cholesky_sparsity(&self, tr: bool) -> LinsolResult<Sparsity> {
        self.require_cholesky("cholesky_sparsity")?;
        let sym = self.symbolic.as_ref().ok_or(LinsolError::NotFactorized)?;
        Ok(if tr { sym.l_pattern.t() } else { sym.l_pattern.clone() })
    }

    fn cholesky(&self, tr: bool) -> LinsolResult<Vec<f64>> {
        self.require_cholesky("cholesky")?;
        let (sym, f) = self.parts()?;
        let pattern = &sym.l_pattern;
        let mut values = vec![0.0; pattern.nnz()];
        for j in 0..self.n {
            let s = f.d[j].sqrt();
            let rows = pattern.col_rows(j);
            let base = pattern.colind()[j];
            let mut place = |r: usize, v: f64| -> LinsolResult<()> {
                let offset = rows
                    .binary_search(&r)
                    .map_err(|_| self.failure(format!("factor entry ({}, {}) outside symbolic pattern", r, j)))?;
                values[base + offset] = v;
                Ok(())
            };
            place(j, s)?;
            for k in f.l_p[j]..f.l_p[j + 1] {
                place(f.l_i[k], f.l_x[k] * s)?;
            }
        }
        if !tr {
            return Ok(values);
        }
        let (_, mapping) = pattern.transpose_with_mapping(false);
        Ok(mapping.iter().map(|&k| values[k]).collect())
    }

    fn dynamic_bumps(&self) -> u64 {
        self.dynamic_bumps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Symmetric positive definite arrowhead with the hub first.
    fn arrow() -> (Sparsity, Vec<f64>) {
        let n = 5;
        let mut rows = vec![];
        let mut cols = vec![];
        for i in 0..n {
            rows.push(i);
            cols.push(i);
            if i > 0 {
                rows.extend([0, i]);
                cols.extend([i, 0]);
            }
        }
        let sp = Sparsity::triplet(n, n, &rows, &cols).unwrap();
        let col = sp.get_col();
        let nz = sp
            .row()
            .iter()
            .zip(&col)
            .map(|(&r, &c)| if r == c { 10.0 } else { 1.0 + (r + c) as f64 * 0.1 })
            .collect();
        (sp, nz)
    }

    fn residual(sp: &Sparsity, nz: &[f64], x: &[f64], b: &[f64]) -> f64 {
        let mut ax = vec![0.0; b.len()];
        numeric::spmv(sp, nz, x, &mut ax, 1.0, 0.0);
        ax.iter().zip(b).map(|(a, b)| (a - b).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn test_ldl_solves_with_and_without_amd() {
        let (sp, nz) = arrow();
        let b = [1.0, -2.0, 3.0, 0.5, 4.0];
        for amd in [false, true] {
            let settings = LinsolSettings::default().with_amd(amd);
            let mut solver = SparseLdl::new(&settings, false);
            solver.symbolic_factorization(&sp).unwrap();
            solver.numeric_factorization(&sp, &nz).unwrap();
            let mut x = b.to_vec();
            solver.solve(&mut x, 1, false).unwrap();
            assert!(residual(&sp, &nz, &x, &b) < 1e-12, "amd={}", amd);
        }
    }

    #[test]
    fn test_amd_avoids_fill() {
        let (sp, _) = arrow();
        let mut plain = SparseLdl::new(&LinsolSettings::default().with_amd(false), true);
        plain.symbolic_factorization(&sp).unwrap();
        let mut ordered = SparseLdl::new(&LinsolSettings::default().with_amd(true), true);
        ordered.symbolic_factorization(&sp).unwrap();
        let dense_l = plain.cholesky_sparsity(false).unwrap();
        let sparse_l = ordered.cholesky_sparsity(false).unwrap();
        assert_eq!(dense_l.nnz(), 15);
        assert_eq!(sparse_l.nnz(), 9);
    }

    #[test]
    fn test_indefinite_needs_ldl() {
        // [[1, 2], [2, 1]] has eigenvalues 3 and -1
        let sp = Sparsity::dense(2, 2);
        let nz = [1.0, 2.0, 2.0, 1.0];
        let mut ldl = SparseLdl::new(&LinsolSettings::default(), false);
        ldl.numeric_factorization(&sp, &nz).unwrap();
        let mut x = vec![3.0, 3.0];
        ldl.solve(&mut x, 1, false).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12 && (x[1] - 1.0).abs() < 1e-12);

        let mut chol = SparseLdl::new(&LinsolSettings::default(), true);
        let err = chol.numeric_factorization(&sp, &nz);
        assert!(matches!(err, Err(LinsolError::NumericallySingular(_))));
    }

    #[test]
    fn test_rejects_asymmetric_pattern() {
        let mut ldl = SparseLdl::new(&LinsolSettings::default(), false);
        let err = ldl.symbolic_factorization(&Sparsity::lower(3));
        assert!(matches!(err, Err(LinsolError::Sparsity(_))));
    }

    #[test]
    fn test_cholesky_factor_reproduces_matrix() {
        let (sp, nz) = arrow();
        let mut chol = SparseLdl::new(&LinsolSettings::default().with_amd(false), true);
        chol.numeric_factorization(&sp, &nz).unwrap();
        let l_sp = chol.cholesky_sparsity(false).unwrap();
        let l = numeric::to_dense(&l_sp, &chol.cholesky(false).unwrap());
        let lt = numeric::to_dense(&l_sp.t(), &chol.cholesky(true).unwrap());
        assert_eq!(l.transpose(), lt);
        // Without reordering, L Lᵀ is A itself
        let a = numeric::to_dense(&sp, &nz);
        assert!((&l * &lt - a).amax() < 1e-12);
    }

    #[test]
    fn test_triangular_ops_only_on_cholesky() {
        let (sp, nz) = arrow();
        let mut ldl = SparseLdl::new(&LinsolSettings::default(), false);
        ldl.numeric_factorization(&sp, &nz).unwrap();
        let mut x = vec![1.0; 5];
        assert!(matches!(ldl.solve_l(&mut x, 1, false), Err(LinsolError::Unsupported { .. })));
        assert!(matches!(ldl.cholesky_sparsity(false), Err(LinsolError::Unsupported { .. })));
    }

    #[test]
    fn test_static_regularization_shifts_diagonal() {
        let sp = Sparsity::diag(2);
        let mut ldl = SparseLdl::new(&LinsolSettings::default().with_static_reg(1.0).with_amd(false), false);
        ldl.numeric_factorization(&sp, &[1.0, 3.0]).unwrap();
        assert_eq!(ldl.d_values().unwrap(), &[2.0, 4.0]);
    }
}
