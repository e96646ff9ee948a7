//! Configuration for linear solver instances.

use std::sync::OnceLock;

/// Process-wide diagnostics switch.
///
/// Reads `SPARSITY_VERBOSE` once; level 2 and above turns on
/// per-factorization diagnostics.
pub fn diagnostics_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| {
        std::env::var("SPARSITY_VERBOSE")
            .ok()
            .and_then(|v| v.parse::<u8>().ok())
            .map(|n| n >= 2)
            .unwrap_or(false)
    })
}

/// Linear solver settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LinsolSettings {
    // === Output ===
    /// Log construction and factorization at info level.
    pub verbose: bool,

    // === Input checks ===
    /// Reject NaN/Inf nonzeros at factorize time.
    pub check_finite: bool,

    // === Dense backends ===
    /// Relative pivot threshold below which a dense factorization is
    /// reported numerically singular.
    pub pivot_tol: f64,

    // === Sparse LDL backend ===
    /// Static regularization added to every diagonal entry.
    pub static_reg: f64,

    /// Pivots smaller than this in magnitude are bumped.
    /// Zero disables dynamic regularization.
    pub dynamic_reg_min_pivot: f64,

    /// Fill-reducing AMD ordering for the sparse backends.
    pub amd: bool,
}

impl Default for LinsolSettings {
    fn default() -> Self {
        Self {
            verbose: false,
            check_finite: true,
            pivot_tol: 1e-14,
            static_reg: 0.0,
            dynamic_reg_min_pivot: 0.0,
            amd: true,
        }
    }
}

impl LinsolSettings {
    /// Create settings with verbose output enabled.
    pub fn verbose() -> Self {
        Self {
            verbose: true,
            ..Self::default()
        }
    }

    /// Defaults overridden by `SPARSITY_*` environment variables.
    ///
    /// Recognized: `SPARSITY_VERBOSE` (level >= 1), `SPARSITY_CHECK_FINITE`,
    /// `SPARSITY_PIVOT_TOL`, `SPARSITY_STATIC_REG`,
    /// `SPARSITY_DYNAMIC_REG_MIN_PIVOT`, `SPARSITY_AMD`. Unparsable values
    /// are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut s = Self::default();
        if let Some(level) = lookup("SPARSITY_VERBOSE").and_then(|v| v.parse::<u8>().ok()) {
            s.verbose = level >= 1;
        }
        if let Some(v) = lookup("SPARSITY_CHECK_FINITE").and_then(|v| parse_flag(&v)) {
            s.check_finite = v;
        }
        if let Some(v) = lookup("SPARSITY_PIVOT_TOL").and_then(|v| v.parse().ok()) {
            s.pivot_tol = v;
        }
        if let Some(v) = lookup("SPARSITY_STATIC_REG").and_then(|v| v.parse().ok()) {
            s.static_reg = v;
        }
        if let Some(v) = lookup("SPARSITY_DYNAMIC_REG_MIN_PIVOT").and_then(|v| v.parse().ok()) {
            s.dynamic_reg_min_pivot = v;
        }
        if let Some(v) = lookup("SPARSITY_AMD").and_then(|v| parse_flag(&v)) {
            s.amd = v;
        }
        s
    }

    /// Set the static regularization.
    pub fn with_static_reg(mut self, static_reg: f64) -> Self {
        self.static_reg = static_reg;
        self
    }

    /// Enable or disable the AMD ordering.
    pub fn with_amd(mut self, amd: bool) -> Self {
        self.amd = amd;
        self
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
