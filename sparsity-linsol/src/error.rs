//! Error types for the linear solver layer.

use sparsity_core::SparsityError;
use thiserror::Error;

/// Errors that can occur while constructing, factorizing or solving.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinsolError {
    /// Malformed input (bad lengths, zero right-hand sides, non-finite values)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Coefficient pattern is not square, or an operand has the wrong shape
    #[error("Dimension mismatch in {op}: expected {expected:?}, got {got:?}")]
    DimensionMismatch {
        /// Operation name
        op: &'static str,
        /// Required shape (rows, cols)
        expected: (usize, usize),
        /// Shape that was supplied
        got: (usize, usize),
    },

    /// Structural rank deficiency detected at construction
    #[error("Structurally singular matrix: sprank {rank} instead of {expected}")]
    SingularMatrix {
        /// Structural rank of the pattern
        rank: usize,
        /// Rank required for a nonsingular system
        expected: usize,
    },

    /// A backend found a zero (or too small) pivot
    #[error("Numerically singular matrix: {0}")]
    NumericallySingular(String),

    /// Solve requested before a successful factorization
    #[error("No factorization available, call factorize first")]
    NotFactorized,

    /// Opaque failure reported by a concrete backend
    #[error("Backend {backend} failed: {message}")]
    BackendFailure {
        /// Registered backend name
        backend: String,
        /// Backend diagnostic text
        message: String,
    },

    /// No backend registered under this name
    #[error("Unknown linear solver backend: {0}")]
    UnknownBackend(String),

    /// The backend does not implement this operation
    #[error("Backend {backend} does not support {operation}")]
    Unsupported {
        /// Registered backend name
        backend: String,
        /// Operation name
        operation: &'static str,
    },

    /// Error from the pattern layer
    #[error(transparent)]
    Sparsity(#[from] SparsityError),
}

/// Result type for linear solver operations.
pub type LinsolResult<T> = Result<T, LinsolError>;

impl LinsolError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        LinsolError::InvalidArgument(msg.into())
    }

    pub(crate) fn unsupported(backend: &str, operation: &'static str) -> Self {
        LinsolError::Unsupported {
            backend: backend.to_string(),
            operation,
        }
    }
}
