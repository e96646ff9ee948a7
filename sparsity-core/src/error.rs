//! Error types for sparsity pattern construction and analysis.

use thiserror::Error;

/// Errors raised at the pattern API boundary.
///
/// Every failing operation leaves the caller's patterns untouched: patterns
/// are immutable, so a failure simply means no new pattern was produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SparsityError {
    /// Malformed shape, offset list, index array or serialized buffer
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Index query outside the valid range (after negative wrap-around)
    #[error("Index {index} out of range for dimension {len}")]
    OutOfRange {
        /// Index as supplied by the caller
        index: isize,
        /// Size of the indexed dimension
        len: usize,
    },

    /// Incompatible shapes in an algebraic or concatenation operation
    #[error("Dimension mismatch in {op}: {lhs:?} vs {rhs:?}")]
    DimensionMismatch {
        /// Operation name
        op: &'static str,
        /// Shape of the left operand (rows, cols)
        lhs: (usize, usize),
        /// Shape of the right operand (rows, cols)
        rhs: (usize, usize),
    },

    /// A symmetric-only algorithm was given an asymmetric pattern
    #[error("{0} requires a symmetric pattern")]
    NotSymmetric(&'static str),
}

/// Result type for pattern operations.
pub type SparsityResult<T> = Result<T, SparsityError>;

impl SparsityError {
    pub(crate) fn mismatch(op: &'static str, lhs: (usize, usize), rhs: (usize, usize)) -> Self {
        SparsityError::DimensionMismatch { op, lhs, rhs }
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        SparsityError::InvalidArgument(msg.into())
    }
}
