//! Sparsity: interned compressed-column sparsity patterns
//!
//! This crate describes *where* the nonzeros of a sparse matrix are, and
//! provides the structural algorithms that work on that information alone:
//!
//! - **Patterns**: immutable, shared [`Sparsity`] handles built by factory
//!   functions (dense, diagonal, banded, triplet, compressed buffers,
//!   concatenation) and transformed by pure operations (transpose, set
//!   algebra, slicing, permutation, products)
//! - **Interning**: equal patterns are the same instance process-wide, see
//!   [`cache`]
//! - **Structural analysis**: elimination trees, symbolic LDLᵀ and QR,
//!   approximate minimum degree, maximum matching, Dulmage-Mendelsohn and
//!   block triangular forms, structural rank
//! - **Colorings** for compressed Jacobian/Hessian evaluation
//! - **Bit-vector propagation** of dependency information through products
//!
//! # Example
//!
//! ```
//! use sparsity_core::Sparsity;
//!
//! let a = Sparsity::triplet(3, 3, &[0, 1, 2, 2], &[0, 1, 2, 0]).unwrap();
//! assert_eq!(a.nnz(), 4);
//! assert!(a.is_tril());
//! assert_eq!(a.sprank(), 3);
//!
//! // Equal patterns are shared
//! let b = Sparsity::triplet(3, 3, &[2, 0, 1, 2], &[0, 0, 1, 2]).unwrap();
//! assert!(Sparsity::ptr_eq(&a, &b));
//! ```

#![warn(clippy::all)]
#![allow(clippy::too_many_arguments)]

pub mod algo;
pub mod cache;
pub mod error;
mod pattern;
pub mod propagate;

pub use algo::{AmdControl, ColoringOrdering, Dmperm, QrSparsity, SymbolicFactor};
pub use cache::{cache_stats, purge_cache, CacheStats};
pub use error::{SparsityError, SparsityResult};
pub use pattern::{Sparsity, SparsityInfo, FROM_LHS, FROM_RHS};
pub use propagate::{mul_sparsity_fwd, mul_sparsity_rev, norm_0_mul, Bvec};
