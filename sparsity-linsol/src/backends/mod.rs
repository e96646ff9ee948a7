//! Built-in solver backends.
//!
//! - `"lu"`, `"qr"`: dense factorizations through `nalgebra`, any
//!   nonsingular matrix
//! - `"ldl"`, `"cholesky"`: sparse LDLᵀ through the `ldl` crate with an
//!   optional AMD ordering, symmetric matrices only

pub mod dense;
pub mod sparse_ldl;

pub use dense::{DenseLu, DenseQr};
pub use sparse_ldl::SparseLdl;
