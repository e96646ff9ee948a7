//! Linear solvers over interned sparsity patterns
//!
//! [`Linsol`] represents the operation `X = A \ B` for a fixed square,
//! structurally nonsingular pattern of `A`:
//!
//! - **Numeric evaluation** through pluggable backends looked up by name in
//!   a process-wide [`registry`]: dense `"lu"` and `"qr"`, sparse `"ldl"`
//!   and `"cholesky"`
//! - **Dependency propagation** over the block triangular form of the
//!   pattern ([`Linsol::spsolve`], [`Linsol::sp_forward`],
//!   [`Linsol::sp_reverse`]), without any arithmetic
//! - **Derivative rules** for forward and adjoint sensitivities
//!
//! # Example
//!
//! ```
//! use sparsity_core::Sparsity;
//! use sparsity_linsol::Linsol;
//!
//! // [[2, 0], [1, 4]]
//! let sp = Sparsity::triplet(2, 2, &[0, 1, 1], &[0, 0, 1]).unwrap();
//! let linsol = Linsol::new("lu", &sp, 1).unwrap();
//! let mut mem = linsol.memory().unwrap();
//!
//! let mut x = vec![0.0; 2];
//! let (a, b) = ([2.0, 1.0, 4.0], [2.0, 5.0]);
//! linsol.eval(&mut mem, Some(&a[..]), Some(&b[..]), &mut x).unwrap();
//! assert!((x[0] - 1.0).abs() < 1e-12 && (x[1] - 1.0).abs() < 1e-12);
//! ```

#![warn(clippy::all)]

pub mod backend;
pub mod backends;
pub mod error;
mod linsol;
pub mod numeric;
pub mod registry;
pub mod settings;

pub use backend::{BackendConstructor, LinsolBackend};
pub use error::{LinsolError, LinsolResult};
pub use linsol::{Linsol, LinsolAdjoint, LinsolInput, LinsolMemory, LinsolSeed};
pub use registry::{backend_names, create_backend, has_backend, register_backend};
pub use settings::{diagnostics_enabled, LinsolSettings};
