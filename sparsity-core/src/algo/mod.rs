//! Structural algorithms on sparsity patterns.

pub mod amd;
pub mod coloring;
pub mod dmperm;
pub mod etree;

pub use amd::AmdControl;
pub use coloring::ColoringOrdering;
pub use dmperm::{dfs, maxtrans, strongly_connected_components, Dmperm};
pub use etree::{column_counts, elimination_tree, postorder, QrSparsity, SymbolicFactor};

/// Unset marker in index work arrays.
pub(crate) const NONE: usize = usize::MAX;
