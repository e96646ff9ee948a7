//! Property-based tests for pattern construction and algebra
//!
//! Random patterns are generated as coordinate lists and canonicalized
//! through `Sparsity::triplet`; the laws below must hold for all of them.

use proptest::prelude::*;
use sparsity_core::{norm_0_mul, Sparsity, SparsityInfo};

// ============================================================================
// Test Utilities
// ============================================================================

/// Random pattern with both dimensions in `1..=max_dim`.
fn pattern_strategy(max_dim: usize, max_nnz: usize) -> impl Strategy<Value = Sparsity> {
    (1..=max_dim, 1..=max_dim).prop_flat_map(move |(nrow, ncol)| {
        prop::collection::vec((0..nrow, 0..ncol), 0..=max_nnz).prop_map(move |entries| {
            let rows: Vec<usize> = entries.iter().map(|e| e.0).collect();
            let cols: Vec<usize> = entries.iter().map(|e| e.1).collect();
            Sparsity::triplet(nrow, ncol, &rows, &cols).unwrap()
        })
    })
}

/// Two random patterns of the same shape.
fn pattern_pair_strategy(max_dim: usize, max_nnz: usize) -> impl Strategy<Value = (Sparsity, Sparsity)> {
    (1..=max_dim, 1..=max_dim).prop_flat_map(move |(nrow, ncol)| {
        let entries = prop::collection::vec((0..nrow, 0..ncol), 0..=max_nnz);
        (entries.clone(), entries).prop_map(move |(ea, eb)| {
            let build = |e: &[(usize, usize)]| {
                let rows: Vec<usize> = e.iter().map(|x| x.0).collect();
                let cols: Vec<usize> = e.iter().map(|x| x.1).collect();
                Sparsity::triplet(nrow, ncol, &rows, &cols).unwrap()
            };
            (build(&ea), build(&eb))
        })
    })
}

// ============================================================================
// Canonical form and serialization
// ============================================================================

proptest! {
    /// Property: building from the same arrays yields the same instance
    #[test]
    fn prop_canonical_identity(sp in pattern_strategy(8, 30)) {
        let again = Sparsity::new(sp.nrow(), sp.ncol(), sp.colind().to_vec(), sp.row().to_vec()).unwrap();
        prop_assert!(Sparsity::ptr_eq(&sp, &again));
    }

    /// Property: compressed(compress(p)) == p
    #[test]
    fn prop_compress_roundtrip(sp in pattern_strategy(8, 40)) {
        let buf = sp.compress();
        let back = Sparsity::compressed(&buf).unwrap();
        prop_assert_eq!(back, sp);
    }

    /// Property: info survives a JSON round trip
    #[test]
    fn prop_info_json_roundtrip(sp in pattern_strategy(6, 20)) {
        let json = serde_json::to_string(&sp.info()).unwrap();
        let info: SparsityInfo = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(Sparsity::from_info(&info).unwrap(), sp);
    }

    /// Property: every triplet input maps to a slot holding its coordinates
    #[test]
    fn prop_triplet_mapping(entries in prop::collection::vec((0..5usize, 0..4usize), 0..20)) {
        let rows: Vec<usize> = entries.iter().map(|e| e.0).collect();
        let cols: Vec<usize> = entries.iter().map(|e| e.1).collect();
        let (sp, mapping) = Sparsity::triplet_with_mapping(5, 4, &rows, &cols, true).unwrap();
        let col_of = sp.get_col();
        for (k, &slot) in mapping.iter().enumerate() {
            prop_assert_eq!(sp.row()[slot], rows[k]);
            prop_assert_eq!(col_of[slot], cols[k]);
        }
    }
}

// ============================================================================
// Transpose and set algebra
// ============================================================================

proptest! {
    /// Property: transpose is an involution
    #[test]
    fn prop_transpose_involution(sp in pattern_strategy(8, 30)) {
        prop_assert_eq!(sp.t().t(), sp.clone());
        prop_assert!(sp.t().is_transpose(&sp));
    }

    /// Property: union and intersection are idempotent and bounded
    #[test]
    fn prop_union_intersection_laws((a, b) in pattern_pair_strategy(6, 20)) {
        prop_assert_eq!(a.unite(&a).unwrap(), a.clone());
        prop_assert_eq!(a.intersect(&a).unwrap(), a.clone());
        let u = a.unite(&b).unwrap();
        let i = a.intersect(&b).unwrap();
        prop_assert!(u.nnz() >= a.nnz().max(b.nnz()));
        prop_assert!(i.nnz() <= a.nnz().min(b.nnz()));
        prop_assert_eq!(u.nnz() + i.nnz(), a.nnz() + b.nnz());
        prop_assert_eq!((&a + &b).unwrap(), u);
        prop_assert_eq!((&a * &b).unwrap(), i);
    }

    /// Property: splitting a concatenation gives back the parts
    #[test]
    fn prop_horzcat_split_inverse((a, b) in pattern_pair_strategy(6, 20)) {
        let ab = Sparsity::horzcat(&[a.clone(), b.clone()]).unwrap();
        let parts = ab.horzsplit(&[0, a.ncol(), a.ncol() + b.ncol()]).unwrap();
        prop_assert!(Sparsity::ptr_eq(&parts[0], &a));
        prop_assert!(Sparsity::ptr_eq(&parts[1], &b));
        let v = Sparsity::vertcat(&[a.clone(), b.clone()]).unwrap();
        let parts = v.vertsplit(&[0, a.nrow(), a.nrow() + b.nrow()]).unwrap();
        prop_assert_eq!(parts, vec![a, b]);
    }

    /// Property: product nonzero count without forming the product
    #[test]
    fn prop_norm_0_mul((a, b) in pattern_pair_strategy(6, 20)) {
        let bt = b.t();
        let product = Sparsity::mtimes(&a, &bt).unwrap();
        prop_assert_eq!(norm_0_mul(&a, &bt).unwrap(), product.nnz());
    }

    /// Property: a permutation and its inverse cancel
    #[test]
    fn prop_pmult_inverse(sp in pattern_strategy(6, 20), seed in any::<u64>()) {
        let n = sp.nrow();
        let mut p: Vec<usize> = (0..n).collect();
        // Deterministic shuffle from the seed
        let mut s = seed;
        for i in (1..n).rev() {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            p.swap(i, (s >> 33) as usize % (i + 1));
        }
        let permuted = sp.pmult(&p, true, false, false).unwrap();
        let back = permuted.pmult(&p, true, false, true).unwrap();
        prop_assert_eq!(back, sp);
    }
}

// ============================================================================
// Fixed scenarios
// ============================================================================

#[test]
fn test_triplet_duplicates_collapse() {
    let (sp, mapping) = Sparsity::triplet_with_mapping(2, 2, &[0, 0, 1], &[0, 0, 1], true).unwrap();
    assert_eq!(sp.nnz(), 2);
    assert_eq!(mapping[0], mapping[1]);
    assert_ne!(mapping[0], mapping[2]);
}

#[test]
fn test_dense_detection() {
    let sp = Sparsity::dense(3, 4);
    assert_eq!(sp.nnz(), 12);
    assert!(sp.is_dense());
    let buf = sp.compress();
    assert_eq!(buf.len(), 2 + 5);
    assert!(Sparsity::ptr_eq(&Sparsity::compressed(&buf).unwrap(), &sp));
}

#[test]
fn test_singletons_survive_transpose() {
    for sp in [Sparsity::empty(), Sparsity::scalar(true), Sparsity::scalar(false)] {
        assert!(Sparsity::ptr_eq(&sp.t().t(), &sp));
    }
}
