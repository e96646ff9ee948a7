//! Structural analysis: rank, block triangular forms, symbolic
//! factorizations and colorings, checked against brute force on random
//! patterns.

use proptest::prelude::*;
use sparsity_core::algo::maxtrans;
use sparsity_core::{ColoringOrdering, Sparsity, SparsityError};

fn from_entries(nrow: usize, ncol: usize, entries: &[(usize, usize)]) -> Sparsity {
    let rows: Vec<usize> = entries.iter().map(|e| e.0).collect();
    let cols: Vec<usize> = entries.iter().map(|e| e.1).collect();
    Sparsity::triplet(nrow, ncol, &rows, &cols).unwrap()
}

fn pattern_strategy(max_dim: usize, max_nnz: usize) -> impl Strategy<Value = Sparsity> {
    (1..=max_dim, 1..=max_dim).prop_flat_map(move |(nrow, ncol)| {
        prop::collection::vec((0..nrow, 0..ncol), 0..=max_nnz)
            .prop_map(move |entries| from_entries(nrow, ncol, &entries))
    })
}

/// Square pattern with a full diagonal, so structurally nonsingular.
fn nonsingular_strategy(max_dim: usize, max_nnz: usize) -> impl Strategy<Value = Sparsity> {
    (1..=max_dim).prop_flat_map(move |n| {
        prop::collection::vec((0..n, 0..n), 0..=max_nnz).prop_map(move |entries| {
            from_entries(n, n, &entries).unite(&Sparsity::diag(n)).unwrap()
        })
    })
}

/// Symmetric pattern with a full diagonal.
fn symmetric_strategy(max_dim: usize, max_nnz: usize) -> impl Strategy<Value = Sparsity> {
    nonsingular_strategy(max_dim, max_nnz).prop_map(|sp| sp.unite(&sp.t()).unwrap())
}

fn is_permutation(p: &[usize], n: usize) -> bool {
    let mut sorted = p.to_vec();
    sorted.sort_unstable();
    sorted == (0..n).collect::<Vec<_>>()
}

fn colors_of(coloring: &Sparsity) -> Vec<usize> {
    let mut color = vec![usize::MAX; coloring.nrow()];
    for c in 0..coloring.ncol() {
        for &v in coloring.col_rows(c) {
            color[v] = c;
        }
    }
    color
}

/// Adjacent vertices differ and no path on four vertices is two-colored.
fn is_star_coloring(sp: &Sparsity, color: &[usize]) -> bool {
    let n = sp.ncol();
    let adj = move |v: usize| sp.col_rows(v).iter().copied().filter(move |&w| w != v);
    for a in 0..n {
        for b in adj(a) {
            if color[a] == color[b] {
                return false;
            }
            for c in adj(b).filter(|&c| c != a) {
                for d in adj(c).filter(|&d| d != a && d != b) {
                    if color[a] == color[c] && color[b] == color[d] {
                        return false;
                    }
                }
            }
        }
    }
    true
}

// ============================================================================
// Structural rank
// ============================================================================

#[test]
fn test_sprank_identity() {
    let sp = Sparsity::diag(3);
    assert_eq!(sp.sprank(), 3);
    assert!(!sp.is_singular().unwrap());
}

#[test]
fn test_sprank_empty_row() {
    let sp = from_entries(3, 3, &[(0, 0), (1, 1), (0, 2)]);
    assert!(sp.sprank() < 3);
    assert!(sp.is_singular().unwrap());
}

#[test]
fn test_btf_identity_gives_singletons() {
    let n = 5;
    let d = Sparsity::diag(n).btf();
    assert_eq!(d.nblocks(), n);
    assert_eq!(d.rowperm, (0..n).collect::<Vec<_>>());
    assert_eq!(d.colperm, (0..n).collect::<Vec<_>>());
    assert_eq!(d.rowblock, (0..=n).collect::<Vec<_>>());
    assert_eq!(d.colblock, (0..=n).collect::<Vec<_>>());
}

#[test]
fn test_is_singular_requires_square() {
    assert!(matches!(
        Sparsity::dense(2, 3).is_singular(),
        Err(SparsityError::InvalidArgument(_))
    ));
}

proptest! {
    /// Property: sprank is the matching size and is transpose invariant
    #[test]
    fn prop_sprank_is_matching_size(sp in pattern_strategy(7, 20)) {
        let (jmatch, imatch) = maxtrans(&sp);
        let matched = imatch.iter().filter(|m| m.is_some()).count();
        prop_assert_eq!(jmatch.iter().filter(|m| m.is_some()).count(), matched);
        for (j, i) in imatch.iter().enumerate() {
            if let Some(i) = *i {
                prop_assert!(sp.has_nz(i as isize, j as isize).unwrap());
                prop_assert_eq!(jmatch[i], Some(j));
            }
        }
        prop_assert_eq!(sp.sprank(), matched);
        prop_assert_eq!(sp.t().sprank(), matched);
        prop_assert!(matched <= sp.nrow().min(sp.ncol()));
    }

    /// Property: dmperm gives permutations with monotone block boundaries
    #[test]
    fn prop_dmperm_well_formed(sp in pattern_strategy(7, 20)) {
        let d = sp.dulmage_mendelsohn();
        prop_assert!(is_permutation(&d.rowperm, sp.nrow()));
        prop_assert!(is_permutation(&d.colperm, sp.ncol()));
        prop_assert_eq!(d.rowblock.len(), d.colblock.len());
        prop_assert!(d.rowblock.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(d.colblock.windows(2).all(|w| w[0] <= w[1]));
        prop_assert_eq!(*d.rowblock.last().unwrap(), sp.nrow());
        prop_assert_eq!(*d.colblock.last().unwrap(), sp.ncol());
        prop_assert!(d.coarse_rowblock.windows(2).all(|w| w[0] <= w[1]));
        prop_assert!(d.coarse_colblock.windows(2).all(|w| w[0] <= w[1]));
    }

    /// Property: btf of a nonsingular pattern is block lower triangular
    #[test]
    fn prop_btf_block_lower(sp in nonsingular_strategy(7, 20)) {
        let n = sp.ncol();
        let d = sp.btf();
        prop_assert_eq!(d.rowblock.clone(), d.colblock.clone());
        let mut block_of_row = vec![0; n];
        let mut block_of_col = vec![0; n];
        for b in 0..d.nblocks() {
            for k in d.rowblock[b]..d.rowblock[b + 1] {
                block_of_row[d.rowperm[k]] = b;
            }
            for k in d.colblock[b]..d.colblock[b + 1] {
                block_of_col[d.colperm[k]] = b;
            }
        }
        for c in 0..n {
            for &r in sp.col_rows(c) {
                prop_assert!(block_of_row[r] >= block_of_col[c]);
            }
        }
        prop_assert!(!sp.is_singular().unwrap());
    }
}

// ============================================================================
// Symbolic factorizations
// ============================================================================

proptest! {
    /// Property: column counts agree with the symbolic factor
    #[test]
    fn prop_symbfact_counts(sp in symmetric_strategy(8, 16)) {
        let f = sp.symbfact(false).unwrap();
        let l = f.l.unwrap();
        for j in 0..sp.ncol() {
            prop_assert_eq!(f.counts[j], l.col_rows(j).len());
        }
        prop_assert!(is_permutation(&f.post, sp.ncol()));
    }

    /// Property: the factor covers the permuted upper triangle
    #[test]
    fn prop_ldl_covers_input(sp in symmetric_strategy(8, 16)) {
        for amd in [false, true] {
            let (lt, p) = sp.ldl(amd).unwrap();
            prop_assert!(is_permutation(&p, sp.ncol()));
            prop_assert!(lt.is_triu());
            let (permuted, _) = sp.sub(&p, &p).unwrap();
            let upper = permuted.triu(false);
            prop_assert_eq!(upper.unite(&lt).unwrap(), lt);
        }
    }

    /// Property: QR pattern shapes and row permutation
    #[test]
    fn prop_qr_sparse_shapes(sp in pattern_strategy(7, 20)) {
        for amd in [false, true] {
            let qr = sp.qr_sparse(amd).unwrap();
            let n = sp.ncol();
            prop_assert!(qr.r.is_triu());
            prop_assert_eq!(qr.r.shape(), (n, n));
            prop_assert_eq!(qr.r.nnz_diag(), n);
            prop_assert!(qr.v.nrow() >= sp.nrow());
            prop_assert!(is_permutation(&qr.prinv, qr.v.nrow()));
            prop_assert!(is_permutation(&qr.pc, n));
        }
    }
}

// ============================================================================
// Colorings
// ============================================================================

proptest! {
    /// Property: uni coloring never gives two columns sharing a row one color
    #[test]
    fn prop_uni_coloring_valid(sp in pattern_strategy(7, 20), largest_first in any::<bool>()) {
        let ordering = if largest_first { ColoringOrdering::LargestFirst } else { ColoringOrdering::Natural };
        let coloring = sp.uni_coloring(ordering, usize::MAX).unwrap();
        prop_assert_eq!(coloring.nrow(), sp.ncol());
        prop_assert_eq!(coloring.nnz(), sp.ncol());
        for c in 0..coloring.ncol() {
            let group = coloring.col_rows(c);
            for (a, &i) in group.iter().enumerate() {
                for &j in &group[a + 1..] {
                    let shared = sp.col_rows(i).iter().any(|r| sp.col_rows(j).contains(r));
                    prop_assert!(!shared);
                }
            }
        }
    }

    /// Property: both star colorings are valid star colorings
    #[test]
    fn prop_star_colorings_valid(sp in symmetric_strategy(8, 14), largest_first in any::<bool>()) {
        let ordering = if largest_first { ColoringOrdering::LargestFirst } else { ColoringOrdering::Natural };
        let c1 = sp.star_coloring(ordering, usize::MAX).unwrap().unwrap();
        prop_assert!(is_star_coloring(&sp, &colors_of(&c1)));
        let c2 = sp.star_coloring2(ordering, usize::MAX).unwrap().unwrap();
        prop_assert!(is_star_coloring(&sp, &colors_of(&c2)));
    }
}

#[test]
fn test_coloring_cutoff() {
    let sp = Sparsity::dense(4, 4);
    assert!(sp.star_coloring(ColoringOrdering::Natural, 3).unwrap().is_none());
    assert_eq!(
        sp.star_coloring(ColoringOrdering::Natural, 4).unwrap().unwrap().ncol(),
        4
    );
}
