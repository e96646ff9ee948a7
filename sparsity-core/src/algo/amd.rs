//! Approximate minimum degree ordering.
//!
//! Eliminates variables from a quotient graph of the symmetric pattern
//! `A + Aᵀ`, always picking the variable with the smallest approximate
//! external degree. An eliminated variable becomes an element; variables
//! adjacent to elements are connected implicitly, so the graph never grows.
//! The degree bound is the one of Amestoy, Davis and Duff (1996).

use std::collections::BTreeSet;

use crate::error::{SparsityError, SparsityResult};
use crate::pattern::Sparsity;

/// Tuning for [`Sparsity::amd_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmdControl {
    /// Multiplier on `sqrt(n)` above which a row is treated as dense
    pub dense: f64,
    /// Absorb elements whose variables are all covered by the new element
    pub aggressive: bool,
}

impl Default for AmdControl {
    fn default() -> Self {
        Self {
            dense: 10.0,
            aggressive: true,
        }
    }
}

impl AmdControl {
    /// Rows with more entries than this are ordered last. Never below 16.
    fn dense_threshold(&self, n: usize) -> usize {
        if self.dense < 0.0 {
            return n;
        }
        let limit = (self.dense * (n as f64).sqrt()) as usize;
        limit.max(16).min(n)
    }
}

struct QuotientGraph {
    /// Variable-to-variable adjacency still explicit
    adj: Vec<BTreeSet<usize>>,
    /// Elements adjacent to each variable
    elems: Vec<BTreeSet<usize>>,
    /// Variables of each element, indexed by the eliminated pivot
    members: Vec<BTreeSet<usize>>,
    degree: Vec<usize>,
    /// Ordered by (degree, variable)
    queue: BTreeSet<(usize, usize)>,
    eliminated: Vec<bool>,
}

impl QuotientGraph {
    fn new(sp: &Sparsity, dense_threshold: usize) -> (Self, Vec<usize>) {
        let n = sp.ncol();
        let mut adj = vec![BTreeSet::new(); n];
        for c in 0..n {
            for &r in sp.col_rows(c) {
                if r != c {
                    adj[r].insert(c);
                    adj[c].insert(r);
                }
            }
        }

        let dense: Vec<usize> = (0..n).filter(|&i| adj[i].len() > dense_threshold).collect();
        let mut eliminated = vec![false; n];
        for &d in &dense {
            eliminated[d] = true;
        }
        for &d in &dense {
            let neighbors = std::mem::take(&mut adj[d]);
            for j in neighbors {
                adj[j].remove(&d);
            }
        }

        let degree: Vec<usize> = adj.iter().map(BTreeSet::len).collect();
        let queue = (0..n).filter(|&i| !eliminated[i]).map(|i| (degree[i], i)).collect();
        let graph = Self {
            adj,
            elems: vec![BTreeSet::new(); n],
            members: vec![BTreeSet::new(); n],
            degree,
            queue,
            eliminated,
        };
        (graph, dense)
    }

    fn set_degree(&mut self, i: usize, d: usize) {
        self.queue.remove(&(self.degree[i], i));
        self.degree[i] = d;
        self.queue.insert((d, i));
    }

    fn absorb(&mut self, e: usize) {
        let vars = std::mem::take(&mut self.members[e]);
        for i in vars {
            self.elems[i].remove(&e);
        }
    }

    /// Eliminate pivot `p`, turning it into an element.
    fn eliminate(&mut self, p: usize, remaining: usize, aggressive: bool) {
        self.eliminated[p] = true;

        // Variables of the new element: explicit neighbors plus the members of
        // every element adjacent to p
        let mut lp: BTreeSet<usize> = std::mem::take(&mut self.adj[p]);
        let absorbed: Vec<usize> = std::mem::take(&mut self.elems[p]).into_iter().collect();
        for &e in &absorbed {
            lp.extend(self.members[e].iter().copied());
        }
        lp.remove(&p);
        lp.retain(|&i| !self.eliminated[i]);
        for &e in &absorbed {
            self.absorb(e);
        }

        for &i in &lp {
            self.adj[i].remove(&p);
            let adj_i = std::mem::take(&mut self.adj[i]);
            self.adj[i] = adj_i.into_iter().filter(|j| !lp.contains(j)).collect();
            self.elems[i].insert(p);
        }
        self.members[p] = lp.clone();

        // |Le \ Lp| for every other element touching Lp
        let mut external: Vec<(usize, usize)> = Vec::new();
        {
            let mut seen = BTreeSet::new();
            for &i in &lp {
                for &e in &self.elems[i] {
                    if e != p && seen.insert(e) {
                        let outside = self.members[e].iter().filter(|j| !lp.contains(j)).count();
                        external.push((e, outside));
                    }
                }
            }
        }
        if aggressive {
            for &(e, outside) in &external {
                if outside == 0 {
                    self.absorb(e);
                }
            }
        }

        let lp_size = lp.len();
        for &i in &lp {
            let elem_part: usize = self.elems[i]
                .iter()
                .filter(|&&e| e != p)
                .map(|e| {
                    external
                        .iter()
                        .find(|(x, _)| x == e)
                        .map_or(self.members[*e].len(), |&(_, w)| w)
                })
                .sum();
            let bound = self.adj[i].len() + (lp_size - 1) + elem_part;
            let d = bound
                .min(self.degree[i] + lp_size - 1)
                .min(remaining.saturating_sub(1));
            self.set_degree(i, d);
        }
    }
}

impl Sparsity {
    /// Fill-reducing symmetric ordering with default [`AmdControl`].
    pub fn amd(&self) -> SparsityResult<Vec<usize>> {
        self.amd_with(&AmdControl::default())
    }

    /// Fill-reducing symmetric ordering: `perm[k]` is the row and column of
    /// the input that is eliminated `k`-th.
    pub fn amd_with(&self, control: &AmdControl) -> SparsityResult<Vec<usize>> {
        if !self.is_square() {
            return Err(SparsityError::invalid(format!(
                "amd: expected a square pattern, got {}",
                self.dim(false)
            )));
        }
        let n = self.ncol();
        let (mut graph, dense) = QuotientGraph::new(self, control.dense_threshold(n));
        let mut perm = Vec::with_capacity(n);
        let mut remaining = n - dense.len();
        while let Some((_, p)) = graph.queue.pop_first() {
            remaining -= 1;
            graph.eliminate(p, remaining, control.aggressive);
            perm.push(p);
        }
        if !dense.is_empty() {
            log::debug!("amd: {} dense rows ordered last", dense.len());
        }
        perm.extend(dense);
        Ok(perm)
    }
}
