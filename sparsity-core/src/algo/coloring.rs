//! Greedy graph colorings for compressed Jacobian and Hessian evaluation.
//!
//! A coloring is returned as an `ncol x ncolors` pattern whose column `c`
//! lists the columns of the input that received color `c`. All colorings
//! accept a cutoff: when more colors would be needed they give up and
//! return `None`, letting the caller fall back to uncompressed evaluation.

use std::collections::HashMap;

use super::NONE;
use crate::error::{SparsityError, SparsityResult};
use crate::pattern::Sparsity;

/// Order in which the greedy colorings visit columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColoringOrdering {
    /// Column order of the pattern
    #[default]
    Natural,
    /// Columns with more nonzeros first
    LargestFirst,
}

impl ColoringOrdering {
    fn order(self, sp: &Sparsity) -> Vec<usize> {
        match self {
            ColoringOrdering::Natural => (0..sp.ncol()).collect(),
            ColoringOrdering::LargestFirst => sp.largest_first(),
        }
    }
}

/// Greedy choice: smallest color not marked forbidden for `v`.
fn first_allowed(forbidden: &[usize], v: usize, ncolors: usize) -> usize {
    (0..ncolors).find(|&c| forbidden[c] != v).unwrap_or(ncolors)
}

fn coloring_pattern(color: &[usize], ncolors: usize) -> Sparsity {
    let n = color.len();
    let mut colind = vec![0usize; ncolors + 1];
    for &c in color {
        colind[c + 1] += 1;
    }
    for c in 0..ncolors {
        colind[c + 1] += colind[c];
    }
    let mut next = colind[..ncolors].to_vec();
    let mut row = vec![0usize; n];
    for (v, &c) in color.iter().enumerate() {
        row[next[c]] = v;
        next[c] += 1;
    }
    Sparsity::from_parts(n, ncolors, colind, row)
}

/// Star coloring bookkeeping: edges grouped into two-colored stars.
struct Stars {
    edge_star: HashMap<(usize, usize), usize>,
    hub: Vec<Option<usize>>,
}

impl Stars {
    fn key(a: usize, b: usize) -> (usize, usize) {
        (a.min(b), a.max(b))
    }

    fn get(&self, a: usize, b: usize) -> Option<usize> {
        self.edge_star.get(&Self::key(a, b)).copied()
    }

    fn set(&mut self, a: usize, b: usize, star: usize) {
        self.edge_star.insert(Self::key(a, b), star);
    }

    fn create(&mut self, a: usize, b: usize) {
        let id = self.hub.len();
        self.hub.push(None);
        self.set(a, b, id);
    }
}

impl Sparsity {
    /// Column indices sorted by decreasing nonzero count; ties keep column order.
    pub fn largest_first(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.ncol()).collect();
        order.sort_by_key(|&c| std::cmp::Reverse(self.col_rows(c).len()));
        order
    }

    /// Unidirectional coloring: columns that share a row get different colors.
    pub fn uni_coloring(&self, ordering: ColoringOrdering, cutoff: usize) -> Option<Sparsity> {
        let n = self.ncol();
        let at = self.t();
        let mut color = vec![NONE; n];
        let mut forbidden = vec![NONE; n];
        let mut ncolors = 0;
        for v in ordering.order(self) {
            for &r in self.col_rows(v) {
                for &w in at.col_rows(r) {
                    if color[w] != NONE {
                        forbidden[color[w]] = v;
                    }
                }
            }
            let c = first_allowed(&forbidden, v, ncolors);
            if c == ncolors {
                ncolors += 1;
                if ncolors > cutoff {
                    return None;
                }
            }
            color[v] = c;
        }
        Some(coloring_pattern(&color, ncolors))
    }

    fn check_star_input(&self, op: &'static str) -> SparsityResult<()> {
        if !self.is_symmetric() {
            return Err(SparsityError::NotSymmetric(op));
        }
        Ok(())
    }

    /// Star coloring of a symmetric pattern (greedy, distance-1.5).
    ///
    /// Adjacent columns differ in color and every path on four vertices
    /// uses at least three colors.
    pub fn star_coloring(&self, ordering: ColoringOrdering, cutoff: usize) -> SparsityResult<Option<Sparsity>> {
        self.check_star_input("star_coloring")?;
        let n = self.ncol();
        let mut color = vec![NONE; n];
        let mut forbidden = vec![NONE; n];
        let mut ncolors = 0;

        for v in ordering.order(self) {
            for &w in self.col_rows(v) {
                if w == v {
                    continue;
                }
                if color[w] != NONE {
                    forbidden[color[w]] = v;
                }
                for &x in self.col_rows(w) {
                    if x == v || x == w || color[x] == NONE {
                        continue;
                    }
                    if color[w] == NONE {
                        forbidden[color[x]] = v;
                    } else {
                        let two_colored = self
                            .col_rows(x)
                            .iter()
                            .any(|&y| y != w && y != x && color[y] != NONE && color[y] == color[w]);
                        if two_colored {
                            forbidden[color[x]] = v;
                        }
                    }
                }
            }

            let c = first_allowed(&forbidden, v, ncolors);
            if c == ncolors {
                ncolors += 1;
                if ncolors > cutoff {
                    return Ok(None);
                }
            }
            color[v] = c;
        }
        Ok(Some(coloring_pattern(&color, ncolors)))
    }

    /// Star coloring that tracks two-colored stars explicitly.
    ///
    /// Same guarantee as [`star_coloring`](Self::star_coloring), usually with
    /// fewer colors on large patterns.
    pub fn star_coloring2(&self, ordering: ColoringOrdering, cutoff: usize) -> SparsityResult<Option<Sparsity>> {
        self.check_star_input("star_coloring2")?;
        let n = self.ncol();
        let mut color = vec![NONE; n];
        let mut forbidden = vec![NONE; n];
        // Per color: the last vertex that saw it among its neighbors, and that neighbor
        let mut first_neighbor = vec![(NONE, NONE); n];
        let mut treated = vec![NONE; n];
        let mut stars = Stars {
            edge_star: HashMap::new(),
            hub: Vec::new(),
        };
        let mut ncolors = 0;

        let sp = self;
        let neighbors = move |v: usize| sp.col_rows(v).iter().copied().filter(move |&w| w != v);

        for v in ordering.order(self) {
            for w in neighbors(v) {
                if color[w] != NONE {
                    forbidden[color[w]] = v;
                }
            }

            for w in neighbors(v) {
                if color[w] == NONE {
                    continue;
                }
                let (p, q) = first_neighbor[color[w]];
                if p == v {
                    if treated[q] != v {
                        for x in neighbors(q) {
                            if x != v && color[x] != NONE {
                                forbidden[color[x]] = v;
                            }
                        }
                        treated[q] = v;
                    }
                    for x in neighbors(w) {
                        if x != v && color[x] != NONE {
                            forbidden[color[x]] = v;
                        }
                    }
                    treated[w] = v;
                } else {
                    first_neighbor[color[w]] = (v, w);
                    for x in neighbors(w) {
                        if x == v || color[x] == NONE {
                            continue;
                        }
                        let hub = stars.get(w, x).and_then(|s| stars.hub[s]);
                        if hub == Some(x) {
                            forbidden[color[x]] = v;
                        }
                    }
                }
            }

            let c = first_allowed(&forbidden, v, ncolors);
            if c == ncolors {
                ncolors += 1;
                if ncolors > cutoff {
                    return Ok(None);
                }
            }
            color[v] = c;

            // Merge the new edges of v into existing stars
            for w in neighbors(v) {
                if color[w] == NONE {
                    continue;
                }
                let same_color = neighbors(w).find(|&x| x != v && color[x] == color[v]);
                if let Some(star) = same_color.and_then(|x| stars.get(w, x)) {
                    stars.hub[star] = Some(w);
                    stars.set(v, w, star);
                    continue;
                }
                let (p, q) = first_neighbor[color[w]];
                if p == v && q != w {
                    if let Some(star) = stars.get(v, q) {
                        stars.hub[star] = Some(v);
                        stars.set(v, w, star);
                        continue;
                    }
                }
                stars.create(v, w);
            }
        }
        Ok(Some(coloring_pattern(&color, ncolors)))
    }
}
