//! `Af` flattening (spec.md §4.1 "Optional flattening"), grounded on
//! `flat_background.py::split_af`/`flatten`. Collapses every non-trivial,
//! non-background foreground SCC algebraically via `Af' = Af_non ·
//! (I − Af_scc)^{-1}` (and the same transform applied to `Ad`, `Bf`),
//! rather than ever walking a cycle.
//!
//! `Af_scc` only has entries where *both* endpoints are in `scc_inds` (a
//! single flat union across every qualifying SCC, matching the source's
//! `_inds` set — not a per-block split), so `(I − Af_scc)` is block
//! diagonal: identity everywhere except the `scc_inds × scc_inds`
//! submatrix. Its inverse is block diagonal the same way, so only that
//! submatrix needs a dense solve, and only the `scc_inds` columns of
//! `Af_non`/`Ad`/`Bf` need recomputing — every other column passes through
//! the identity block unchanged.

use std::collections::{HashMap, HashSet};

use tarjan_core::CscMatrix;

pub struct Flattened {
    pub af: CscMatrix,
    pub ad: CscMatrix,
    pub bf: CscMatrix,
    /// Retained so callers can check the reconstruction invariant
    /// `af_non + af_scc == af` (spec.md §4.1).
    pub af_non: CscMatrix,
    pub af_scc: CscMatrix,
}

/// Gauss-Jordan inverse with partial pivoting. `k` is the SCC-block size,
/// always small relative to the full foreground dimension, so a dense
/// solve here is cheap even though `Af` itself is sparse.
fn dense_inverse(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = a.len();
    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = row.clone();
            r.extend((0..k).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();

    for col in 0..k {
        let mut pivot_row = col;
        let mut max_val = aug[col][col].abs();
        for r in (col + 1)..k {
            if aug[r][col].abs() > max_val {
                max_val = aug[r][col].abs();
                pivot_row = r;
            }
        }
        if max_val < 1e-300 {
            tracing::warn!(col, "singular (I - Af_scc) block while flattening; leaving this column unreduced");
            continue;
        }
        aug.swap(col, pivot_row);
        let pivot = aug[col][col];
        for v in aug[col].iter_mut() {
            *v /= pivot;
        }
        for r in 0..k {
            if r == col {
                continue;
            }
            let factor = aug[r][col];
            if factor == 0.0 {
                continue;
            }
            for c in 0..(2 * k) {
                aug[r][c] -= factor * aug[col][c];
            }
        }
    }

    aug.into_iter().map(|row| row[k..].to_vec()).collect()
}

/// `m' = m * scc_inv`, recomputing only the `scc_inds` columns.
fn apply_scc_inverse(m: &CscMatrix, scc_inds: &[usize], inv: &[Vec<f64>]) -> CscMatrix {
    let in_scc: HashSet<usize> = scc_inds.iter().copied().collect();
    let mut triplets = Vec::new();

    for j in 0..m.ncols() {
        if !in_scc.contains(&j) {
            triplets.extend(m.col(j).map(|(r, v)| (r, j, v)));
        }
    }

    for (lj, &gj) in scc_inds.iter().enumerate() {
        let mut acc: HashMap<usize, f64> = HashMap::new();
        for (lc, &gc) in scc_inds.iter().enumerate() {
            let weight = inv[lc][lj];
            if weight == 0.0 {
                continue;
            }
            for (r, v) in m.col(gc) {
                *acc.entry(r).or_insert(0.0) += v * weight;
            }
        }
        triplets.extend(acc.into_iter().filter(|&(_, v)| v != 0.0).map(|(r, v)| (r, gj, v)));
    }

    CscMatrix::from_triplets(m.nrows(), m.ncols(), triplets)
}

/// Flatten `af`/`ad`/`bf` over `scc_inds` (non-trivial, non-background
/// foreground SCC members, from `Ordering::nontrivial_fg_scc_members`).
pub fn flatten(af: &CscMatrix, ad: &CscMatrix, bf: &CscMatrix, scc_inds: &[usize]) -> Flattened {
    let p = af.ncols();
    let in_scc: HashSet<usize> = scc_inds.iter().copied().collect();

    let mut non_triplets = Vec::new();
    let mut scc_triplets = Vec::new();
    for (r, c, v) in af.to_triplets() {
        if in_scc.contains(&r) && in_scc.contains(&c) {
            scc_triplets.push((r, c, v));
        } else {
            non_triplets.push((r, c, v));
        }
    }
    let af_non = CscMatrix::from_triplets(p, p, non_triplets);
    let af_scc = CscMatrix::from_triplets(p, p, scc_triplets.clone());

    if scc_inds.is_empty() {
        return Flattened { af: af.clone(), ad: ad.clone(), bf: bf.clone(), af_non, af_scc };
    }

    let k = scc_inds.len();
    let mut dense = vec![vec![0.0; k]; k];
    for (r, c, v) in &scc_triplets {
        let lr = scc_inds.iter().position(|x| x == r).expect("row in scc_inds by construction");
        let lc = scc_inds.iter().position(|x| x == c).expect("col in scc_inds by construction");
        dense[lr][lc] = -v;
    }
    for i in 0..k {
        dense[i][i] += 1.0;
    }
    let inv = dense_inverse(&dense);

    Flattened {
        af: apply_scc_inverse(&af_non, scc_inds, &inv),
        ad: apply_scc_inverse(ad, scc_inds, &inv),
        bf: apply_scc_inverse(bf, scc_inds, &inv),
        af_non,
        af_scc,
    }
}
