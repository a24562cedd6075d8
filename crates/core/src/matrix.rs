//! Minimal compressed-sparse-column matrix, shared by the assembler and the
//! flat background. Values are `f64`; storage mirrors the layout MAT v5
//! sparse arrays use on disk, so (de)serialization in `tarjan-background`
//! is a near-direct field copy.

use std::collections::BTreeMap;

/// A sparse matrix in compressed-column form.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    nrows: usize,
    ncols: usize,
    /// `col_ptr[j]..col_ptr[j+1]` indexes into `row_idx`/`values` for column `j`.
    col_ptr: Vec<usize>,
    row_idx: Vec<usize>,
    values: Vec<f64>,
}

impl CscMatrix {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        CscMatrix {
            nrows,
            ncols,
            col_ptr: vec![0; ncols + 1],
            row_idx: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn identity(n: usize) -> Self {
        Self::from_triplets(n, n, (0..n).map(|i| (i, i, 1.0)))
    }

    /// Build from `(row, col, value)` triplets. Duplicate `(row, col)` pairs
    /// are summed, matching the Matrix Assembler's contract.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: impl IntoIterator<Item = (usize, usize, f64)>) -> Self {
        let mut by_col: Vec<BTreeMap<usize, f64>> = vec![BTreeMap::new(); ncols];
        for (r, c, v) in triplets {
            assert!(r < nrows, "row {r} out of bounds ({nrows} rows)");
            assert!(c < ncols, "col {c} out of bounds ({ncols} cols)");
            *by_col[c].entry(r).or_insert(0.0) += v;
        }

        let mut col_ptr = Vec::with_capacity(ncols + 1);
        let mut row_idx = Vec::new();
        let mut values = Vec::new();
        col_ptr.push(0);
        for col in &by_col {
            for (&r, &v) in col {
                row_idx.push(r);
                values.push(v);
            }
            col_ptr.push(row_idx.len());
        }

        CscMatrix { nrows, ncols, col_ptr, row_idx, values }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Non-zero `(row, value)` pairs of column `j`, in row-ascending order.
    pub fn col(&self, j: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let start = self.col_ptr[j];
        let end = self.col_ptr[j + 1];
        self.row_idx[start..end]
            .iter()
            .copied()
            .zip(self.values[start..end].iter().copied())
    }

    /// Non-zero `(col, value)` pairs of row `i`. O(nnz): this type favors
    /// column access (matching how it is built and solved); row queries
    /// (`consumers`) are rare enough not to warrant a CSR companion.
    pub fn row(&self, i: usize) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        for j in 0..self.ncols {
            for (r, v) in self.col(j) {
                if r == i {
                    out.push((j, v));
                }
            }
        }
        out
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.col(c).find(|&(row, _)| row == r).map(|(_, v)| v).unwrap_or(0.0)
    }

    pub fn to_triplets(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::with_capacity(self.nnz());
        for j in 0..self.ncols {
            for (r, v) in self.col(j) {
                out.push((r, j, v));
            }
        }
        out
    }

    pub fn transpose(&self) -> Self {
        Self::from_triplets(self.ncols, self.nrows, self.to_triplets().into_iter().map(|(r, c, v)| (c, r, v)))
    }

    /// Dense matrix-vector product `y = A x`.
    pub fn matvec_dense(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(x.len(), self.ncols, "matvec: vector length must equal column count");
        let mut y = vec![0.0; self.nrows];
        for j in 0..self.ncols {
            let xj = x[j];
            if xj == 0.0 {
                continue;
            }
            for (r, v) in self.col(j) {
                y[r] += v * xj;
            }
        }
        y
    }

    /// Sparse-vector (`row -> value`) matrix-vector product, for use when
    /// the input vector itself has very few non-zeros (e.g. a unit column).
    pub fn matvec_sparse(&self, x: &[(usize, f64)]) -> Vec<f64> {
        let mut y = vec![0.0; self.nrows];
        for &(j, xj) in x {
            for (r, v) in self.col(j) {
                y[r] += v * xj;
            }
        }
        y
    }

    /// `true` iff every non-zero entry satisfies `row > col` (strictly
    /// upper triangular once child indices outrank parent indices — the
    /// flattened-`Af` invariant of spec.md §8 property 2).
    pub fn is_strictly_upper_triangular(&self) -> bool {
        for j in 0..self.ncols {
            for (r, _) in self.col(j) {
                if r <= j {
                    return false;
                }
            }
        }
        true
    }
}

/// Dense `n x n` unit column vector.
pub fn unit_vector(n: usize, index: usize) -> Vec<f64> {
    let mut v = vec![0.0; n];
    if n > 0 {
        v[index] = 1.0;
    }
    v
}

/// L1 norm of a dense vector.
pub fn l1_norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x.abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_entries_are_summed() {
        let m = CscMatrix::from_triplets(2, 2, [(0, 0, 1.0), (0, 0, 2.0), (1, 0, 5.0)]);
        assert_eq!(m.get(0, 0), 3.0);
        assert_eq!(m.get(1, 0), 5.0);
        assert_eq!(m.nnz(), 2);
    }

    #[test]
    fn matvec_matches_hand_computation() {
        // [[0, 2], [3, 0]] * [1, 1] = [2, 3]
        let m = CscMatrix::from_triplets(2, 2, [(0, 1, 2.0), (1, 0, 3.0)]);
        assert_eq!(m.matvec_dense(&[1.0, 1.0]), vec![2.0, 3.0]);
    }

    #[test]
    fn transpose_swaps_row_and_col() {
        let m = CscMatrix::from_triplets(2, 3, [(0, 2, 4.0), (1, 0, 7.0)]);
        let t = m.transpose();
        assert_eq!(t.nrows(), 3);
        assert_eq!(t.ncols(), 2);
        assert_eq!(t.get(2, 0), 4.0);
        assert_eq!(t.get(0, 1), 7.0);
    }

    #[test]
    fn row_query_finds_nonzeros() {
        let m = CscMatrix::from_triplets(2, 2, [(0, 1, 2.0), (1, 0, 3.0), (1, 1, 9.0)]);
        let mut row1 = m.row(1);
        row1.sort_by_key(|&(c, _)| c);
        assert_eq!(row1, vec![(0, 3.0), (1, 9.0)]);
    }

    #[test]
    fn triangularity_check() {
        let upper = CscMatrix::from_triplets(3, 3, [(2, 0, 1.0), (1, 0, 1.0)]);
        assert!(upper.is_strictly_upper_triangular());
        let not_upper = CscMatrix::from_triplets(3, 3, [(0, 0, 1.0)]);
        assert!(!not_upper.is_strictly_upper_triangular());
    }

    #[test]
    fn identity_is_diagonal_of_ones() {
        let id = CscMatrix::identity(3);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq!(id.get(i, j), expected);
            }
        }
    }
}
