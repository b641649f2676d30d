//! Minimal sorted-index sparse vectors and row matrices.

use serde::{Deserialize, Serialize};

/// Sparse `f32` vector with strictly increasing `indices` and no stored zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f32>,
}

impl SparseVector {
    /// Build from `(index, value)` pairs with unique indices in any order.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.retain(|&(_, v)| v != 0.0);
        pairs.sort_unstable_by_key(|&(i, _)| i);
        let (indices, values) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Indices strictly increasing and paired with a value each.
    pub fn is_well_formed(&self) -> bool {
        self.indices.len() == self.values.len() && self.indices.windows(2).all(|w| w[0] < w[1])
    }

    /// One past the largest stored index, 0 when empty.
    pub fn min_width(&self) -> usize {
        self.indices.last().map_or(0, |&i| i as usize + 1)
    }

    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    pub fn scale(&mut self, factor: f32) {
        if factor == 0.0 {
            self.indices.clear();
            self.values.clear();
            return;
        }
        for v in &mut self.values {
            *v *= factor;
        }
    }

    /// Scale to unit length; a zero vector stays zero.
    pub fn l2_normalize(&mut self) {
        let norm = self.norm();
        if norm > 0.0 {
            for v in &mut self.values {
                *v /= norm;
            }
        }
    }

    /// Append `tail` shifted right by `offset` columns. `offset` must be at
    /// least `self.min_width()`.
    pub fn concat(mut self, offset: u32, tail: &SparseVector) -> Self {
        debug_assert!(self.min_width() <= offset as usize);
        self.indices.extend(tail.indices.iter().map(|&i| i + offset));
        self.values.extend_from_slice(&tail.values);
        self
    }

    pub fn dot(&self, other: &SparseVector) -> f32 {
        self.hadamard(other).into_iter().map(|(_, v)| v).sum()
    }

    /// Element-wise product over shared nonzero dimensions, by ascending index.
    pub fn hadamard(&self, other: &SparseVector) -> Vec<(u32, f32)> {
        let (mut i, mut j) = (0, 0);
        let mut out = Vec::new();
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    let p = self.values[i] * other.values[j];
                    if p != 0.0 {
                        out.push((self.indices[i], p));
                    }
                    i += 1;
                    j += 1;
                }
            }
        }
        out
    }
}

/// Cosine similarity; 0 when either side has zero norm.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f32 {
    let (na, nb) = (a.norm(), b.norm());
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    a.dot(b) / (na * nb)
}

/// Row-major sparse matrix of fixed column width.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseMatrix {
    dim: usize,
    rows: Vec<SparseVector>,
}

impl SparseMatrix {
    pub fn new(dim: usize, rows: Vec<SparseVector>) -> Self {
        Self { dim, rows }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    pub fn row(&self, i: usize) -> Option<&SparseVector> {
        self.rows.get(i)
    }

    /// True when every row is well formed and stores no index at or beyond `dim`.
    pub fn is_consistent(&self) -> bool {
        self.rows.iter().all(|r| r.is_well_formed() && r.min_width() <= self.dim)
    }
}
