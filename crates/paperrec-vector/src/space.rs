use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use paperrec_core::error::{Error, Result};
use paperrec_core::traits::{Embedder, VectorSpace};
use paperrec_core::types::BackendKind;

/// Row-major dense matrix with a fixed row width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseMatrix {
    dim: usize,
    n_rows: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    pub fn empty(dim: usize) -> Self {
        Self { dim, n_rows: 0, data: Vec::new() }
    }

    /// Every row must have exactly `dim` values.
    pub fn from_rows(dim: usize, rows: Vec<Vec<f32>>) -> Result<Self> {
        let n_rows = rows.len();
        let mut data = Vec::with_capacity(n_rows * dim);
        for row in rows {
            if row.len() != dim {
                return Err(Error::DimensionMismatch { expected: dim, actual: row.len() });
            }
            data.extend(row);
        }
        Ok(Self { dim, n_rows, data })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn row(&self, i: usize) -> Option<&[f32]> {
        (i < self.n_rows).then(|| &self.data[i * self.dim..(i + 1) * self.dim])
    }

    fn normalize_rows(&mut self) {
        if self.dim == 0 {
            return;
        }
        for row in self.data.chunks_exact_mut(self.dim) {
            l2_normalize(row);
        }
    }
}

/// Scale to unit length in place. A zero vector stays zero and a vector that
/// is already unit length is left untouched, so repeated calls are stable.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && (norm - 1.0).abs() > 1e-6 {
        for x in v {
            *x /= norm;
        }
    }
}

/// Text embedded for a document: title and description joined as one passage.
pub fn compose_text(title: &str, description: &str) -> String {
    format!("{}. {}", title, description).trim().to_string()
}

/// Semantic backend: one normalized embedding per document, queries scored by
/// dot product (cosine on unit vectors).
pub struct DenseEmbeddingSpace {
    embedder: Arc<dyn Embedder>,
    matrix: Option<DenseMatrix>,
}

impl DenseEmbeddingSpace {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, matrix: None }
    }

    /// Accept precomputed corpus vectors (e.g. from the embedding cache).
    /// Rows are re-normalized; their width must match the embedder.
    pub fn from_matrix(embedder: Arc<dyn Embedder>, mut matrix: DenseMatrix) -> Result<Self> {
        if matrix.dim() != embedder.dim() {
            return Err(Error::DimensionMismatch { expected: embedder.dim(), actual: matrix.dim() });
        }
        matrix.normalize_rows();
        Ok(Self { embedder, matrix: Some(matrix) })
    }

    fn fitted(&self) -> Result<&DenseMatrix> {
        self.matrix
            .as_ref()
            .ok_or_else(|| Error::NotFitted("dense space used before fit".to_string()))
    }
}

impl VectorSpace for DenseEmbeddingSpace {
    type Vector = Vec<f32>;
    type Matrix = DenseMatrix;

    fn fit(&mut self, titles: &[String], descriptions: &[String]) -> Result<()> {
        if titles.len() != descriptions.len() {
            return Err(Error::DimensionMismatch { expected: titles.len(), actual: descriptions.len() });
        }
        let dim = self.embedder.dim();
        if titles.is_empty() {
            self.matrix = Some(DenseMatrix::empty(dim));
            return Ok(());
        }
        let texts: Vec<String> = titles.iter().zip(descriptions).map(|(t, d)| compose_text(t, d)).collect();
        let vectors = self
            .embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Encoding(format!("{}: {:#}", self.embedder.id(), e)))?;
        if vectors.len() != texts.len() {
            return Err(Error::DimensionMismatch { expected: texts.len(), actual: vectors.len() });
        }
        let mut matrix = DenseMatrix::from_rows(dim, vectors)?;
        matrix.normalize_rows();
        info!("Fitted dense space: {} docs, d={} ({})", matrix.n_rows(), dim, self.embedder.id());
        self.matrix = Some(matrix);
        Ok(())
    }

    fn encode(&self, query: &str) -> Result<Vec<f32>> {
        let matrix = self.fitted()?;
        let mut v = self
            .embedder
            .embed_one(query)
            .map_err(|e| Error::Encoding(format!("{}: {:#}", self.embedder.id(), e)))?;
        if v.len() != matrix.dim() {
            return Err(Error::DimensionMismatch { expected: matrix.dim(), actual: v.len() });
        }
        l2_normalize(&mut v);
        debug!("Encoded query into d={} dense vector", v.len());
        Ok(v)
    }

    fn corpus_vectors(&self) -> Result<&DenseMatrix> {
        self.fitted()
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Dense
    }

    fn similarities(&self, query: &Vec<f32>) -> Result<Vec<f32>> {
        let matrix = self.fitted()?;
        if query.len() != matrix.dim() {
            return Err(Error::DimensionMismatch { expected: matrix.dim(), actual: query.len() });
        }
        Ok((0..matrix.n_rows())
            .filter_map(|i| matrix.row(i))
            .map(|row| row.iter().zip(query).map(|(a, b)| a * b).sum())
            .collect())
    }
}
