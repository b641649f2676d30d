use paperrec_core::error::Result;
use paperrec_core::traits::VectorSpace;
use paperrec_core::types::BackendKind;
use paperrec_text::{SparseVector, WeightedVectorSpace};
use paperrec_vector::DenseEmbeddingSpace;

/// A query projected by one backend.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryVector {
    Lexical(SparseVector),
    Dense(Vec<f32>),
}

/// Similarities of one query against the whole corpus under one backend.
#[derive(Debug, Clone)]
pub struct Scored {
    pub kind: BackendKind,
    pub query: QueryVector,
    pub similarities: Vec<f32>,
}

pub enum Backend {
    Lexical(WeightedVectorSpace),
    Dense(DenseEmbeddingSpace),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Lexical(s) => s.kind(),
            Backend::Dense(s) => s.kind(),
        }
    }

    pub fn fit(&mut self, titles: &[String], descriptions: &[String]) -> Result<()> {
        match self {
            Backend::Lexical(s) => s.fit(titles, descriptions),
            Backend::Dense(s) => s.fit(titles, descriptions),
        }
    }

    pub fn score(&self, query: &str) -> Result<Scored> {
        match self {
            Backend::Lexical(s) => {
                let q = s.encode(query)?;
                let similarities = s.similarities(&q)?;
                Ok(Scored { kind: BackendKind::Lexical, query: QueryVector::Lexical(q), similarities })
            }
            Backend::Dense(s) => {
                let q = s.encode(query)?;
                let similarities = s.similarities(&q)?;
                Ok(Scored { kind: BackendKind::Dense, query: QueryVector::Dense(q), similarities })
            }
        }
    }

    pub fn as_lexical(&self) -> Option<&WeightedVectorSpace> {
        match self {
            Backend::Lexical(s) => Some(s),
            Backend::Dense(_) => None,
        }
    }

    pub fn as_dense(&self) -> Option<&DenseEmbeddingSpace> {
        match self {
            Backend::Dense(s) => Some(s),
            Backend::Lexical(_) => None,
        }
    }
}
