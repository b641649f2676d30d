use crate::error::Result;
use crate::types::{BackendKind, RankedResult};

/// A corpus-wide vector representation that a query can be projected into.
///
/// Implementors start unfitted; `encode`, `corpus_vectors` and
/// `similarities` fail with `Error::NotFitted` until `fit` succeeds.
pub trait VectorSpace: Send + Sync {
    type Vector;
    type Matrix;

    fn fit(&mut self, titles: &[String], descriptions: &[String]) -> Result<()>;
    fn encode(&self, query: &str) -> Result<Self::Vector>;
    fn corpus_vectors(&self) -> Result<&Self::Matrix>;
    fn kind(&self) -> BackendKind;
    /// Cosine similarity of `query` against every corpus row, in corpus order.
    fn similarities(&self, query: &Self::Vector) -> Result<Vec<f32>>;
}

pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `hashing:d1024`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed_one(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder {} returned no vector", self.id()))
    }
}

/// Shortens a document description for display in an explanation.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> anyhow::Result<String>;
}

/// Rewrites a raw user query (translation, disambiguation) before retrieval.
pub trait QueryClarifier: Send + Sync {
    fn clarify(&self, raw_query: &str) -> anyhow::Result<String>;
}

/// Receives a finished result list, e.g. for export.
pub trait ResultSink {
    fn persist(&mut self, results: &[RankedResult<'_>]) -> anyhow::Result<()>;
}
