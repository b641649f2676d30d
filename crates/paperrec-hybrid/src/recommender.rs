use std::sync::Arc;
use tracing::{debug, info, warn};

use paperrec_core::config::RecommenderConfig;
use paperrec_core::error::{Error, Result};
use paperrec_core::traits::{Embedder, QueryClarifier, Summarizer, VectorSpace};
use paperrec_core::types::{BackendKind, BackendMode, Document, RankedResult};
use paperrec_text::{LexicalState, WeightedVectorSpace};
use paperrec_vector::{DenseEmbeddingSpace, DenseMatrix};

use crate::backend::{Backend, QueryVector, Scored};
use crate::explain::{justification, shared_label, summarize_or_truncate};
use crate::fusion::fuse;
use crate::rank::{round4, top_k, Tiering};

/// Fitted backend state loaded from a cache. A missing part is fitted fresh.
#[derive(Debug, Clone, Default)]
pub struct PrefitState {
    pub lexical: Option<LexicalState>,
    pub dense: Option<DenseMatrix>,
}

/// Ranks a fixed corpus against free-text queries.
///
/// Starts unfitted; `fit` (or `from_prefit`) builds the backends the
/// configured mode needs. `recommend` takes `&self`, so a fitted instance can
/// be shared across threads.
pub struct Recommender {
    config: RecommenderConfig,
    corpus: Vec<Document>,
    embedder: Option<Arc<dyn Embedder>>,
    summarizer: Option<Box<dyn Summarizer>>,
    backends: Vec<Backend>,
}

impl Recommender {
    pub fn new(config: RecommenderConfig, corpus: Vec<Document>, embedder: Option<Arc<dyn Embedder>>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, corpus, embedder, summarizer: None, backends: Vec::new() })
    }

    #[must_use]
    pub fn with_summarizer(mut self, summarizer: Box<dyn Summarizer>) -> Self {
        self.summarizer = Some(summarizer);
        self
    }

    /// Build a fitted recommender from cached backend state.
    pub fn from_prefit(
        config: RecommenderConfig,
        corpus: Vec<Document>,
        embedder: Option<Arc<dyn Embedder>>,
        prefit: PrefitState,
    ) -> Result<Self> {
        let mut rec = Self::new(config, corpus, embedder)?;
        let mode = rec.config.mode;
        let dense_embedder = rec.dense_embedder()?;
        let (titles, descriptions) = rec.fields();
        let n_docs = rec.corpus.len();
        let mut backends = Vec::new();

        if mode.uses_lexical() {
            let space = match prefit.lexical {
                Some(state) => {
                    if state.n_docs() != n_docs {
                        return Err(Error::DimensionMismatch { expected: n_docs, actual: state.n_docs() });
                    }
                    if state.config() != &rec.config.lexical {
                        return Err(Error::InvalidConfig("cached lexical state was fitted with different settings".to_string()));
                    }
                    if !state.matches_corpus(&titles, &descriptions) {
                        return Err(Error::InvalidConfig("cached lexical state was fitted on different document text".to_string()));
                    }
                    WeightedVectorSpace::from_state(state)?
                }
                None => {
                    let mut space = WeightedVectorSpace::new(rec.config.lexical.clone())?;
                    space.fit(&titles, &descriptions)?;
                    space
                }
            };
            backends.push(Backend::Lexical(space));
        }
        if let Some(embedder) = dense_embedder {
            let space = match prefit.dense {
                Some(matrix) => {
                    if matrix.n_rows() != n_docs {
                        return Err(Error::DimensionMismatch { expected: n_docs, actual: matrix.n_rows() });
                    }
                    DenseEmbeddingSpace::from_matrix(embedder, matrix)?
                }
                None => {
                    let mut space = DenseEmbeddingSpace::new(embedder);
                    space.fit(&titles, &descriptions)?;
                    space
                }
            };
            backends.push(Backend::Dense(space));
        }
        info!("Recommender ready from cached state: {} docs, mode {}", n_docs, mode);
        rec.backends = backends;
        Ok(rec)
    }

    /// Fit every backend the mode requires. On error the recommender stays
    /// as it was.
    pub fn fit(&mut self) -> Result<()> {
        let dense_embedder = self.dense_embedder()?;
        let (titles, descriptions) = self.fields();
        let mut backends = Vec::new();
        if self.config.mode.uses_lexical() {
            backends.push(Backend::Lexical(WeightedVectorSpace::new(self.config.lexical.clone())?));
        }
        if let Some(embedder) = dense_embedder {
            backends.push(Backend::Dense(DenseEmbeddingSpace::new(embedder)));
        }
        for backend in &mut backends {
            backend.fit(&titles, &descriptions)?;
        }
        info!("Fitted recommender: {} docs, mode {}", self.corpus.len(), self.config.mode);
        self.backends = backends;
        Ok(())
    }

    /// Up to `k` documents for `query`, best first, each with a tier and an
    /// explanation.
    pub fn recommend(&self, query: &str, k: usize) -> Result<Vec<RankedResult<'_>>> {
        if !self.is_fitted() {
            return Err(Error::NotFitted("recommend called before fit".to_string()));
        }
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }
        let n_docs = self.corpus.len();
        if n_docs == 0 || k == 0 {
            return Ok(Vec::new());
        }

        let scored = self.backends.iter().map(|b| b.score(query)).collect::<Result<Vec<Scored>>>()?;
        let sims_of = |kind: BackendKind| scored.iter().find(|s| s.kind == kind).map(|s| s.similarities.as_slice());
        let fused = fuse(sims_of(BackendKind::Lexical), sims_of(BackendKind::Dense), self.config.hybrid_alpha, n_docs)?;
        let tiering = Tiering::from_scores(&fused, &self.config.tiers);
        debug!("Query '{}': thresholds {:?}", query, tiering.thresholds());

        let lexical = self.backends.iter().find_map(Backend::as_lexical);
        let lexical_query = scored.iter().find_map(|s| match &s.query {
            QueryVector::Lexical(v) => Some(v),
            QueryVector::Dense(_) => None,
        });

        let mut results = Vec::with_capacity(k.min(n_docs));
        for (rank, (doc_id, score)) in top_k(&fused, k).into_iter().enumerate() {
            let document = &self.corpus[doc_id];
            let shared_terms = match (lexical, lexical_query) {
                (Some(space), Some(qv)) => space.explain_top_ngrams(qv, doc_id, self.config.explain_terms)?,
                _ => Vec::new(),
            };
            let label = shared_label(&shared_terms, lexical.is_some());
            let summary = summarize_or_truncate(self.summarizer.as_deref(), &document.description, self.config.summary_chars);
            results.push(RankedResult {
                rank: rank + 1,
                doc_id,
                document,
                score: round4(score),
                tier: tiering.tier(score),
                shared_terms,
                explanation: justification(&summary, &label, query),
            });
        }
        debug!("Query '{}': {} of {} documents returned", query, results.len(), n_docs);
        Ok(results)
    }

    /// Rewrite `raw_query` with `clarifier` before recommending. A failed or
    /// empty clarification falls back to the raw query.
    pub fn recommend_clarified(&self, clarifier: &dyn QueryClarifier, raw_query: &str, k: usize) -> Result<Vec<RankedResult<'_>>> {
        let query = match clarifier.clarify(raw_query) {
            Ok(q) if !q.trim().is_empty() => q,
            Ok(_) => {
                warn!("Clarifier returned an empty query, using the raw query");
                raw_query.to_string()
            }
            Err(e) => {
                warn!("Clarifier failed, using the raw query: {:#}", e);
                raw_query.to_string()
            }
        };
        self.recommend(&query, k)
    }

    pub fn is_fitted(&self) -> bool {
        !self.backends.is_empty()
    }

    pub fn mode(&self) -> BackendMode {
        self.config.mode
    }

    pub fn config(&self) -> &RecommenderConfig {
        &self.config
    }

    pub fn corpus(&self) -> &[Document] {
        &self.corpus
    }

    pub fn lexical_state(&self) -> Option<&LexicalState> {
        self.backends.iter().find_map(Backend::as_lexical).and_then(WeightedVectorSpace::state)
    }

    pub fn dense_matrix(&self) -> Option<&DenseMatrix> {
        self.backends.iter().find_map(Backend::as_dense).and_then(|s| s.corpus_vectors().ok())
    }

    fn dense_embedder(&self) -> Result<Option<Arc<dyn Embedder>>> {
        if !self.config.mode.uses_dense() {
            return Ok(None);
        }
        self.embedder
            .clone()
            .map(Some)
            .ok_or_else(|| Error::InvalidConfig(format!("{} mode needs an embedding provider", self.config.mode)))
    }

    fn fields(&self) -> (Vec<String>, Vec<String>) {
        self.corpus.iter().map(|d| (d.title.clone(), d.description.clone())).unzip()
    }
}
