use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use paperrec_core::config::LexicalConfig;
use paperrec_core::error::{Error, Result};
use paperrec_core::traits::VectorSpace;
use paperrec_core::types::{BackendKind, DocId};

use crate::sparse::{cosine, SparseMatrix, SparseVector};
use crate::tantivy_utils::NgramAnalyzer;
use crate::vocab::TfidfVocabulary;

/// Everything a fitted lexical space needs; serializable for snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexicalState {
    config: LexicalConfig,
    title_vocab: TfidfVocabulary,
    description_vocab: TfidfVocabulary,
    corpus: SparseMatrix,
    /// `corpus_fingerprint` of the texts the state was fitted on. Snapshots
    /// written before it existed load with an empty value.
    #[serde(default)]
    fingerprint: String,
}

impl LexicalState {
    pub fn config(&self) -> &LexicalConfig {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Whether this state was fitted on exactly these fields, in this order.
    pub fn matches_corpus(&self, titles: &[String], descriptions: &[String]) -> bool {
        self.fingerprint == corpus_fingerprint(titles, descriptions)
    }

    pub fn n_docs(&self) -> usize {
        self.corpus.n_rows()
    }
}

/// blake3 over every title and description, length-prefixed so field
/// boundaries count.
pub fn corpus_fingerprint(titles: &[String], descriptions: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(titles.len() as u64).to_le_bytes());
    for field in titles.iter().chain(descriptions) {
        hasher.update(&(field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

/// Title and description TF-IDF spaces over character n-grams, weighted and
/// concatenated column-wise (title columns first).
pub struct WeightedVectorSpace {
    config: LexicalConfig,
    analyzer: NgramAnalyzer,
    state: Option<LexicalState>,
}

impl WeightedVectorSpace {
    pub fn new(config: LexicalConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = NgramAnalyzer::new(config.ngram_min, config.ngram_max)?;
        Ok(Self { config, analyzer, state: None })
    }

    /// Restore a previously fitted space. Behaves exactly like the space the
    /// state was taken from.
    pub fn from_state(state: LexicalState) -> Result<Self> {
        let expected = state.title_vocab.len() + state.description_vocab.len();
        if state.corpus.dim() != expected {
            return Err(Error::DimensionMismatch { expected, actual: state.corpus.dim() });
        }
        if !state.corpus.is_consistent() {
            return Err(Error::InvalidConfig("lexical state holds malformed corpus rows".to_string()));
        }
        let mut space = Self::new(state.config.clone())?;
        space.state = Some(state);
        Ok(space)
    }

    pub fn config(&self) -> &LexicalConfig {
        &self.config
    }

    pub fn state(&self) -> Option<&LexicalState> {
        self.state.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// `(title, description)` vocabulary sizes.
    pub fn vocabulary_sizes(&self) -> Result<(usize, usize)> {
        let state = self.fitted()?;
        Ok((state.title_vocab.len(), state.description_vocab.len()))
    }

    fn fitted(&self) -> Result<&LexicalState> {
        self.state
            .as_ref()
            .ok_or_else(|| Error::NotFitted("lexical space used before fit".to_string()))
    }

    fn project(state: &LexicalState, grams: &[String]) -> SparseVector {
        let mut t = state.title_vocab.transform(grams);
        let mut d = state.description_vocab.transform(grams);
        t.scale(state.config.title_weight);
        d.scale(state.config.description_weight);
        t.concat(state.title_vocab.len() as u32, &d)
    }

    /// N-gram string behind a corpus column.
    pub fn feature_name(&self, column: usize) -> Result<&str> {
        let state = self.fitted()?;
        let boundary = state.title_vocab.len();
        let name = if column < boundary {
            state.title_vocab.term(column)
        } else {
            state.description_vocab.term(column - boundary)
        };
        name.ok_or(Error::DimensionMismatch { expected: state.corpus.dim(), actual: column + 1 })
    }

    /// The `top_n` n-grams shared by `query` and document `doc_id`, strongest
    /// first by product of weights (ties by lower column). An n-gram present
    /// in both fields is listed once. Empty when nothing overlaps.
    pub fn explain_top_ngrams(&self, query: &SparseVector, doc_id: DocId, top_n: usize) -> Result<Vec<String>> {
        let state = self.fitted()?;
        let row = state
            .corpus
            .row(doc_id)
            .ok_or(Error::DimensionMismatch { expected: state.corpus.n_rows(), actual: doc_id + 1 })?;

        let mut products = query.hadamard(row);
        products.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut terms: Vec<String> = Vec::with_capacity(top_n);
        for (column, _) in products {
            if terms.len() >= top_n {
                break;
            }
            let name = self.feature_name(column as usize)?;
            if !terms.iter().any(|t| t == name) {
                terms.push(name.to_string());
            }
        }
        Ok(terms)
    }
}

impl VectorSpace for WeightedVectorSpace {
    type Vector = SparseVector;
    type Matrix = SparseMatrix;

    fn fit(&mut self, titles: &[String], descriptions: &[String]) -> Result<()> {
        if titles.len() != descriptions.len() {
            return Err(Error::DimensionMismatch { expected: titles.len(), actual: descriptions.len() });
        }
        let title_grams = self.analyzer.ngrams_each(titles);
        let description_grams = self.analyzer.ngrams_each(descriptions);

        let (title_vocab, title_rows) = TfidfVocabulary::fit(&title_grams, self.config.max_features_title);
        let (description_vocab, description_rows) =
            TfidfVocabulary::fit(&description_grams, self.config.max_features_description);

        let offset = title_vocab.len() as u32;
        let rows = title_rows
            .into_iter()
            .zip(description_rows)
            .map(|(mut t, mut d)| {
                t.scale(self.config.title_weight);
                d.scale(self.config.description_weight);
                t.concat(offset, &d)
            })
            .collect();
        let corpus = SparseMatrix::new(title_vocab.len() + description_vocab.len(), rows);

        info!(
            "Fitted lexical space: {} docs, {} title n-grams, {} description n-grams",
            corpus.n_rows(),
            title_vocab.len(),
            description_vocab.len()
        );
        self.state = Some(LexicalState {
            config: self.config.clone(),
            title_vocab,
            description_vocab,
            corpus,
            fingerprint: corpus_fingerprint(titles, descriptions),
        });
        Ok(())
    }

    fn encode(&self, query: &str) -> Result<SparseVector> {
        let state = self.fitted()?;
        let grams = self.analyzer.ngrams(query);
        let vector = Self::project(state, &grams);
        debug!("Encoded query into {} lexical dimensions ({} n-grams)", vector.nnz(), grams.len());
        Ok(vector)
    }

    fn corpus_vectors(&self) -> Result<&SparseMatrix> {
        Ok(&self.fitted()?.corpus)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Lexical
    }

    fn similarities(&self, query: &SparseVector) -> Result<Vec<f32>> {
        let state = self.fitted()?;
        if query.min_width() > state.corpus.dim() {
            return Err(Error::DimensionMismatch { expected: state.corpus.dim(), actual: query.min_width() });
        }
        Ok(state.corpus.rows().iter().map(|row| cosine(query, row)).collect())
    }
}
