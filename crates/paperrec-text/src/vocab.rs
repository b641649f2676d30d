//! Smoothed TF-IDF vocabulary over pre-tokenized documents.
//!
//! Terms are indexed in lexicographic order. Weights are raw counts times
//! `ln((1 + n) / (1 + df)) + 1`, and every transformed row is L2-normalized.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::sparse::SparseVector;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VocabularyParts", into = "VocabularyParts")]
pub struct TfidfVocabulary {
    terms: Vec<String>,
    idf: Vec<f32>,
    index: HashMap<String, u32>,
}

#[derive(Serialize, Deserialize)]
struct VocabularyParts {
    terms: Vec<String>,
    idf: Vec<f32>,
}

impl TryFrom<VocabularyParts> for TfidfVocabulary {
    type Error = String;

    fn try_from(parts: VocabularyParts) -> Result<Self, Self::Error> {
        if parts.terms.len() != parts.idf.len() {
            return Err(format!("{} terms but {} idf weights", parts.terms.len(), parts.idf.len()));
        }
        if !parts.terms.windows(2).all(|w| w[0] < w[1]) {
            return Err("vocabulary terms must be unique and sorted".to_string());
        }
        Ok(Self::from_sorted(parts.terms, parts.idf))
    }
}

impl From<TfidfVocabulary> for VocabularyParts {
    fn from(v: TfidfVocabulary) -> Self {
        Self { terms: v.terms, idf: v.idf }
    }
}

impl TfidfVocabulary {
    /// Learn terms and IDF weights, returning the vocabulary and the
    /// normalized row of every document.
    ///
    /// With `max_features`, only the terms with the highest corpus-wide count
    /// are kept (ties go to the lexicographically smaller term).
    pub fn fit(docs: &[Vec<String>], max_features: Option<usize>) -> (Self, Vec<SparseVector>) {
        let counts: Vec<HashMap<&str, u32>> = docs.iter().map(|grams| count_terms(grams)).collect();

        let mut df: HashMap<&str, u32> = HashMap::new();
        let mut total: HashMap<&str, u64> = HashMap::new();
        for doc in &counts {
            for (&term, &c) in doc {
                *df.entry(term).or_insert(0) += 1;
                *total.entry(term).or_insert(0) += u64::from(c);
            }
        }

        let mut kept: Vec<&str> = df.keys().copied().collect();
        if let Some(limit) = max_features {
            if kept.len() > limit {
                kept.sort_unstable_by(|a, b| total[b].cmp(&total[a]).then_with(|| a.cmp(b)));
                kept.truncate(limit);
            }
        }
        kept.sort_unstable();

        let n = docs.len() as f64;
        let idf: Vec<f32> = kept
            .iter()
            .map(|t| (((1.0 + n) / (1.0 + f64::from(df[t]))).ln() + 1.0) as f32)
            .collect();
        let vocab = Self::from_sorted(kept.into_iter().map(str::to_string).collect(), idf);

        let rows = counts.iter().map(|doc| vocab.weigh(doc)).collect();
        (vocab, rows)
    }

    fn from_sorted(terms: Vec<String>, idf: Vec<f32>) -> Self {
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { terms, idf, index }
    }

    /// Project tokens through the fitted vocabulary; unknown terms are dropped.
    pub fn transform(&self, grams: &[String]) -> SparseVector {
        self.weigh(&count_terms(grams))
    }

    fn weigh(&self, counts: &HashMap<&str, u32>) -> SparseVector {
        let pairs = counts
            .iter()
            .filter_map(|(term, &c)| {
                self.index.get(*term).map(|&i| (i, c as f32 * self.idf[i as usize]))
            })
            .collect();
        let mut row = SparseVector::from_pairs(pairs);
        row.l2_normalize();
        row
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn term(&self, index: usize) -> Option<&str> {
        self.terms.get(index).map(String::as_str)
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        self.index.get(term).map(|&i| self.idf[i as usize])
    }
}

fn count_terms(grams: &[String]) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for g in grams {
        *counts.entry(g.as_str()).or_insert(0) += 1;
    }
    counts
}
