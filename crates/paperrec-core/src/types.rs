//! Domain types shared by the lexical and dense engines and the recommender.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a document in the corpus. Stable for the lifetime of a fit.
pub type DocId = usize;

/// A paper or dataset record.
///
/// Loaders normalize missing fields to empty strings, so `title` and
/// `description` are never absent. `url` is `None` when the source had none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Document {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into(), url: None }
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Identifies which backend produced a vector or score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Lexical,
    Dense,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Lexical => f.write_str("lexical"),
            BackendKind::Dense => f.write_str("dense"),
        }
    }
}

/// Which backends a recommender runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    #[default]
    Lexical,
    Dense,
    Hybrid,
}

impl BackendMode {
    pub fn uses_lexical(self) -> bool {
        matches!(self, BackendMode::Lexical | BackendMode::Hybrid)
    }

    pub fn uses_dense(self) -> bool {
        matches!(self, BackendMode::Dense | BackendMode::Hybrid)
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Lexical => f.write_str("lexical"),
            BackendMode::Dense => f.write_str("dense"),
            BackendMode::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// Query-relative confidence bucket.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Low,
    Medium,
    High,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Low => f.write_str("low"),
            Tier::Medium => f.write_str("medium"),
            Tier::High => f.write_str("high"),
        }
    }
}

/// One row of a recommendation.
///
/// - `rank`: 1-based position in the returned list
/// - `doc_id`: index of `document` in the fitted corpus
/// - `score`: fused similarity in [0, 1], rounded to four decimals
/// - `shared_terms`: lexical fragments common to query and document (may be empty)
/// - `explanation`: human-readable justification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedResult<'a> {
    pub rank: usize,
    pub doc_id: DocId,
    pub document: &'a Document,
    pub score: f32,
    pub tier: Tier,
    pub shared_terms: Vec<String>,
    pub explanation: String,
}
