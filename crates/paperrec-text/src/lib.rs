//! paperrec-text
//!
//! Lexical backend: character n-gram TF-IDF over weighted title and
//! description fields, with shared-term explanations and JSON snapshots.

pub mod snapshot;
pub mod space;
pub mod sparse;
pub mod tantivy_utils;
pub mod vocab;

pub use space::{corpus_fingerprint, LexicalState, WeightedVectorSpace};
pub use sparse::{cosine, SparseMatrix, SparseVector};
pub use tantivy_utils::NgramAnalyzer;
pub use vocab::TfidfVocabulary;
