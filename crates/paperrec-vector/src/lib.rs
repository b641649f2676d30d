//! Dense embedding space and its LanceDB-backed embedding cache.
pub mod cache;
pub mod embed_backfill;
pub mod schema;
pub mod space;
pub mod table;

pub use embed_backfill::{embed_corpus_cached, CachedEmbeddings};
pub use space::{compose_text, l2_normalize, DenseEmbeddingSpace, DenseMatrix};
