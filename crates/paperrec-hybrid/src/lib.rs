//! Hybrid recommender: fuses lexical and dense similarities, ranks the
//! corpus, assigns query-relative tiers and explains each match. `eval`
//! scores a ranking against relevance judgements.
//!
//! ```no_run
//! use paperrec_core::config::RecommenderConfig;
//! use paperrec_core::types::Document;
//! use paperrec_hybrid::Recommender;
//!
//! # fn main() -> paperrec_core::Result<()> {
//! let corpus = vec![Document::new("Deep learning for cancer imaging", "A CNN model for tumor detection")];
//! let mut rec = Recommender::new(RecommenderConfig::default(), corpus, None)?;
//! rec.fit()?;
//! for r in rec.recommend("cancer imaging", 5)? {
//!     println!("{} {} [{}] {}", r.rank, r.document.title, r.tier, r.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod eval;
pub mod explain;
pub mod fusion;
pub mod rank;
pub mod recommender;
pub mod sink;

pub use backend::{Backend, QueryVector};
pub use explain::LeadSummarizer;
pub use recommender::{PrefitState, Recommender};
pub use sink::{CsvSink, JsonlSink};
