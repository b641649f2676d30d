use std::fmt;
use tantivy::tokenizer::{LowerCaser, NgramTokenizer, TextAnalyzer, Token, TokenStream};

use paperrec_core::error::{Error, Result};

/// Character n-gram analyzer: lowercases, collapses whitespace runs to one
/// space, then emits every substring of `min..=max` chars (spaces included).
///
/// The tantivy pipeline is built once; each call streams through a clone.
#[derive(Clone)]
pub struct NgramAnalyzer {
	min: usize,
	max: usize,
	analyzer: TextAnalyzer,
}

impl fmt::Debug for NgramAnalyzer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("NgramAnalyzer").field("min", &self.min).field("max", &self.max).finish_non_exhaustive()
	}
}

impl NgramAnalyzer {
	pub fn new(min: usize, max: usize) -> Result<Self> {
		let tokenizer = NgramTokenizer::new(min, max, false)
			.map_err(|e| Error::InvalidConfig(format!("ngram range {}..={}: {}", min, max, e)))?;
		let analyzer = TextAnalyzer::builder(tokenizer).filter(LowerCaser).build();
		Ok(Self { min, max, analyzer })
	}

	/// All n-grams of `text`, with repeats, in stream order.
	pub fn ngrams(&self, text: &str) -> Vec<String> {
		let mut analyzer = self.analyzer.clone();
		stream_ngrams(&mut analyzer, text)
	}

	/// `ngrams` for every text, sharing one analyzer clone.
	pub fn ngrams_each(&self, texts: &[String]) -> Vec<Vec<String>> {
		let mut analyzer = self.analyzer.clone();
		texts.iter().map(|t| stream_ngrams(&mut analyzer, t)).collect()
	}
}

fn stream_ngrams(analyzer: &mut TextAnalyzer, text: &str) -> Vec<String> {
	let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
	let mut grams = Vec::new();
	let mut stream = analyzer.token_stream(&normalized);
	stream.process(&mut |token: &Token| grams.push(token.text.clone()));
	grams
}
