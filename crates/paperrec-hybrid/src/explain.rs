//! Human-readable justification for a recommended document.

use anyhow::{anyhow, Result};
use tracing::warn;

use paperrec_core::traits::Summarizer;

/// Shown when the lexical backend ran but found no shared n-gram.
pub const NO_OVERLAP_LABEL: &str = "core concepts";
/// Shown when only the dense backend ran.
pub const DENSE_ONLY_LABEL: &str = "semantic similarity";

pub fn shared_label(terms: &[String], lexical_used: bool) -> String {
    if !lexical_used {
        DENSE_ONLY_LABEL.to_string()
    } else if terms.is_empty() {
        NO_OVERLAP_LABEL.to_string()
    } else {
        terms.join(", ")
    }
}

/// First `max_chars` characters of `description` followed by `...`.
pub fn truncated_description(description: &str, max_chars: usize) -> String {
    let head: String = description.chars().take(max_chars).collect();
    format!("{}...", head)
}

/// Summary for display; any summarizer failure or empty output falls back to
/// the truncated description.
pub fn summarize_or_truncate(summarizer: Option<&dyn Summarizer>, description: &str, max_chars: usize) -> String {
    let Some(summarizer) = summarizer else {
        return truncated_description(description, max_chars);
    };
    match summarizer.summarize(description) {
        Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
        Ok(_) => truncated_description(description, max_chars),
        Err(e) => {
            warn!("Summarizer failed, using truncated description: {:#}", e);
            truncated_description(description, max_chars)
        }
    }
}

pub fn justification(summary: &str, shared: &str, query: &str) -> String {
    format!(
        "This paper centers on {}, which relates closely to '{}' in your request. \
         It offers empirical and methodological insight into '{}' that can help in understanding and addressing the topic.",
        summary, shared, query
    )
}

/// Extractive summarizer: the leading sentences of a text that fit within a
/// character budget. A first sentence longer than the budget is cut at a word
/// boundary and marked with `...`.
#[derive(Debug, Clone)]
pub struct LeadSummarizer {
    max_chars: usize,
}

impl LeadSummarizer {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars: max_chars.max(1) }
    }
}

impl Default for LeadSummarizer {
    fn default() -> Self {
        Self::new(150)
    }
}

impl Summarizer for LeadSummarizer {
    fn summarize(&self, text: &str) -> Result<String> {
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return Err(anyhow!("nothing to summarize"));
        }
        let mut out = String::new();
        for sentence in sentences(&text) {
            let candidate = if out.is_empty() { sentence.to_string() } else { format!("{} {}", out, sentence) };
            if candidate.chars().count() > self.max_chars {
                break;
            }
            out = candidate;
        }
        if out.is_empty() {
            let head: String = text.chars().take(self.max_chars).collect();
            let cut = head.rfind(' ').filter(|&i| i > 0).map_or(head.as_str(), |i| &head[..i]);
            out = format!("{}...", cut.trim_end_matches([',', ';', ':']));
        }
        Ok(out)
    }
}

/// Split after `.`, `!` or `?` when followed by a space. Input has single spaces.
fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut prev_terminal = false;
    for (i, c) in text.char_indices() {
        if c == ' ' && prev_terminal {
            out.push(&text[start..i]);
            start = i + 1;
        }
        prev_terminal = matches!(c, '.' | '!' | '?');
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    impl Summarizer for Failing {
        fn summarize(&self, _text: &str) -> Result<String> {
            Err(anyhow!("model unavailable"))
        }
    }

    #[test]
    fn labels_cover_each_case() {
        assert_eq!(shared_label(&["ca".into(), "anc".into()], true), "ca, anc");
        assert_eq!(shared_label(&[], true), NO_OVERLAP_LABEL);
        assert_eq!(shared_label(&[], false), DENSE_ONLY_LABEL);
    }

    #[test]
    fn failing_summarizer_falls_back_to_truncation() {
        let description = "x".repeat(200);
        let s = summarize_or_truncate(Some(&Failing as &dyn Summarizer), &description, 150);
        assert_eq!(s, format!("{}...", "x".repeat(150)));
        assert_eq!(summarize_or_truncate(None, "short", 150), "short...");
        assert_eq!(summarize_or_truncate(Some(&Failing as &dyn Summarizer), "", 150), "...");
    }

    #[test]
    fn truncation_counts_characters() {
        assert_eq!(truncated_description("데이터 분석", 3), "데이터...");
    }

    #[test]
    fn lead_summarizer_keeps_whole_sentences() {
        let s = LeadSummarizer::new(40);
        let text = "First sentence here. Second one is longer than the rest. Third.";
        assert_eq!(s.summarize(text).unwrap(), "First sentence here.");
        assert_eq!(LeadSummarizer::new(200).summarize(text).unwrap(), text);
        assert!(s.summarize("   ").is_err());
    }

    #[test]
    fn lead_summarizer_cuts_long_first_sentence_at_a_word() {
        let s = LeadSummarizer::new(12);
        assert_eq!(s.summarize("alpha beta gamma delta").unwrap(), "alpha beta...");
    }

    #[test]
    fn justification_mentions_summary_terms_and_query() {
        let j = justification("tumor detection", "canc, ance", "cancer imaging");
        assert!(j.contains("tumor detection"));
        assert!(j.contains("'canc, ance'"));
        assert!(j.contains("'cancer imaging'"));
    }
}
