//! Top-K selection and query-relative tiers.

use paperrec_core::config::TierConfig;
use paperrec_core::types::{DocId, Tier};

/// Percentile `p` (0..=100) of `scores` with linear interpolation between the
/// closest ranks, at position `p / 100 * (n - 1)` of the ascending order.
/// Returns 0 for an empty input.
pub fn percentile(scores: &[f32], p: f64) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = scores.iter().map(|&s| f64::from(s)).collect();
    sorted.sort_by(f64::total_cmp);
    let pos = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Tier thresholds for one query, computed over the full score distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tiering {
    medium: f64,
    high: f64,
}

impl Tiering {
    pub fn from_scores(scores: &[f32], config: &TierConfig) -> Self {
        Self {
            medium: percentile(scores, config.medium_percentile),
            high: percentile(scores, config.high_percentile),
        }
    }

    pub fn thresholds(&self) -> (f64, f64) {
        (self.medium, self.high)
    }

    pub fn tier(&self, score: f32) -> Tier {
        let s = f64::from(score);
        if s >= self.high {
            Tier::High
        } else if s >= self.medium {
            Tier::Medium
        } else {
            Tier::Low
        }
    }
}

/// The `k` best `(doc_id, score)` pairs, highest score first; equal scores
/// keep corpus order.
pub fn top_k(scores: &[f32], k: usize) -> Vec<(DocId, f32)> {
    let mut order: Vec<DocId> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]).then(a.cmp(&b)));
    order.truncate(k);
    order.into_iter().map(|i| (i, scores[i])).collect()
}

/// Round to four decimals for display.
pub fn round4(x: f32) -> f32 {
    ((f64::from(x) * 10_000.0).round() / 10_000.0) as f32
}
