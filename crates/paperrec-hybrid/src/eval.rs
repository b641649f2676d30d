//! Offline ranking evaluation: nDCG@k, MRR@k and Recall@k over a query set
//! with relevance judgements.
//!
//! Queries come from a CSV with `id,title,desc` columns and judgements from a
//! CSV with `id,doc_id,rel`. A judged `doc_id` matches a result when it equals
//! the result's corpus index or occurs in its url or title.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use paperrec_core::types::RankedResult;

use crate::recommender::Recommender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvalQuery {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub query_id: String,
    pub doc_ref: String,
    pub gain: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryMetrics {
    pub query_id: String,
    pub ndcg: f64,
    pub mrr: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub k: usize,
    pub per_query: Vec<QueryMetrics>,
    pub mean_ndcg: f64,
    pub mean_mrr: f64,
    pub mean_recall: f64,
}

#[derive(Deserialize)]
struct QueryRow {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    desc: String,
}

#[derive(Deserialize)]
struct QrelRow {
    id: String,
    doc_id: String,
    #[serde(default)]
    rel: Option<f64>,
}

/// Normalized discounted cumulative gain of the first `k` gains, against the
/// best ordering of those same gains. Zero when none is positive.
pub fn ndcg_at_k(gains: &[f64], k: usize) -> f64 {
    let top = &gains[..gains.len().min(k)];
    let dcg = discounted(top.iter().copied());
    let mut ideal = top.to_vec();
    ideal.sort_by(|a, b| b.total_cmp(a));
    let idcg = discounted(ideal.into_iter());
    if idcg > 0.0 { dcg / idcg } else { 0.0 }
}

fn discounted(gains: impl Iterator<Item = f64>) -> f64 {
    gains.enumerate().map(|(i, g)| g / ((i + 2) as f64).log2()).sum()
}

/// Reciprocal rank of the first relevant result within `k`.
pub fn mrr_at_k(gains: &[f64], k: usize) -> f64 {
    gains
        .iter()
        .take(k)
        .position(|&g| g > 0.0)
        .map_or(0.0, |i| 1.0 / (i + 1) as f64)
}

/// Share of the `total_relevant` judged documents found within `k`.
pub fn recall_at_k(gains: &[f64], total_relevant: usize, k: usize) -> f64 {
    let found = gains.iter().take(k).filter(|&&g| g > 0.0).count();
    found as f64 / total_relevant.max(1) as f64
}

pub fn load_queries(path: &Path) -> Result<Vec<EvalQuery>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    reader
        .deserialize::<QueryRow>()
        .map(|row| {
            let row = row.with_context(|| format!("reading {}", path.display()))?;
            let text = format!("{} {}", row.title, row.desc).trim().to_string();
            Ok(EvalQuery { id: row.id, text })
        })
        .collect()
}

/// Judgements with a positive gain; a missing `rel` counts as 1.
pub fn load_qrels(path: &Path) -> Result<Vec<Judgement>> {
    let mut reader = csv::Reader::from_path(path).with_context(|| format!("opening {}", path.display()))?;
    let mut out = Vec::new();
    for row in reader.deserialize::<QrelRow>() {
        let row = row.with_context(|| format!("reading {}", path.display()))?;
        let gain = row.rel.unwrap_or(1.0);
        if gain > 0.0 && !row.doc_id.trim().is_empty() {
            out.push(Judgement { query_id: row.id, doc_ref: row.doc_id.trim().to_string(), gain });
        }
    }
    Ok(out)
}

/// Run every query through `rec` and score the top `k` against `qrels`.
/// Blank queries are skipped with a warning.
pub fn evaluate(rec: &Recommender, queries: &[EvalQuery], qrels: &[Judgement], k: usize) -> Result<EvalReport> {
    let mut by_query: HashMap<&str, Vec<&Judgement>> = HashMap::new();
    for j in qrels {
        by_query.entry(j.query_id.as_str()).or_default().push(j);
    }

    let mut per_query = Vec::with_capacity(queries.len());
    for q in queries {
        if q.text.is_empty() {
            warn!("Skipping evaluation query {}: no text", q.id);
            continue;
        }
        let judged = by_query.get(q.id.as_str()).map(Vec::as_slice).unwrap_or_default();
        let results = rec.recommend(&q.text, k)?;
        let gains: Vec<f64> = results.iter().map(|r| judged_gain(r, judged)).collect();
        per_query.push(QueryMetrics {
            query_id: q.id.clone(),
            ndcg: ndcg_at_k(&gains, k),
            mrr: mrr_at_k(&gains, k),
            recall: recall_at_k(&gains, judged.len(), k),
        });
    }

    let mean = |f: fn(&QueryMetrics) -> f64| {
        if per_query.is_empty() { 0.0 } else { per_query.iter().map(f).sum::<f64>() / per_query.len() as f64 }
    };
    let report = EvalReport {
        k,
        mean_ndcg: mean(|m| m.ndcg),
        mean_mrr: mean(|m| m.mrr),
        mean_recall: mean(|m| m.recall),
        per_query,
    };
    info!("Evaluated {} queries at k={}", report.per_query.len(), k);
    Ok(report)
}

fn judged_gain(result: &RankedResult<'_>, judged: &[&Judgement]) -> f64 {
    let doc = result.document;
    judged
        .iter()
        .filter(|j| {
            j.doc_ref == result.doc_id.to_string()
                || doc.title.contains(j.doc_ref.as_str())
                || doc.url.as_deref().is_some_and(|u| u.contains(j.doc_ref.as_str()))
        })
        .map(|j| j.gain)
        .fold(0.0, f64::max)
}
