//! Corpus embedding with a write-through cache.
//!
//! Texts are keyed by content hash; hits come from the cache table and only
//! misses reach the embedder, in batches, before being stored back.
use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::collections::HashSet;
use tracing::info;

use paperrec_core::traits::Embedder;

use crate::cache::{content_hash, get_many, put_many, CacheEntry};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CachedEmbeddings {
    /// One vector per input text, in input order, as the embedder produced it.
    pub vectors: Vec<Vec<f32>>,
    pub hits: usize,
    pub misses: usize,
}

pub async fn embed_corpus_cached(
    conn: &Connection,
    cache_table: &str,
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
) -> Result<CachedEmbeddings> {
    if texts.is_empty() {
        return Ok(CachedEmbeddings::default());
    }
    let dim = embedder.dim();
    let hashes: Vec<String> = texts.iter().map(String::as_str).map(content_hash).collect();
    let mut cached = get_many(conn, cache_table, embedder.id(), &hashes, dim).await?;
    let hits = hashes.iter().filter(|h| cached.contains_key(*h)).count();

    // Identical texts are embedded once.
    let mut seen = HashSet::new();
    let pending: Vec<usize> = (0..texts.len())
        .filter(|&i| !cached.contains_key(&hashes[i]) && seen.insert(hashes[i].as_str()))
        .collect();

    if !pending.is_empty() {
        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} texts ({percent}%) {msg}")?
                .progress_chars("#>-"),
        );
        for chunk in pending.chunks(batch_size.max(1)) {
            let batch: Vec<String> = chunk.iter().map(|&i| texts[i].clone()).collect();
            let embs = embedder.embed_batch(&batch)?;
            if embs.len() != batch.len() {
                return Err(anyhow!("embedder returned {} vectors for {} texts", embs.len(), batch.len()));
            }
            let mut entries = Vec::with_capacity(chunk.len());
            for (&i, v) in chunk.iter().zip(embs) {
                if v.len() != dim {
                    return Err(anyhow!("dim mismatch: got {} expected {}", v.len(), dim));
                }
                entries.push(CacheEntry { content_hash: hashes[i].clone(), embedder_id: embedder.id().to_string(), vector: v });
            }
            put_many(conn, cache_table, dim, &entries).await?;
            for e in entries {
                cached.insert(e.content_hash, e.vector);
            }
            pb.inc(chunk.len() as u64);
        }
        pb.finish_with_message("embedded");
    }

    let vectors = hashes
        .iter()
        .map(|h| cached.get(h).cloned().ok_or_else(|| anyhow!("no vector for content {}", h)))
        .collect::<Result<Vec<_>>>()?;
    let misses = texts.len() - hits;
    info!("Embedded {} texts with {}: {} cached, {} computed", texts.len(), embedder.id(), hits, pending.len());
    Ok(CachedEmbeddings { vectors, hits, misses })
}
