//! Lance-backed embedding cache keyed by `(content_hash, embedder_id)`.
//!
//! Consulted before calling an embedder and written through on misses, so a
//! corpus is embedded once per model.
use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray, TimestampMillisecondArray};
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::schema::build_cache_schema;
use crate::table::{ensure_cache_table, table_exists};

#[derive(Clone, Debug, PartialEq)]
pub struct CacheEntry {
    pub content_hash: String,
    pub embedder_id: String,
    pub vector: Vec<f32>,
}

/// Hex blake3 digest used as the cache key for a text.
pub fn content_hash(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Keys per lookup query; each chunk becomes one `content_hash IN (...)` filter.
pub const LOOKUP_CHUNK: usize = 256;

/// Cached vectors for `hashes` under `embedder_id`. Rows of the wrong width
/// are skipped and count as misses.
pub async fn get_many(
    conn: &Connection,
    table: &str,
    embedder_id: &str,
    hashes: &[String],
    dim: usize,
) -> Result<HashMap<String, Vec<f32>>> {
    let mut out = HashMap::new();
    if hashes.is_empty() || !table_exists(conn, table).await? {
        return Ok(out);
    }
    let mut seen = HashSet::new();
    let wanted: Vec<&str> = hashes.iter().map(String::as_str).filter(|h| seen.insert(*h)).collect();
    let t = conn.open_table(table).execute().await?;
    for chunk in wanted.chunks(LOOKUP_CHUNK) {
        let keys = chunk.iter().map(|h| sql_literal(h)).collect::<Vec<_>>().join(", ");
        let filter = format!("embedder_id = {} AND content_hash IN ({})", sql_literal(embedder_id), keys);
        let mut stream = t.query().only_if(filter).execute().await?;
        while let Some(batch) = stream.try_next().await? {
            let hash_col = batch
                .column_by_name("content_hash")
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
                .ok_or_else(|| anyhow!("cache.content_hash column missing"))?;
            let vec_col = batch
                .column_by_name("vector")
                .and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>())
                .ok_or_else(|| anyhow!("cache.vector column missing"))?;
            for i in 0..batch.num_rows() {
                if vec_col.is_null(i) {
                    continue;
                }
                let vals: Vec<f32> = vec_col.value(i).as_primitive::<Float32Type>().values().to_vec();
                if vals.len() == dim {
                    out.insert(hash_col.value(i).to_string(), vals);
                }
            }
        }
    }
    debug!("Cache '{}': {}/{} hits for {}", table, out.len(), wanted.len(), embedder_id);
    Ok(out)
}

fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub async fn put_many(conn: &Connection, table: &str, dim: usize, entries: &[CacheEntry]) -> Result<()> {
    if entries.is_empty() {
        return Ok(());
    }
    ensure_cache_table(conn, table, dim).await?;
    if let Some(bad) = entries.iter().find(|e| e.vector.len() != dim) {
        return Err(anyhow!("cache entry {} has {} values, expected {}", bad.content_hash, bad.vector.len(), dim));
    }
    let width = i32::try_from(dim)?;
    let schema = build_cache_schema(width);
    let now = Utc::now().timestamp_millis();
    let hashes: Vec<&str> = entries.iter().map(|e| e.content_hash.as_str()).collect();
    let eids: Vec<&str> = entries.iter().map(|e| e.embedder_id.as_str()).collect();
    let created = vec![now; entries.len()];
    let vectors = entries.iter().map(|e| Some(e.vector.iter().copied().map(Some).collect::<Vec<_>>()));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(hashes)),
            Arc::new(StringArray::from(eids)),
            Arc::new(TimestampMillisecondArray::from(created)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, width)),
        ],
    )?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
    conn.open_table(table).execute().await?.add(reader).execute().await?;
    debug!("Cache '{}': stored {} vectors", table, entries.len());
    Ok(())
}
