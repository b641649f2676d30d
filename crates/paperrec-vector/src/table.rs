//! LanceDB connection and table housekeeping.
use anyhow::{anyhow, Result};
use arrow_array::RecordBatchIterator;
use arrow_schema::Schema;
use lancedb::{connect, Connection};
use std::sync::Arc;
use tracing::info;

use crate::schema::{build_cache_schema, vector_width};

pub async fn open_db(uri: &str) -> Result<Connection> {
    Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<Schema>) -> Result<()> {
    if table_exists(conn, name).await? {
        return Ok(());
    }
    // create empty table with 0 rows
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
    conn.create_table(name, Box::new(iter)).execute().await?;
    info!("Created table '{}'", name);
    Ok(())
}

/// Create the cache table for `dim`-wide vectors, or check that an existing
/// one has that width. A cache built for another width is an error, not a miss.
pub async fn ensure_cache_table(conn: &Connection, name: &str, dim: usize) -> Result<()> {
    let width = i32::try_from(dim).map_err(|_| anyhow!("embedding width {} too large for cache", dim))?;
    if table_exists(conn, name).await? {
        let schema = conn.open_table(name).execute().await?.schema().await?;
        return match vector_width(&schema) {
            Some(w) if w == width => Ok(()),
            Some(w) => Err(anyhow!("cache table '{}' holds {}-wide vectors, embedder produces {}", name, w, dim)),
            None => Err(anyhow!("table '{}' is not an embedding cache", name)),
        };
    }
    ensure_table(conn, name, build_cache_schema(width)).await
}
