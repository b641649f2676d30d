//! JSON persistence for fitted lexical state, so a corpus is vectorized once
//! and reloaded on later runs.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::space::LexicalState;

pub fn save(path: &Path, state: &LexicalState) -> Result<()> {
	if let Some(parent) = path.parent() { if !parent.as_os_str().is_empty() { fs::create_dir_all(parent)?; } }
	let json = serde_json::to_vec(state)?;
	fs::write(path, json).with_context(|| format!("writing lexical snapshot {}", path.display()))?;
	info!("Saved lexical snapshot ({} docs) to {}", state.n_docs(), path.display());
	Ok(())
}

/// Load a snapshot; `Ok(None)` when the file does not exist.
pub fn load(path: &Path) -> Result<Option<LexicalState>> {
	if !path.exists() { return Ok(None); }
	let bytes = fs::read(path).with_context(|| format!("reading lexical snapshot {}", path.display()))?;
	let state: LexicalState = serde_json::from_slice(&bytes).with_context(|| format!("decoding lexical snapshot {}", path.display()))?;
	info!("Loaded lexical snapshot ({} docs) from {}", state.n_docs(), path.display());
	Ok(Some(state))
}
