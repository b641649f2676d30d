//! Embedding providers for the dense backend.
//!
//! `XlmRobertaEmbedder` runs a local XLM-RoBERTa encoder (e.g. BGE-M3) with
//! candle and mean-pools the last hidden state. `HashingEmbedder` is a
//! deterministic bag-of-words stand-in for tests and offline development.
//! Both return L2-normalized vectors.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use paperrec_core::config::{EmbeddingConfig, EmbeddingProviderKind};
use paperrec_core::error::Error;
use paperrec_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Texts per encoder forward pass.
const FORWARD_BATCH: usize = 16;

pub struct XlmRobertaEmbedder {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    id: String,
}

impl XlmRobertaEmbedder {
    /// Load `tokenizer.json`, `config.json` and `pytorch_model.bin` from `model_dir`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        info!("Loading XLM-RoBERTa encoder from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_path = model_dir.join("config.json");
        let config_text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        let config: XLMRobertaConfig = serde_json::from_str(&config_text)?;
        let raw: serde_json::Value = serde_json::from_str(&config_text)?;
        let dim = raw
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("{} has no hidden_size", config_path.display()))? as usize;

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights = candle_core::pickle::read_all(&weights_path)
            .with_context(|| format!("reading weights {}", weights_path.display()))?;
        let weights_map: std::collections::HashMap<String, Tensor> = weights.into_iter().collect();
        let vb = VarBuilder::from_tensors(weights_map, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)?;

        let name = model_dir.file_name().map_or_else(|| "model".to_string(), |n| n.to_string_lossy().to_string());
        let id = format!("xlm-roberta:{}:d{}", name, dim);
        info!("Encoder {} ready", id);
        Ok(Self { model, tokenizer, device, dim, max_len, id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled: Vec<Vec<f32>> = masked_mean_l2(&hidden, &attention_mask)?.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(bad) = pooled.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("encoder produced {} values, expected {}", bad.len(), self.dim));
        }
        debug!("Embedded {} texts in {:?}", texts.len(), start.elapsed());
        Ok(pooled)
    }
}

impl Embedder for XlmRobertaEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(FORWARD_BATCH) {
            out.extend(self.embed_chunk(chunk)?);
        }
        Ok(out)
    }
}

/// Hashes lowercase whitespace tokens into `dim` buckets and L2-normalizes.
/// Texts sharing words get positive cosine; empty text maps to the zero vector.
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("hashing:d{}", dim) }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 { for x in &mut v { *x /= norm; } }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

/// Build the configured provider. A model that cannot be found or loaded is a
/// configuration error, reported here rather than on first use.
pub fn load_embedder(config: &EmbeddingConfig) -> paperrec_core::Result<Arc<dyn Embedder>> {
    config.validate()?;
    match config.provider {
        EmbeddingProviderKind::Hashing => {
            info!("Using hashing embeddings (d={})", config.dim);
            Ok(Arc::new(HashingEmbedder::new(config.dim)))
        }
        EmbeddingProviderKind::XlmRoberta => {
            let dir = resolve_model_dir(config.model_dir.as_deref()).map_err(|e| Error::InvalidConfig(format!("{:#}", e)))?;
            let model = XlmRobertaEmbedder::load(&dir, config.max_len)
                .map_err(|e| Error::InvalidConfig(format!("loading encoder from {}: {:#}", dir.display(), e)))?;
            Ok(Arc::new(model))
        }
    }
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    if let Some(dir) = configured {
        let p = paperrec_core::config::expand_path(dir);
        if p.exists() { return Ok(p); }
        return Err(anyhow!("configured model_dir {} does not exist", p.display()));
    }
    if let Ok(dir) = std::env::var("MODEL_DIR") { let p = PathBuf::from(&dir); if p.exists() { info!("Using MODEL_DIR: {}", p.display()); return Ok(p); } }
    let local = Path::new("models/bge-m3"); if local.exists() { return Ok(local.to_path_buf()); }
    Err(anyhow!("Could not locate an encoder model directory (set embedding.model_dir)"))
}
