//! Lightweight configuration loader, typed settings, and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_RECOMMENDER__HYBRID_ALPHA=0.7`).
//! Every section has defaults, so an empty Figment yields a working setup.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::BackendMode;

pub struct Config {
    figment: Figment,
}

impl Config {
    /// Merge `config.toml`, the overlay for `RUST_ENV` (default `dev`) and
    /// `APP_*` variables, then run the environment-specific checks.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        if let Some(overlay) = overlay_file(&env_name) {
            figment = figment.merge(Toml::file(overlay));
        }
        let config = Self { figment: figment.merge(Env::prefixed("APP_").split("__")) };
        config.check_environment(&env_name)?;
        Ok(config)
    }

    /// Wrap an already-assembled Figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self {
        Self { figment }
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("config key '{}': {}", key, e))
    }

    /// Like `get`, but an absent section yields `T::default()`.
    pub fn get_or_default<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: DeserializeOwned + Default,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(T::default()) }
    }

    pub fn recommender(&self) -> anyhow::Result<RecommenderConfig> {
        let cfg: RecommenderConfig = self.get_or_default("recommender")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn embedding(&self) -> anyhow::Result<EmbeddingConfig> {
        let cfg: EmbeddingConfig = self.get_or_default("embedding")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn data(&self) -> anyhow::Result<DataConfig> {
        self.get_or_default("data")
    }

    /// Production must not serve dense rankings from the hashing stand-in.
    fn check_environment(&self, env_name: &str) -> anyhow::Result<()> {
        if !matches!(env_name, "prod" | "production") {
            return Ok(());
        }
        let rec = self.recommender()?;
        if rec.mode.uses_dense() && self.embedding()?.provider == EmbeddingProviderKind::Hashing {
            anyhow::bail!("{} mode in production needs a model embedding provider, not hashing", rec.mode);
        }
        Ok(())
    }
}

fn overlay_file(env_name: &str) -> Option<&'static str> {
    match env_name {
        "dev" | "development" => Some("config.dev.toml"),
        "prod" | "production" => Some("config.prod.toml"),
        "test" | "testing" => Some("config.test.toml"),
        _ => None,
    }
}

/// Settings for the ranking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommenderConfig {
    pub mode: BackendMode,
    /// Weight of the lexical score in hybrid mode; the dense score gets `1 - alpha`.
    pub hybrid_alpha: f32,
    /// Number of shared n-grams quoted per explanation.
    pub explain_terms: usize,
    /// Character budget for a summary when the summarizer is unavailable.
    pub summary_chars: usize,
    pub lexical: LexicalConfig,
    pub tiers: TierConfig,
}

impl Default for RecommenderConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::Lexical,
            hybrid_alpha: 0.5,
            explain_terms: 3,
            summary_chars: 150,
            lexical: LexicalConfig::default(),
            tiers: TierConfig::default(),
        }
    }
}

impl RecommenderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.hybrid_alpha) {
            return Err(Error::InvalidConfig(format!("hybrid_alpha must be in [0, 1], got {}", self.hybrid_alpha)));
        }
        self.lexical.validate()?;
        self.tiers.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalConfig {
    pub ngram_min: usize,
    pub ngram_max: usize,
    pub title_weight: f32,
    pub description_weight: f32,
    pub max_features_title: Option<usize>,
    pub max_features_description: Option<usize>,
}

impl Default for LexicalConfig {
    fn default() -> Self {
        Self {
            ngram_min: 2,
            ngram_max: 4,
            title_weight: 0.6,
            description_weight: 0.4,
            max_features_title: None,
            max_features_description: None,
        }
    }
}

impl LexicalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(Error::InvalidConfig(format!(
                "ngram range must satisfy 1 <= min <= max, got {}..={}",
                self.ngram_min, self.ngram_max
            )));
        }
        if self.title_weight < 0.0 || self.description_weight < 0.0 {
            return Err(Error::InvalidConfig("field weights must be non-negative".to_string()));
        }
        Ok(())
    }
}

/// Percentile cutoffs (0-100) over the full per-query score distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierConfig {
    pub medium_percentile: f64,
    pub high_percentile: f64,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self { medium_percentile: 60.0, high_percentile: 90.0 }
    }
}

impl TierConfig {
    pub fn validate(&self) -> Result<()> {
        let in_range = |p: f64| (0.0..=100.0).contains(&p);
        if !in_range(self.medium_percentile) || !in_range(self.high_percentile) {
            return Err(Error::InvalidConfig("tier percentiles must be in [0, 100]".to_string()));
        }
        if self.medium_percentile > self.high_percentile {
            return Err(Error::InvalidConfig(format!(
                "medium percentile {} exceeds high percentile {}",
                self.medium_percentile, self.high_percentile
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddingProviderKind {
    #[default]
    #[serde(rename = "hashing")]
    Hashing,
    #[serde(rename = "xlm-roberta")]
    XlmRoberta,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    /// Directory holding `tokenizer.json`, `config.json` and `pytorch_model.bin`.
    pub model_dir: Option<String>,
    /// Output width of the hashing provider. Model providers report their own.
    pub dim: usize,
    pub max_len: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: EmbeddingProviderKind::Hashing, model_dir: None, dim: 1024, max_len: 256 }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.dim == 0 || self.max_len == 0 {
            return Err(Error::InvalidConfig("embedding dim and max_len must be positive".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub corpus_path: Option<String>,
    /// LanceDB directory for cached corpus embeddings.
    pub cache_dir: String,
    pub cache_table: String,
    /// JSON snapshot of the fitted lexical backend.
    pub snapshot_path: String,
    pub output_path: Option<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            cache_dir: "cache/lancedb".to_string(),
            cache_table: "emb_cache".to_string(),
            snapshot_path: "cache/lexical.json".to_string(),
            output_path: None,
        }
    }
}

/// `~` and `$VAR` / `${VAR}` expansion for paths taken from config or flags.
/// Unknown variables are left as written; nothing is canonicalized.
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let raw = input.as_ref();
    let with_vars = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_vars).into_owned())
}
