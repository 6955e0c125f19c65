//! Configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (`__` separates nesting levels, e.g. `APP_RETRIEVAL__K`).
//! Provides helpers to expand `~` and `${VAR}` and to resolve relative paths
//! against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Wrap an already-built figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Self { Self { figment } }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// Typed, validated settings.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::InvalidConfig(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data: DataSettings,
    pub embedding: EmbeddingSettings,
    pub retrieval: RetrievalSettings,
    pub chunking: ChunkingSettings,
    /// Variant key (stored label) to display label.
    pub variants: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSettings {
    pub lancedb_dir: String,
    pub tantivy_dir: String,
    pub table: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub dim: usize,
    pub provider: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Results per scope.
    pub k: usize,
    /// Candidates drawn from each of the vector and keyword lists.
    pub candidate_breadth: usize,
    /// RRF smoothing constant.
    pub rrf_k: f64,
    pub rerank_top_n: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSettings {
    pub local_chunk_size: usize,
    pub local_chunk_overlap: usize,
    pub source_tag: String,
}

impl Default for Settings {
    fn default() -> Self {
        let variants = [("outdoor", "Outdoor Hockey"), ("indoor", "Indoor Hockey"), ("hockey5s", "Hockey 5s")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self {
            data: DataSettings {
                lancedb_dir: "data/lancedb".to_string(),
                tantivy_dir: "data/tantivy".to_string(),
                table: "rule_chunks".to_string(),
            },
            embedding: EmbeddingSettings { dim: 768, provider: "hashing".to_string() },
            retrieval: RetrievalSettings { k: 15, candidate_breadth: 50, rrf_k: 60.0, rerank_top_n: 10 },
            chunking: ChunkingSettings {
                local_chunk_size: 1000,
                local_chunk_overlap: 200,
                source_tag: "PDF (Layout)".to_string(),
            },
            variants,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.data.lancedb_dir.trim().is_empty() || self.data.tantivy_dir.trim().is_empty() {
            return invalid("data.lancedb_dir and data.tantivy_dir must be set".into());
        }
        if self.data.table.trim().is_empty() {
            return invalid("data.table must be set".into());
        }
        if self.embedding.dim == 0 {
            return invalid("embedding.dim must be positive".into());
        }
        if self.retrieval.k == 0 {
            return invalid("retrieval.k must be positive".into());
        }
        if self.retrieval.candidate_breadth < self.retrieval.k {
            return invalid(format!(
                "retrieval.candidate_breadth ({}) must be >= retrieval.k ({})",
                self.retrieval.candidate_breadth, self.retrieval.k
            ));
        }
        if !(self.retrieval.rrf_k.is_finite() && self.retrieval.rrf_k > 0.0) {
            return invalid("retrieval.rrf_k must be a positive number".into());
        }
        if self.chunking.local_chunk_overlap >= self.chunking.local_chunk_size {
            return invalid("chunking.local_chunk_overlap must be smaller than local_chunk_size".into());
        }
        if self.variants.is_empty() {
            return invalid("at least one variant must be configured".into());
        }
        Ok(())
    }

    /// Fails with [`Error::UnknownVariant`] for variants outside the configured set.
    pub fn check_variant(&self, variant: &str) -> crate::error::Result<()> {
        if self.variants.contains_key(variant) {
            return Ok(());
        }
        Err(Error::UnknownVariant { variant: variant.to_string(), allowed: self.variants.keys().cloned().collect() })
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
