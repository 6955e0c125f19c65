//! Embedding providers.
//!
//! The store and the retriever only see [`Embedder`]; which model sits behind
//! it is chosen from `embedding.provider`. The built-in provider is a feature
//! hashing embedder: deterministic, offline, and good enough to exercise the
//! vector path end to end.

use anyhow::Result;
use std::hash::Hasher;
use tracing::info;
use twox_hash::XxHash64;

use rulebase_core::config::EmbeddingSettings;
use rulebase_core::error::Error;
pub use rulebase_core::traits::Embedder;

pub const HASHING_PROVIDER: &str = "hashing";

/// Signed feature hashing over lowercased word unigrams and bigrams,
/// L2-normalized. Text without any word characters maps to the zero vector.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
    max_len: usize,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(Error::InvalidConfig("embedding dimension must be positive".into()).into());
        }
        Ok(Self { dim, max_len: 512 })
    }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let tokens: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .take(self.max_len)
            .map(str::to_lowercase)
            .collect();

        let mut v = vec![0f32; self.dim];
        for token in &tokens {
            self.add_feature(&mut v, token.as_bytes(), 1.0);
        }
        for pair in tokens.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut v, bigram.as_bytes(), 0.5);
        }

        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        v
    }

    fn add_feature(&self, v: &mut [f32], feature: &[u8], weight: f32) {
        let mut hasher = XxHash64::with_seed(0);
        hasher.write(feature);
        let h = hasher.finish();
        let idx = (h % self.dim as u64) as usize;
        let sign = if (h >> 63) == 1 { -1.0 } else { 1.0 };
        v[idx] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    match settings.provider.as_str() {
        HASHING_PROVIDER => {
            info!(dim = settings.dim, "Using hashing embedder");
            Ok(Box::new(HashingEmbedder::new(settings.dim)?))
        }
        other => Err(Error::InvalidConfig(format!(
            "unknown embedding provider '{other}' (available: {HASHING_PROVIDER})"
        ))
        .into()),
    }
}
