//! The composed scoped store: one lance table for vectors and one tantivy
//! index for keywords, kept in step and addressed by shared record ids.

use anyhow::{bail, Result};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

use rulebase_core::config::{expand_path, DataSettings};
use rulebase_core::error::Error;
use rulebase_core::traits::{KeywordSearch, ScopedPersistence, VectorSearch};
use rulebase_core::types::{Chunk, ScopeKey, SearchHit};
use rulebase_text::TantivyIndexer;
use rulebase_vector::LanceDbIndexer;

static BATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Ids for one insert batch: a per-batch hash prefix plus the row position.
fn new_ids(variant: &str, n: usize) -> Vec<String> {
    let seq = BATCH_SEQ.fetch_add(1, Ordering::Relaxed);
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let mut hasher = blake3::Hasher::new();
    hasher.update(variant.as_bytes());
    hasher.update(&stamp.to_le_bytes());
    hasher.update(&seq.to_le_bytes());
    hasher.update(&std::process::id().to_le_bytes());
    let hex = hasher.finalize().to_hex();
    let prefix = &hex.as_str()[..16];
    (0..n).map(|i| format!("{prefix}-{i:05}")).collect()
}

pub struct ScopedStore {
    vector: LanceDbIndexer,
    text: TantivyIndexer,
}

impl ScopedStore {
    /// Open both halves. Misconfiguration and unreachable stores fail here,
    /// before any query runs.
    pub async fn connect(data: &DataSettings, dim: usize) -> Result<Self> {
        if data.lancedb_dir.trim().is_empty() || data.tantivy_dir.trim().is_empty() {
            return Err(Error::InvalidConfig("store directories must be set".into()).into());
        }
        if data.table.trim().is_empty() {
            return Err(Error::InvalidConfig("table name must be set".into()).into());
        }
        if dim == 0 {
            return Err(Error::InvalidConfig("embedding dimension must be positive".into()).into());
        }
        let lance_dir = expand_path(&data.lancedb_dir);
        let tantivy_dir = expand_path(&data.tantivy_dir);
        Self::open_at(&lance_dir, &tantivy_dir, &data.table, dim).await
    }

    pub async fn open_at(lance_dir: &Path, tantivy_dir: &Path, table: &str, dim: usize) -> Result<Self> {
        let vector = LanceDbIndexer::open(&lance_dir.to_string_lossy(), table, dim).await?;
        let text = TantivyIndexer::open(tantivy_dir)
            .map_err(|e| Error::Connection(format!("{}: {e:#}", tantivy_dir.display())))?;
        info!(lancedb = %lance_dir.display(), tantivy = %tantivy_dir.display(), table, dim, "Scoped store ready");
        Ok(Self { vector, text })
    }

    pub fn dim(&self) -> usize { self.vector.dim() }

    pub fn vector(&self) -> &LanceDbIndexer { &self.vector }

    pub fn text(&self) -> &TantivyIndexer { &self.text }

    /// Idempotent housekeeping: scalar indexes on the scope columns, and a
    /// keyword index rebuild whenever it no longer mirrors the vector table
    /// (fresh or drifted index, or an interrupted write).
    pub async fn ensure_schema(&self) -> Result<()> {
        self.vector.ensure_indexes().await?;
        let rows = self.vector.total_rows().await?;
        let docs = self.text.num_docs();
        if docs == rows as u64 {
            return Ok(());
        }
        warn!(
            vector_rows = rows,
            keyword_docs = docs,
            recreated = self.text.needs_backfill(),
            "Keyword index out of step; rebuilding from vector table"
        );
        let stored = self.vector.scan_rows().await?;
        let (ids, chunks): (Vec<String>, Vec<Chunk>) = stored.into_iter().unzip();
        self.text.clear()?;
        self.text.insert(&ids, &chunks)?;
        info!(count = ids.len(), "Keyword index rebuilt");
        Ok(())
    }

    /// Persist chunks under `variant`. Each chunk's country (normalized) picks
    /// its scope; the vector table is written first, so a keyword-side
    /// failure is repaired by the next [`ensure_schema`](Self::ensure_schema).
    pub async fn insert_batch(&self, variant: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        if chunks.len() != vectors.len() {
            bail!("chunk count ({}) does not match vector count ({})", chunks.len(), vectors.len());
        }
        if chunks.is_empty() {
            return Ok(0);
        }
        let prepared = chunks
            .iter()
            .map(|c| {
                let mut c = c.clone();
                c.metadata.variant = variant.to_string();
                let scope = c.metadata.scope()?;
                c.metadata.country = scope.country().map(str::to_string);
                Ok(c)
            })
            .collect::<Result<Vec<_>>>()?;
        let ids = new_ids(variant, prepared.len());
        let written = self.vector.insert(&ids, &prepared, vectors).await?;
        self.text.insert(&ids, &prepared)?;
        info!(variant, count = written, "Inserted chunks");
        Ok(written)
    }

    pub async fn delete_scope(&self, scope: &ScopeKey) -> Result<()> {
        self.vector.delete_scope(scope).await?;
        self.text.delete_scope(scope)?;
        info!(%scope, "Deleted scope");
        Ok(())
    }

    pub async fn exists(&self, scope: &ScopeKey) -> Result<bool> { self.vector.exists(scope).await }

    pub async fn count(&self, scope: &ScopeKey) -> Result<usize> { self.vector.count(scope).await }

    /// Country codes with local rules, across all variants when `variant` is `None`.
    pub async fn list_jurisdictions(&self, variant: Option<&str>) -> Result<Vec<String>> {
        self.vector.list_countries(variant).await
    }

    /// Remove every row of every scope from both stores.
    pub async fn clear_all(&self) -> Result<()> {
        self.vector.clear().await?;
        self.text.clear()?;
        warn!("Cleared all scopes");
        Ok(())
    }
}

impl ScopedPersistence for ScopedStore {
    async fn insert_batch(&self, variant: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> Result<usize> {
        ScopedStore::insert_batch(self, variant, chunks, vectors).await
    }

    async fn delete_scope(&self, scope: &ScopeKey) -> Result<()> { ScopedStore::delete_scope(self, scope).await }

    async fn exists(&self, scope: &ScopeKey) -> Result<bool> { ScopedStore::exists(self, scope).await }
}

impl VectorSearch for ScopedStore {
    async fn search_vector(&self, scope: &ScopeKey, query_vec: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.vector.search_scope(scope, query_vec, limit).await
    }
}

impl KeywordSearch for ScopedStore {
    async fn search_keyword(&self, scope: &ScopeKey, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.text.search_scope(scope, query, limit)
    }
}
