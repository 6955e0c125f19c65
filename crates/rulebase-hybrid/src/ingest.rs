//! Ingestion: chunk one rulebook for one scope, embed it, and write it.

use anyhow::Result;
use tracing::{info, warn};

use rulebase_core::chunker::{ChunkLabels, HierarchicalChunker};
use rulebase_core::config::Settings;
use rulebase_core::error::Error;
use rulebase_core::sequential::{SequentialSplitter, SplitterConfig};
use rulebase_core::traits::Embedder;
use rulebase_core::types::{Chunk, DocType, ScopeKey, Shard};

use crate::store::ScopedStore;

const EMBED_BATCH: usize = 64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum IngestMode {
    /// Delete the scope, then insert.
    #[default]
    Replace,
    Append,
}

#[derive(Debug, Clone)]
pub enum IngestSource {
    /// Layout-analysed shards of an official rulebook.
    Layout(Vec<Shard>),
    /// Plain text of a local rulebook; `source` is usually the file name.
    Text { text: String, source: String },
}

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub variant: String,
    pub country: Option<String>,
    pub source: IngestSource,
    pub mode: IngestMode,
}

pub struct Ingestor<'a> {
    store: &'a ScopedStore,
    embedder: &'a dyn Embedder,
    settings: &'a Settings,
}

impl<'a> Ingestor<'a> {
    pub fn new(store: &'a ScopedStore, embedder: &'a dyn Embedder, settings: &'a Settings) -> Self {
        Self { store, embedder, settings }
    }

    fn splitter(&self) -> Result<SequentialSplitter> {
        Ok(SequentialSplitter::new(SplitterConfig {
            chunk_size: self.settings.chunking.local_chunk_size,
            chunk_overlap: self.settings.chunking.local_chunk_overlap,
        })?)
    }

    /// Chunks for the request's scope without touching the store.
    pub fn build_chunks(&self, request: &IngestRequest) -> Result<(ScopeKey, Vec<Chunk>)> {
        self.settings.check_variant(&request.variant)?;
        let scope = ScopeKey::new(&request.variant, request.country.as_deref())?;

        let chunks = match (&request.source, scope.country()) {
            (IngestSource::Layout(shards), None) => {
                let labels = ChunkLabels::new(scope.variant(), self.settings.chunking.source_tag.clone())
                    .with_doc_type(DocType::Official);
                HierarchicalChunker::new(labels).chunk_shards(shards)
            }
            (IngestSource::Text { text, source }, Some(country)) => {
                let splitter = self.splitter()?;
                splitter.chunk_document(text, scope.variant(), source, Some(country))
            }
            (IngestSource::Layout(shards), Some(country)) => {
                // local rulebooks carry no reliable structure; split their text
                let text = shards.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("\n\n");
                let splitter = self.splitter()?;
                splitter.chunk_document(&text, scope.variant(), &self.settings.chunking.source_tag, Some(country))
            }
            (IngestSource::Text { .. }, None) => {
                return Err(Error::Operation("official rulebooks need layout shards, not plain text".into()).into());
            }
        };
        Ok((scope, chunks))
    }

    pub fn embed(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let embedded = self.embedder.embed_batch(&texts)?;
            if embedded.len() != texts.len() {
                return Err(Error::Operation(format!(
                    "embedder returned {} vectors for {} texts",
                    embedded.len(),
                    texts.len()
                ))
                .into());
            }
            if let Some(bad) = embedded.iter().find(|v| v.len() != self.store.dim()) {
                return Err(Error::DimensionMismatch { expected: self.store.dim(), actual: bad.len() }.into());
            }
            vectors.extend(embedded);
        }
        Ok(vectors)
    }

    /// Returns the number of chunks persisted. Replace is best-effort: a reader
    /// may see the scope empty between the delete and the insert.
    pub async fn ingest(&self, request: &IngestRequest) -> Result<usize> {
        let (scope, chunks) = self.build_chunks(request)?;
        self.store.ensure_schema().await?;
        if chunks.is_empty() {
            warn!(%scope, "No chunks produced; store left untouched");
            return Ok(0);
        }
        let vectors = self.embed(&chunks)?;

        if request.mode == IngestMode::Replace {
            self.store.delete_scope(&scope).await?;
        }
        let written = self.store.insert_batch(scope.variant(), &chunks, &vectors).await?;
        self.store.vector().ensure_indexes().await?;
        info!(%scope, chunks = written, mode = ?request.mode, "Ingested rulebook");
        Ok(written)
    }
}
