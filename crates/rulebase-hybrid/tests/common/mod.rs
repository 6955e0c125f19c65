#![allow(dead_code)]

use anyhow::{bail, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rulebase_core::error::Error;
use rulebase_core::traits::{KeywordSearch, VectorSearch};
use rulebase_core::types::{Chunk, ChunkMetadata, DocType, ScopeKey, SearchHit, SourceKind};

pub fn hit(id: &str, variant: &str, country: Option<&str>, source: SourceKind) -> SearchHit {
    SearchHit {
        id: id.to_string(),
        score: 1.0,
        source,
        chunk: Chunk {
            content: format!("content of {id}"),
            metadata: ChunkMetadata {
                variant: variant.to_string(),
                country: country.map(str::to_string),
                doc_type: Some(if country.is_some() { DocType::Local } else { DocType::Official }),
                ..ChunkMetadata::default()
            },
        },
    }
}

pub enum Failure {
    None,
    Transient,
    Dimension,
}

/// Serves canned hits per scope tag and records the limit it was asked for.
pub struct FakeEngine {
    pub by_scope: HashMap<String, Vec<SearchHit>>,
    pub failure: Failure,
    pub last_limit: AtomicUsize,
}

impl FakeEngine {
    pub fn new() -> Self { Self { by_scope: HashMap::new(), failure: Failure::None, last_limit: AtomicUsize::new(0) } }

    pub fn with(mut self, scope: &ScopeKey, ids: &[&str], source: SourceKind) -> Self {
        let hits = ids.iter().map(|id| hit(id, scope.variant(), scope.country(), source)).collect();
        self.by_scope.insert(scope.tag(), hits);
        self
    }

    pub fn with_hits(mut self, scope: &ScopeKey, hits: Vec<SearchHit>) -> Self {
        self.by_scope.insert(scope.tag(), hits);
        self
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }

    fn serve(&self, scope: &ScopeKey, limit: usize) -> Result<Vec<SearchHit>> {
        self.last_limit.store(limit, Ordering::SeqCst);
        match self.failure {
            Failure::None => {}
            Failure::Transient => bail!("engine unavailable"),
            Failure::Dimension => return Err(Error::DimensionMismatch { expected: 768, actual: 3 }.into()),
        }
        Ok(self.by_scope.get(&scope.tag()).map(|h| h.iter().take(limit).cloned().collect()).unwrap_or_default())
    }
}

impl VectorSearch for FakeEngine {
    async fn search_vector(&self, scope: &ScopeKey, _query_vec: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.serve(scope, limit)
    }
}

impl KeywordSearch for FakeEngine {
    async fn search_keyword(&self, scope: &ScopeKey, _query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.serve(scope, limit)
    }
}
