//! Scoped hybrid retrieval: vector and keyword candidates for one scope,
//! fetched concurrently and fused with RRF.

use anyhow::Result;
use tracing::{debug, warn};

use rulebase_core::error::Error;
use rulebase_core::traits::{KeywordSearch, VectorSearch};
use rulebase_core::types::{ScopeKey, SearchHit, SearchResult, SourceKind};

use crate::rrf::{fuse, RrfParams};

/// A sub-query that failed while the other one answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub path: SourceKind,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct HybridResults {
    pub results: Vec<SearchResult>,
    /// Set when only one path contributed. Never set on a full answer.
    pub degraded: Option<Degradation>,
}

impl HybridResults {
    pub fn is_degraded(&self) -> bool { self.degraded.is_some() }
}

pub struct HybridRetriever<'s, V, K> {
    vector: &'s V,
    keyword: &'s K,
    params: RrfParams,
}

/// Contract errors mean the request itself is wrong; those are not degraded around.
fn is_contract_error(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<Error>(), Some(Error::DimensionMismatch { .. } | Error::ScopeViolation(_)))
}

fn retain_scope(hits: Vec<SearchHit>, scope: &ScopeKey) -> Vec<SearchHit> {
    hits.into_iter()
        .filter(|h| {
            let in_scope = h.chunk.metadata.scope().is_ok_and(|s| &s == scope);
            if !in_scope {
                warn!(%scope, id = %h.id, "Dropping hit outside the requested scope");
            }
            in_scope
        })
        .collect()
}

impl<'s, V: VectorSearch, K: KeywordSearch> HybridRetriever<'s, V, K> {
    pub fn new(vector: &'s V, keyword: &'s K, params: RrfParams) -> Self { Self { vector, keyword, params } }

    pub fn params(&self) -> RrfParams { self.params }

    /// Top `k` fused results for exactly one scope. Candidate breadth is
    /// `max(params.breadth, k)` per engine.
    pub async fn search_hybrid(
        &self,
        query_text: &str,
        query_vector: &[f32],
        scope: &ScopeKey,
        k: usize,
    ) -> Result<HybridResults> {
        if k == 0 {
            return Ok(HybridResults { results: Vec::new(), degraded: None });
        }
        let breadth = self.params.breadth.max(k);
        let (vector, keyword) = futures::join!(
            self.vector.search_vector(scope, query_vector, breadth),
            self.keyword.search_keyword(scope, query_text, breadth),
        );

        let (vector_hits, keyword_hits, degraded) = match (vector, keyword) {
            (Ok(v), Ok(kw)) => (v, kw, None),
            (Err(e), _) | (_, Err(e)) if is_contract_error(&e) => return Err(e),
            (Err(e), Ok(kw)) => {
                warn!(%scope, error = %format!("{e:#}"), "Vector search failed; using keyword results only");
                (Vec::new(), kw, Some(Degradation { path: SourceKind::Vector, reason: format!("{e:#}") }))
            }
            (Ok(v), Err(e)) => {
                warn!(%scope, error = %format!("{e:#}"), "Keyword search failed; using vector results only");
                (v, Vec::new(), Some(Degradation { path: SourceKind::Text, reason: format!("{e:#}") }))
            }
            (Err(ve), Err(ke)) => {
                return Err(Error::Operation(format!(
                    "both retrieval paths failed for {scope}: vector: {ve:#}; keyword: {ke:#}"
                ))
                .into());
            }
        };

        let vector_hits = retain_scope(vector_hits, scope);
        let keyword_hits = retain_scope(keyword_hits, scope);
        let results = fuse(&vector_hits, &keyword_hits, self.params.k, k);
        debug!(
            %scope,
            vector = vector_hits.len(),
            keyword = keyword_hits.len(),
            fused = results.len(),
            "Hybrid search"
        );
        Ok(HybridResults { results, degraded })
    }
}
