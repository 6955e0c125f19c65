//! Dual-path retrieval: the official scope and, optionally, one country's
//! local scope are retrieved separately, concatenated, reranked and cut.

use anyhow::Result;
use tracing::{debug, warn};

use rulebase_core::traits::{KeywordSearch, Reranker, VectorSearch};
use rulebase_core::types::{ScopeKey, SearchResult};

use crate::retriever::{Degradation, HybridRetriever};

/// Keeps the incoming order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

impl Reranker for PassthroughReranker {
    fn rerank(&self, _query: &str, mut results: Vec<SearchResult>, top_n: usize) -> Result<Vec<SearchResult>> {
        results.truncate(top_n);
        Ok(results)
    }
}

#[derive(Debug, Clone)]
pub struct PathOutcome {
    pub scope: ScopeKey,
    pub retrieved: usize,
    pub degraded: Option<Degradation>,
}

#[derive(Debug, Clone)]
pub struct DualPathResults {
    pub results: Vec<SearchResult>,
    /// Official path first, then the local one when requested.
    pub paths: Vec<PathOutcome>,
    /// The reranker failed and the concatenated order was kept.
    pub rerank_fallback: bool,
}

/// Official results first, local after; duplicates are kept.
pub fn concatenate(official: Vec<SearchResult>, local: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut all = official;
    all.extend(local);
    all
}

/// Rerank, or keep the input order when the reranker errors. The flag reports the fallback.
pub fn rerank_or_keep<R: Reranker + ?Sized>(
    reranker: &R,
    query: &str,
    results: Vec<SearchResult>,
    top_n: usize,
) -> (Vec<SearchResult>, bool) {
    match reranker.rerank(query, results.clone(), top_n) {
        Ok(reranked) => (reranked, false),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Reranker failed; keeping retrieval order");
            (results, true)
        }
    }
}

pub fn truncate(mut results: Vec<SearchResult>, top_n: usize) -> Vec<SearchResult> {
    results.truncate(top_n);
    results
}

pub struct DualPathPipeline<'s, V, K, R> {
    retriever: HybridRetriever<'s, V, K>,
    reranker: R,
    /// Results retrieved per scope.
    k: usize,
    top_n: usize,
}

impl<'s, V: VectorSearch, K: KeywordSearch, R: Reranker> DualPathPipeline<'s, V, K, R> {
    pub fn new(retriever: HybridRetriever<'s, V, K>, reranker: R, k: usize, top_n: usize) -> Self {
        Self { retriever, reranker, k, top_n }
    }

    pub async fn run(
        &self,
        query_text: &str,
        query_vector: &[f32],
        variant: &str,
        country: Option<&str>,
    ) -> Result<DualPathResults> {
        let official = ScopeKey::official(variant)?;
        let local = country.map(|c| ScopeKey::local(variant, c)).transpose()?;

        let official_search = self.retriever.search_hybrid(query_text, query_vector, &official, self.k);
        let (official_hits, local_hits) = match &local {
            Some(scope) => {
                let (o, l) = futures::join!(
                    official_search,
                    self.retriever.search_hybrid(query_text, query_vector, scope, self.k)
                );
                (o?, Some(l?))
            }
            None => (official_search.await?, None),
        };

        let mut paths = vec![PathOutcome {
            scope: official,
            retrieved: official_hits.results.len(),
            degraded: official_hits.degraded,
        }];
        let local_results = match (local, local_hits) {
            (Some(scope), Some(hits)) => {
                paths.push(PathOutcome { scope, retrieved: hits.results.len(), degraded: hits.degraded });
                hits.results
            }
            _ => Vec::new(),
        };

        let combined = concatenate(official_hits.results, local_results);
        let (reranked, rerank_fallback) = rerank_or_keep(&self.reranker, query_text, combined, self.top_n);
        let results = truncate(reranked, self.top_n);
        debug!(variant, country = country.unwrap_or("-"), results = results.len(), "Dual-path retrieval");
        Ok(DualPathResults { results, paths, rerank_fallback })
    }
}
