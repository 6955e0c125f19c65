use crate::types::{Chunk, ScopeKey, SearchHit, SearchResult};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Full-text ranking restricted to one scope, using the scope's language
/// configuration. Hits come back best first.
#[allow(async_fn_in_trait)]
pub trait KeywordSearch {
    async fn search_keyword(&self, scope: &ScopeKey, query: &str, limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Nearest neighbours restricted to one scope. Hits come back best first.
#[allow(async_fn_in_trait)]
pub trait VectorSearch {
    async fn search_vector(&self, scope: &ScopeKey, query_vec: &[f32], limit: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Write side of the scoped store.
#[allow(async_fn_in_trait)]
pub trait ScopedPersistence {
    /// Persist chunks under `variant`; each chunk's country picks its scope.
    async fn insert_batch(&self, variant: &str, chunks: &[Chunk], vectors: &[Vec<f32>]) -> anyhow::Result<usize>;
    /// Remove exactly the rows of `scope`.
    async fn delete_scope(&self, scope: &ScopeKey) -> anyhow::Result<()>;
    async fn exists(&self, scope: &ScopeKey) -> anyhow::Result<bool>;
}

/// External relevance reranking. Implementations return at most `top_n` results.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, results: Vec<SearchResult>, top_n: usize) -> anyhow::Result<Vec<SearchResult>>;
}
