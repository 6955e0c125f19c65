mod common;

use anyhow::{bail, Result};

use common::{Failure, FakeEngine};
use rulebase_core::error::Error;
use rulebase_core::traits::Reranker;
use rulebase_core::types::{ScopeKey, SearchResult, SourceKind};
use rulebase_hybrid::pipeline::{concatenate, rerank_or_keep, truncate};
use rulebase_hybrid::{DualPathPipeline, HybridRetriever, PassthroughReranker, RrfParams};

struct FailingReranker;

impl Reranker for FailingReranker {
    fn rerank(&self, _query: &str, _results: Vec<SearchResult>, _top_n: usize) -> Result<Vec<SearchResult>> {
        bail!("reranker offline")
    }
}

struct ReversingReranker;

impl Reranker for ReversingReranker {
    fn rerank(&self, _query: &str, mut results: Vec<SearchResult>, top_n: usize) -> Result<Vec<SearchResult>> {
        results.reverse();
        results.truncate(top_n);
        Ok(results)
    }
}

fn ids(results: &[SearchResult]) -> Vec<&str> { results.iter().map(|r| r.id.as_str()).collect() }

fn engines() -> (FakeEngine, FakeEngine) {
    let official = ScopeKey::official("outdoor").unwrap();
    let local = ScopeKey::local("outdoor", "BEL").unwrap();
    let vector = FakeEngine::new()
        .with(&official, &["o1", "o2"], SourceKind::Vector)
        .with(&local, &["l1", "l2"], SourceKind::Vector);
    let keyword = FakeEngine::new()
        .with(&official, &["o1", "o2"], SourceKind::Text)
        .with(&local, &["l1", "l2"], SourceKind::Text);
    (vector, keyword)
}

#[tokio::test]
async fn official_results_come_before_local_ones() {
    let (vector, keyword) = engines();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let pipeline = DualPathPipeline::new(retriever, PassthroughReranker, 15, 10);

    let out = pipeline.run("green card", &[], "outdoor", Some("bel")).await.unwrap();
    assert_eq!(ids(&out.results), vec!["o1", "o2", "l1", "l2"]);
    assert_eq!(out.paths.len(), 2);
    assert!(out.paths[0].scope.is_official());
    assert_eq!(out.paths[1].scope.country(), Some("BEL"));
    assert_eq!(out.paths[1].retrieved, 2);
    assert!(!out.rerank_fallback);
}

#[tokio::test]
async fn without_country_only_the_official_path_runs() {
    let (vector, keyword) = engines();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let pipeline = DualPathPipeline::new(retriever, PassthroughReranker, 15, 10);

    let out = pipeline.run("green card", &[], "outdoor", None).await.unwrap();
    assert_eq!(ids(&out.results), vec!["o1", "o2"]);
    assert_eq!(out.paths.len(), 1);
}

#[tokio::test]
async fn reranker_order_is_used_and_cut_to_top_n() {
    let (vector, keyword) = engines();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let pipeline = DualPathPipeline::new(retriever, ReversingReranker, 15, 3);

    let out = pipeline.run("q", &[], "outdoor", Some("BEL")).await.unwrap();
    assert_eq!(ids(&out.results), vec!["l2", "l1", "o2"]);
}

#[tokio::test]
async fn failing_reranker_keeps_concatenated_order() {
    let (vector, keyword) = engines();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let pipeline = DualPathPipeline::new(retriever, FailingReranker, 15, 3);

    let out = pipeline.run("q", &[], "outdoor", Some("BEL")).await.unwrap();
    assert!(out.rerank_fallback);
    assert_eq!(ids(&out.results), vec!["o1", "o2", "l1"]);
}

#[tokio::test]
async fn empty_country_is_a_scope_violation() {
    let (vector, keyword) = engines();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let pipeline = DualPathPipeline::new(retriever, PassthroughReranker, 15, 10);

    let err = pipeline.run("q", &[], "outdoor", Some(" ")).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::ScopeViolation(_))));
}

#[tokio::test]
async fn degradation_is_reported_per_path() {
    let official = ScopeKey::official("outdoor").unwrap();
    let vector = FakeEngine::new().failing(Failure::Transient);
    let keyword = FakeEngine::new().with(&official, &["o1"], SourceKind::Text);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let pipeline = DualPathPipeline::new(retriever, PassthroughReranker, 15, 10);

    let out = pipeline.run("q", &[], "outdoor", Some("BEL")).await.unwrap();
    assert_eq!(ids(&out.results), vec!["o1"]);
    assert!(out.paths.iter().all(|p| p.degraded.as_ref().map(|d| d.path) == Some(SourceKind::Vector)));
    assert_eq!(out.paths[1].retrieved, 0);
}

#[test]
fn helpers_keep_duplicates_and_order() {
    let make = |id: &str| SearchResult {
        id: id.to_string(),
        content: String::new(),
        metadata: Default::default(),
        fused_score: 0.0,
        vector_rank: None,
        keyword_rank: None,
    };
    let joined = concatenate(vec![make("a"), make("b")], vec![make("a")]);
    assert_eq!(ids(&joined), vec!["a", "b", "a"]);

    let (kept, fallback) = rerank_or_keep(&FailingReranker, "q", joined.clone(), 2);
    assert!(fallback);
    assert_eq!(ids(&kept), vec!["a", "b", "a"]);
    assert_eq!(ids(&truncate(kept, 2)), vec!["a", "b"]);
}
