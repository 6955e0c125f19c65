mod common;

use std::sync::atomic::Ordering;

use common::{hit, Failure, FakeEngine};
use rulebase_core::error::Error;
use rulebase_core::types::{ScopeKey, SourceKind};
use rulebase_hybrid::{HybridRetriever, RrfParams};

fn outdoor() -> ScopeKey { ScopeKey::official("outdoor").unwrap() }

fn ids(results: &[rulebase_core::types::SearchResult]) -> Vec<&str> { results.iter().map(|r| r.id.as_str()).collect() }

#[tokio::test]
async fn fuses_both_paths() {
    let scope = outdoor();
    let vector = FakeEngine::new().with(&scope, &["a", "b", "c"], SourceKind::Vector);
    let keyword = FakeEngine::new().with(&scope, &["c", "a"], SourceKind::Text);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    let out = retriever.search_hybrid("green card", &[0.0; 4], &scope, 15).await.unwrap();
    assert!(!out.is_degraded());
    assert_eq!(ids(&out.results), vec!["a", "c", "b"]);
    let a = &out.results[0];
    assert!((a.fused_score - (1.0 / 61.0 + 1.0 / 62.0)).abs() < 1e-12);
    assert_eq!((a.vector_rank, a.keyword_rank), (Some(1), Some(2)));
}

#[tokio::test]
async fn candidate_breadth_is_at_least_k() {
    let scope = outdoor();
    let vector = FakeEngine::new();
    let keyword = FakeEngine::new();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    retriever.search_hybrid("q", &[], &scope, 15).await.unwrap();
    assert_eq!(vector.last_limit.load(Ordering::SeqCst), 50);
    assert_eq!(keyword.last_limit.load(Ordering::SeqCst), 50);

    retriever.search_hybrid("q", &[], &scope, 80).await.unwrap();
    assert_eq!(vector.last_limit.load(Ordering::SeqCst), 80);
}

#[tokio::test]
async fn results_are_truncated_to_k() {
    let scope = outdoor();
    let vector = FakeEngine::new().with(&scope, &["a", "b", "c", "d"], SourceKind::Vector);
    let keyword = FakeEngine::new();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());
    let out = retriever.search_hybrid("q", &[], &scope, 2).await.unwrap();
    assert_eq!(ids(&out.results), vec!["a", "b"]);
    assert!(retriever.search_hybrid("q", &[], &scope, 0).await.unwrap().results.is_empty());
}

#[tokio::test]
async fn vector_failure_degrades_to_keyword() {
    let scope = outdoor();
    let vector = FakeEngine::new().failing(Failure::Transient);
    let keyword = FakeEngine::new().with(&scope, &["k1", "k2"], SourceKind::Text);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    let out = retriever.search_hybrid("q", &[], &scope, 10).await.unwrap();
    assert_eq!(ids(&out.results), vec!["k1", "k2"]);
    let degraded = out.degraded.expect("degradation is reported");
    assert_eq!(degraded.path, SourceKind::Vector);
    assert!(degraded.reason.contains("engine unavailable"));
    assert!((out.results[0].fused_score - 1.0 / 61.0).abs() < 1e-12);
}

#[tokio::test]
async fn keyword_failure_degrades_to_vector() {
    let scope = outdoor();
    let vector = FakeEngine::new().with(&scope, &["v1"], SourceKind::Vector);
    let keyword = FakeEngine::new().failing(Failure::Transient);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    let out = retriever.search_hybrid("q", &[], &scope, 10).await.unwrap();
    assert_eq!(ids(&out.results), vec!["v1"]);
    assert_eq!(out.degraded.map(|d| d.path), Some(SourceKind::Text));
}

#[tokio::test]
async fn both_failing_is_an_error() {
    let scope = outdoor();
    let vector = FakeEngine::new().failing(Failure::Transient);
    let keyword = FakeEngine::new().failing(Failure::Transient);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    let err = retriever.search_hybrid("q", &[], &scope, 10).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Operation(_))));
}

#[tokio::test]
async fn dimension_mismatch_is_not_degraded_around() {
    let scope = outdoor();
    let vector = FakeEngine::new().failing(Failure::Dimension);
    let keyword = FakeEngine::new().with(&scope, &["k1"], SourceKind::Text);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    let err = retriever.search_hybrid("q", &[0.1, 0.2, 0.3], &scope, 10).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::DimensionMismatch { .. })));
}

#[tokio::test]
async fn hits_from_other_scopes_are_dropped() {
    let scope = outdoor();
    let leaked = vec![
        hit("ok", "outdoor", None, SourceKind::Vector),
        hit("local", "outdoor", Some("BEL"), SourceKind::Vector),
        hit("indoor", "indoor", None, SourceKind::Vector),
    ];
    let vector = FakeEngine::new().with_hits(&scope, leaked);
    let keyword = FakeEngine::new();
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams::default());

    let out = retriever.search_hybrid("q", &[], &scope, 10).await.unwrap();
    assert_eq!(ids(&out.results), vec!["ok"]);
}

#[tokio::test]
async fn custom_rrf_constant_changes_scores_not_membership() {
    let scope = outdoor();
    let vector = FakeEngine::new().with(&scope, &["a"], SourceKind::Vector);
    let keyword = FakeEngine::new().with(&scope, &["a"], SourceKind::Text);
    let retriever = HybridRetriever::new(&vector, &keyword, RrfParams { k: 1.0, breadth: 10 });
    let out = retriever.search_hybrid("q", &[], &scope, 5).await.unwrap();
    assert_eq!(ids(&out.results), vec!["a"]);
    assert!((out.results[0].fused_score - 1.0).abs() < 1e-12);
}
